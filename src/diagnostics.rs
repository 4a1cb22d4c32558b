//! Local HTTP status server.
//!
//! | Route | |
//! |---|---|
//! | `GET /api/state` | latest sign state (404 before the first tick) |
//! | `GET /api/schedule/now` | mentors on duty and the next shifts today |
//! | `POST /api/sensors/door` | `{"value": bool}`, simulated backend only |
//! | `POST /api/sensors/motion` | `{"value": bool}`, simulated backend only |
//! | `POST /api/sensors/switch` | `{"position": "ForcedOpen"}`, simulated backend only |
//!
//! The server only reads the hand-off slot; it never touches the tick loop.

use crate::output::StateReceiver;
use crate::schedule::{MentorShift, ScheduleTable};
use crate::sensors::{SimulatedSensors, SwitchPosition};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Local, NaiveDateTime};
use log::info;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct DiagnosticsState {
    pub states: StateReceiver,
    pub schedule: Arc<ScheduleTable>,
    pub simulated: Option<Arc<SimulatedSensors>>,
}

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Conflict(String),
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(m) => (StatusCode::NOT_FOUND, m),
            Self::Conflict(m) => (StatusCode::CONFLICT, m),
            Self::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleNow<'a> {
    pub now: NaiveDateTime,
    pub on_duty: Vec<&'a MentorShift>,
    pub next_today: Vec<&'a MentorShift>,
}

#[derive(Debug, Deserialize)]
pub struct BinaryUpdate {
    pub value: bool,
}

#[derive(Debug, Deserialize)]
pub struct SwitchUpdate {
    pub position: SwitchPosition,
}

pub fn build_router(state: DiagnosticsState) -> Router {
    Router::new()
        .route("/api/state", get(get_state))
        .route("/api/schedule/now", get(get_schedule_now))
        .route("/api/sensors/switch", post(set_switch))
        .route("/api/sensors/{sensor}", post(set_binary_sensor))
        .with_state(state)
}

async fn get_state(State(app): State<DiagnosticsState>) -> Result<Response, ApiError> {
    let latest = app.states.borrow().clone();
    match latest {
        Some(state) => Ok(Json(state).into_response()),
        None => Err(ApiError::NotFound("the sign has not ticked yet".into())),
    }
}

async fn get_schedule_now(State(app): State<DiagnosticsState>) -> Response {
    let now = Local::now().naive_local();
    Json(ScheduleNow {
        now,
        on_duty: app.schedule.mentors_on_duty(now),
        next_today: app.schedule.next_shifts_today(now),
    })
    .into_response()
}

fn simulated(app: &DiagnosticsState) -> Result<&SimulatedSensors, ApiError> {
    app.simulated
        .as_deref()
        .ok_or_else(|| ApiError::Conflict("sensors are not simulated".into()))
}

async fn set_binary_sensor(
    State(app): State<DiagnosticsState>,
    Path(sensor): Path<String>,
    Json(update): Json<BinaryUpdate>,
) -> Result<StatusCode, ApiError> {
    let sensors = simulated(&app)?;
    let target = match sensor.as_str() {
        "door" => sensors.door(),
        "motion" => sensors.motion(),
        other => return Err(ApiError::BadRequest(format!("unknown sensor {other:?}"))),
    };
    target.set(update.value);
    info!("[HTTP] {} set to {}", sensor, update.value);
    Ok(StatusCode::NO_CONTENT)
}

async fn set_switch(
    State(app): State<DiagnosticsState>,
    Json(update): Json<SwitchUpdate>,
) -> Result<StatusCode, ApiError> {
    simulated(&app)?.set_switch_position(update.position);
    Ok(StatusCode::NO_CONTENT)
}

/// Loopback only in dev mode.
pub fn bind_address(dev: bool, port: u16) -> SocketAddr {
    let ip = if dev {
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    } else {
        IpAddr::V4(Ipv4Addr::UNSPECIFIED)
    };
    SocketAddr::new(ip, port)
}

/// Serve until `shutdown` is cancelled.
pub async fn serve(
    state: DiagnosticsState,
    addr: SocketAddr,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("[HTTP] Diagnostics listening on http://{}", listener.local_addr()?);
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    info!("[HTTP] Diagnostics stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::handoff;
    use crate::sign::SignState;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn app(simulated: Option<Arc<SimulatedSensors>>) -> (Router, crate::output::StateSender) {
        let (tx, rx) = handoff();
        let router = build_router(DiagnosticsState {
            states: rx,
            schedule: Arc::new(ScheduleTable::default()),
            simulated,
        });
        (router, tx)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_state_is_404_before_first_tick() {
        let (router, tx) = app(None);
        let response = router
            .clone()
            .oneshot(Request::builder().uri("/api/state").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        tx.send_replace(Some(SignState::new()));
        let response = router
            .oneshot(Request::builder().uri("/api/state").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["title"], "Closed");
        assert_eq!(json["background"], "Red");
    }

    #[tokio::test]
    async fn test_schedule_now_shape() {
        let (router, _tx) = app(None);
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/api/schedule/now")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert!(json["onDuty"].as_array().unwrap().is_empty());
        assert!(json["nextToday"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sensor_writes_need_simulated_backend() {
        let (router, _tx) = app(None);
        let response = router
            .oneshot(post_json("/api/sensors/door", r#"{"value": false}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_sensor_writes_reach_simulated_backend() {
        let sensors = Arc::new(SimulatedSensors::new());
        let (router, _tx) = app(Some(sensors.clone()));

        let response = router
            .clone()
            .oneshot(post_json("/api/sensors/door", r#"{"value": false}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(!sensors.door().get());

        let response = router
            .clone()
            .oneshot(post_json("/api/sensors/switch", r#"{"position": "ForcedClosed"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(sensors.switch_position(), SwitchPosition::ForcedClosed);

        let response = router
            .oneshot(post_json("/api/sensors/window", r#"{"value": true}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_bind_address() {
        assert_eq!(bind_address(true, 8080).to_string(), "127.0.0.1:8080");
        assert_eq!(bind_address(false, 8080).to_string(), "0.0.0.0:8080");
    }
}
