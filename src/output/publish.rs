//! Publishes the sign state to the remote mirror.
//!
//! Body: `{"bgColor":"rgb(r,g,b)","title":..,"subtitle":..}` with an
//! `x-api-key` header. The published subtitle is the human-readable form of
//! the sign's subtitle (see [`published_subtitle`]).

use crate::sensors::SwitchPosition;
use crate::sign::SignState;
use crate::sign::decision::{UNKNOWN_MARKER, mentor_label};
use log::debug;
use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PUBLISH_URL: &str = "https://ds-sign.yunyul.in";

const OPENS_AT: &str = "Opens at ";
const NOT_OPEN_TODAY: &str = "Not open today";

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server answered {0}")]
    Status(StatusCode),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishPayload {
    pub bg_color: String,
    pub title: String,
    pub subtitle: String,
}

impl PublishPayload {
    pub fn from_state(state: &SignState) -> Self {
        Self {
            bg_color: state.background().css(),
            title: state.title().to_string(),
            subtitle: published_subtitle(state),
        }
    }
}

/// Subtitle as shown to remote viewers.
///
/// | Sign | Subtitle | Published |
/// |---|---|---|
/// | closed, Scheduled | `?` | empty |
/// | closed, Scheduled | `2:30PM` | `Opens at 2:30PM` |
/// | closed, Scheduled | empty | `Not open today` |
/// | otherwise | names | `Mentor: ` / `Mentors: ` + names |
/// | otherwise | empty | empty |
pub fn published_subtitle(state: &SignState) -> String {
    let subtitle = state.subtitle();
    let closed_on_schedule =
        !state.is_open() && state.switch_position() == SwitchPosition::Scheduled;
    match (closed_on_schedule, subtitle) {
        (true, UNKNOWN_MARKER) => String::new(),
        // the roster always fills this in; a fresh `SignState` does not
        (true, "") => NOT_OPEN_TODAY.to_string(),
        (true, time) => format!("{OPENS_AT}{time}"),
        (false, "") => String::new(),
        (false, names) => format!("{}{}", mentor_label(names, false), names),
    }
}

/// POSTs state snapshots to one endpoint.
#[derive(Clone)]
pub struct HttpPublisher {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl HttpPublisher {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, PublishError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn publish(&self, state: &SignState) -> Result<(), PublishError> {
        let payload = PublishPayload::from_state(state);
        let response = self
            .client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(PublishError::Status(response.status()));
        }
        debug!("[Publish] {} {:?}", payload.title, payload.subtitle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::SensorSnapshot;
    use crate::sign::Decision;
    use axum::Router;
    use axum::extract::State;
    use axum::http::HeaderMap;
    use axum::routing::post;
    use chrono::DateTime;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    fn state(switch_position: SwitchPosition, is_open: bool, subtitle: &str) -> SignState {
        let mut state = SignState::new();
        state.apply(
            &SensorSnapshot {
                switch_position,
                door_open: true,
                motion_detected: false,
            },
            Decision {
                is_open,
                subtitle: subtitle.to_string(),
            },
            DateTime::parse_from_rfc3339("2024-01-01T15:00:00-06:00").unwrap(),
        );
        state
    }

    #[test]
    fn test_subtitle_mapping() {
        use SwitchPosition::*;
        let cases = [
            (Scheduled, false, "?", ""),
            (Scheduled, false, "2:30PM", "Opens at 2:30PM"),
            (Scheduled, false, "", "Not open today"),
            (Scheduled, true, "Alice", "Mentor: Alice"),
            (Scheduled, true, "Alice & Bob", "Mentors: Alice & Bob"),
            (ForcedOpen, true, "", ""),
            (ForcedClosed, false, "", ""),
        ];
        for (switch, open, subtitle, expected) in cases {
            assert_eq!(
                published_subtitle(&state(switch, open, subtitle)),
                expected,
                "{switch} open={open} {subtitle:?}"
            );
        }
    }

    #[test]
    fn test_fresh_state_publishes_not_open_today() {
        let fresh = SignState::new();
        assert_eq!(published_subtitle(&fresh), "Not open today");
        assert_eq!(PublishPayload::from_state(&fresh).subtitle, "Not open today");
    }

    #[test]
    fn test_payload_json() {
        let payload = PublishPayload::from_state(&state(SwitchPosition::Scheduled, true, "Alice"));
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            serde_json::json!({
                "bgColor": "rgb(0,95,77)",
                "title": "Open",
                "subtitle": "Mentor: Alice",
            })
        );
    }

    type Received = Arc<Mutex<Vec<(Option<String>, serde_json::Value)>>>;

    async fn record(
        State(received): State<Received>,
        headers: HeaderMap,
        body: axum::Json<serde_json::Value>,
    ) -> StatusCode {
        let key = headers
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        received.lock().await.push((key, body.0));
        StatusCode::NO_CONTENT
    }

    #[tokio::test]
    async fn test_publish_posts_json_with_key() {
        let received = Received::default();
        let app = Router::new()
            .route("/", post(record))
            .with_state(received.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });

        let publisher = HttpPublisher::new(format!("http://{addr}/"), "secret").unwrap();
        publisher
            .publish(&state(SwitchPosition::Scheduled, false, "6:00PM"))
            .await
            .unwrap();

        let received = received.lock().await;
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].0.as_deref(), Some("secret"));
        assert_eq!(received[0].1["subtitle"], "Opens at 6:00PM");
        assert_eq!(received[0].1["bgColor"], "rgb(199,0,43)");
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let app = Router::new().route("/", post(|| async { StatusCode::UNAUTHORIZED }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });

        let publisher = HttpPublisher::new(format!("http://{addr}/"), "wrong").unwrap();
        let err = publisher
            .publish(&state(SwitchPosition::ForcedOpen, true, ""))
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Status(StatusCode::UNAUTHORIZED)));
    }
}
