//! Background tasks running beside the tick loop.
//!
//! - log + publish: once a period, take the latest handed-off state, append it
//!   to the activity log and publish it
//! - statistics: every few minutes, summarise the activity log and upload it
//! - shutdown listener: turns SIGINT/SIGTERM/SIGQUIT into a cancelled token
//! - quit keys: `q` or Esc typed on the controlling terminal does the same
//!
//! All of them stop when the shared [`CancellationToken`] is cancelled and
//! none of their failures reach the tick loop.

use crate::output::StateReceiver;
use crate::output::activity_log::{ActivityLog, ActivityRecord, read_records};
use crate::output::publish::HttpPublisher;
use crate::output::stats::{StatsUploader, aggregate};
use chrono::Local;
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::signal::unix::{Signal, SignalKind, signal};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub const LOG_PUBLISH_PERIOD: Duration = Duration::from_secs(1);
pub const STATS_PERIOD: Duration = Duration::from_secs(2 * 60);

/// Sinks for the log + publish worker. Either may be absent.
#[derive(Clone, Default)]
pub struct StateSinks {
    pub log: Option<Arc<ActivityLog>>,
    pub publisher: Option<HttpPublisher>,
}

/// Sample the hand-off slot every `period` until shutdown.
///
/// Returns the number of samples taken. A period with no state yet (before
/// the first tick) is skipped.
pub async fn run_log_and_publish(
    mut states: StateReceiver,
    sinks: StateSinks,
    period: Duration,
    shutdown: CancellationToken,
) -> u64 {
    if sinks.log.is_none() && sinks.publisher.is_none() {
        info!("[Publish] Nothing to log or publish, worker idle");
    }
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut log_failing = false;
    let mut publish_failing = false;
    let mut samples = 0;

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {}
        }

        let latest = states.borrow_and_update().clone();
        let Some(state) = latest else {
            continue;
        };
        samples += 1;

        if let Some(log) = &sinks.log {
            let record = ActivityRecord::from_state(&state, Local::now().fixed_offset());
            let writer = log.clone();
            match tokio::task::spawn_blocking(move || writer.append(&record)).await {
                Ok(Ok(())) if log_failing => {
                    info!("[Log] Appending to {} again", log.path().display());
                    log_failing = false;
                }
                Ok(Ok(())) => {}
                Ok(Err(e)) if !log_failing => {
                    warn!("[Log] Failed to append to {}: {}", log.path().display(), e);
                    log_failing = true;
                }
                Ok(Err(e)) => debug!("[Log] Append failed: {}", e),
                Err(e) => error!("[Log] Writer task failed: {}", e),
            }
        }

        if let Some(publisher) = &sinks.publisher {
            match publisher.publish(&state).await {
                Ok(()) if publish_failing => {
                    info!("[Publish] {} reachable again", publisher.url());
                    publish_failing = false;
                }
                Ok(()) => {}
                Err(e) if !publish_failing => {
                    warn!("[Publish] Failed to publish to {}: {}", publisher.url(), e);
                    publish_failing = true;
                }
                Err(e) => debug!("[Publish] Publish failed: {}", e),
            }
        }
    }

    info!("[Publish] Worker stopped after {} samples", samples);
    samples
}

/// Upload a summary of the activity log every `period` until shutdown.
pub async fn run_stats(
    log_path: PathBuf,
    uploader: StatsUploader,
    period: Duration,
    shutdown: CancellationToken,
) {
    info!(
        "[Stats] Uploading {} to {} every {}s",
        log_path.display(),
        uploader.url(),
        period.as_secs()
    );
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {}
        }

        let path = log_path.clone();
        let records = match tokio::task::spawn_blocking(move || read_records(&path)).await {
            Ok(Ok(records)) => records,
            Ok(Err(e)) => {
                warn!("[Stats] Failed to read {}: {}", log_path.display(), e);
                continue;
            }
            Err(e) => {
                error!("[Stats] Reader task failed: {}", e);
                continue;
            }
        };

        let summary = aggregate(&records, Local::now().fixed_offset());
        match uploader.upload(&summary).await {
            Ok(()) => info!(
                "[Stats] Uploaded {} samples in {} buckets",
                summary.total_samples,
                summary.buckets.len()
            ),
            Err(e) => warn!("[Stats] Upload failed: {}", e),
        }
    }

    info!("[Stats] Worker stopped");
}

async fn next_signal(signal: &mut Option<Signal>) {
    match signal {
        Some(signal) => {
            signal.recv().await;
        }
        None => std::future::pending().await,
    }
}

fn install(kind: SignalKind, name: &str) -> Option<Signal> {
    signal(kind)
        .inspect_err(|e| error!("Failed to install {} handler: {}", name, e))
        .ok()
}

/// Cancel `shutdown` on the first SIGINT, SIGTERM or SIGQUIT.
///
/// Returns early, without cancelling, if the token is cancelled elsewhere.
pub async fn listen_for_shutdown(shutdown: CancellationToken) {
    let mut terminate = install(SignalKind::terminate(), "SIGTERM");
    let mut quit = install(SignalKind::quit(), "SIGQUIT");

    let received = tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => "SIGINT",
            Err(e) => {
                error!("Failed to listen for SIGINT: {}", e);
                return;
            }
        },
        _ = next_signal(&mut terminate) => "SIGTERM",
        _ = next_signal(&mut quit) => "SIGQUIT",
        _ = shutdown.cancelled() => return,
    };

    info!("Received {}, shutting down", received);
    shutdown.cancel();
}

fn is_quit_key(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case("q") || line.contains('\x1b')
}

/// Cancel `shutdown` when a line holding `q` or Esc is read from `input`.
///
/// The terminal is left in line mode, so the key takes effect on Enter.
/// End of input or a read error just stops watching.
pub async fn watch_quit_keys<R: AsyncRead + Unpin>(input: R, shutdown: CancellationToken) {
    let mut lines = BufReader::new(input).lines();
    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => return,
            line = lines.next_line() => line,
        };
        match line {
            Ok(Some(line)) if is_quit_key(&line) => {
                info!("Quit key pressed, shutting down");
                shutdown.cancel();
                return;
            }
            Ok(Some(_)) => {}
            Ok(None) => {
                debug!("Keyboard input closed, no longer watching for quit keys");
                return;
            }
            Err(e) => {
                warn!("Failed to read keyboard input: {}", e);
                return;
            }
        }
    }
}
