//! Output side of the sign.
//!
//! ```text
//!                     ┌──▶ RenderPort   (display, every tick)
//! SignState ──▶ OutputDispatcher ──▶ hand-off slot ──▶ log + publish worker
//!                     └──▶ RelayPort    (optional, every tick)
//! ```
//!
//! The three outputs are independent and best-effort: a failing display does
//! not stop the hand-off, a failing relay does not stop anything, and none of
//! them can fail the tick.

pub mod activity_log;
pub mod cache;
pub mod display;
pub mod publish;
pub mod relay;
pub mod stats;

use crate::sign::{Background, SignState};
use log::{info, warn};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("display write failed: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("relay write failed: {0}")]
    Io(#[from] io::Error),
}

/// Draws a frame. Implemented by the display.
pub trait RenderPort: Send {
    fn render(
        &mut self,
        title: &str,
        subtitle: &str,
        background: Background,
    ) -> Result<(), RenderError>;

    /// Tear down the display surface. Called exactly once, on shutdown.
    fn release(self: Box<Self>) {}
}

/// Drives a physical open/closed output (relay, servo flag).
pub trait RelayPort: Send {
    fn set_open(&mut self, open: bool) -> Result<(), RelayError>;

    /// Called exactly once, on shutdown.
    fn release(self: Box<Self>) {}
}

/// Single-slot hand-off between the tick loop and the background workers.
///
/// Only the most recent state is kept; a slow reader skips intermediate ones.
pub type StateSender = watch::Sender<Option<SignState>>;
pub type StateReceiver = watch::Receiver<Option<SignState>>;

pub fn handoff() -> (StateSender, StateReceiver) {
    watch::channel(None)
}

/// Fans a finished tick out to render, hand-off and relay.
pub struct OutputDispatcher {
    handoff: StateSender,
    render_failing: AtomicBool,
    relay_failing: AtomicBool,
}

impl OutputDispatcher {
    pub fn new(handoff: StateSender) -> Self {
        Self {
            handoff,
            render_failing: AtomicBool::new(false),
            relay_failing: AtomicBool::new(false),
        }
    }

    /// Another reader of the hand-off slot.
    pub fn subscribe(&self) -> StateReceiver {
        self.handoff.subscribe()
    }

    pub fn dispatch(
        &self,
        state: &SignState,
        display: &mut dyn RenderPort,
        relay: Option<&mut dyn RelayPort>,
    ) {
        let rendered = display.render(state.title(), state.subtitle(), state.background());
        report("[Display] Render", &self.render_failing, rendered);

        self.handoff.send_replace(Some(state.clone()));

        if let Some(relay) = relay {
            report("[Relay] Update", &self.relay_failing, relay.set_open(state.is_open()));
        }
    }
}

fn report<E: std::fmt::Display>(what: &str, failing: &AtomicBool, result: Result<(), E>) {
    match result {
        Ok(()) => {
            if failing.swap(false, Ordering::Relaxed) {
                info!("{} recovered", what);
            }
        }
        Err(e) => {
            if !failing.swap(true, Ordering::Relaxed) {
                warn!("{} failed: {}", what, e);
            }
        }
    }
}
