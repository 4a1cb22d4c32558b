//! Display state owned by the tick loop.

use super::decision::Decision;
use crate::sensors::{SensorSnapshot, SwitchPosition};
use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use strum::Display;

pub const OPEN_TITLE: &str = "Open";
pub const CLOSED_TITLE: &str = "Closed";

/// Background fill. Road-sign red and green, readable for protanomalous viewers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
pub enum Background {
    Red,
    Green,
}

impl Background {
    pub fn for_open(is_open: bool) -> Self {
        if is_open { Self::Green } else { Self::Red }
    }

    pub fn rgb(self) -> (u8, u8, u8) {
        match self {
            Self::Red => (199, 0, 43),
            Self::Green => (0, 95, 77),
        }
    }

    /// CSS form, e.g. `rgb(0,95,77)`.
    pub fn css(self) -> String {
        let (r, g, b) = self.rgb();
        format!("rgb({},{},{})", r, g, b)
    }
}

/// Everything the outputs need to know about the sign after a tick.
///
/// Fields are only changed through [`SignState::apply`], which keeps the
/// title and background in line with `is_open`. Outputs get clones.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignState {
    initialized: bool,
    is_open: bool,
    switch_position: SwitchPosition,
    motion_detected: bool,
    title: String,
    subtitle: String,
    background: Background,
    last_tick: Option<DateTime<FixedOffset>>,
}

impl SignState {
    /// The state before the first tick: closed, nothing acquired yet.
    pub fn new() -> Self {
        Self {
            initialized: false,
            is_open: false,
            switch_position: SwitchPosition::Scheduled,
            motion_detected: false,
            title: CLOSED_TITLE.to_string(),
            subtitle: String::new(),
            background: Background::Red,
            last_tick: None,
        }
    }

    pub(crate) fn mark_initialized(&mut self) {
        self.initialized = true;
    }

    /// Fold one tick's inputs and decision into the state.
    pub fn apply(&mut self, sensors: &SensorSnapshot, decision: Decision, now: DateTime<FixedOffset>) {
        self.is_open = decision.is_open;
        self.switch_position = sensors.switch_position;
        self.motion_detected = sensors.motion_detected;
        self.title = if decision.is_open { OPEN_TITLE } else { CLOSED_TITLE }.to_string();
        self.subtitle = decision.subtitle;
        self.background = Background::for_open(decision.is_open);
        self.last_tick = Some(now);
    }

    pub fn initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn switch_position(&self) -> SwitchPosition {
        self.switch_position
    }

    pub fn motion_detected(&self) -> bool {
        self.motion_detected
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn subtitle(&self) -> &str {
        &self.subtitle
    }

    pub fn background(&self) -> Background {
        self.background
    }

    pub fn last_tick(&self) -> Option<DateTime<FixedOffset>> {
        self.last_tick
    }
}

impl Default for SignState {
    fn default() -> Self {
        Self::new()
    }
}
