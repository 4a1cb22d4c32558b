//! Sensor inputs for the sign.
//!
//! The state machine only sees a [`SensorPort`]: something that can report the
//! override switch position, whether the door is open, and whether there is
//! motion. Backends never fail from the caller's point of view; every read has
//! a fail-safe default that an implementation must fall back to:
//!
//! | Read | Default on failure |
//! |---|---|
//! | switch position | [`SwitchPosition::Scheduled`] |
//! | door open | `true` |
//! | motion | `false` |
//!
//! Available backends:
//! - [`hardware::HardwareSensors`]: GPIO selector switch + door/motion Arduino
//! - [`simulated::SimulatedSensors`]: in-memory values for dev mode and bench tests

pub mod arduino;
pub mod binary_sensor;
pub mod gpio;
pub mod hardware;
pub mod simulated;

pub use binary_sensor::BinarySensor;
pub use hardware::HardwareSensors;
pub use simulated::SimulatedSensors;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Position of the three-way override switch (I / II / O).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
pub enum SwitchPosition {
    /// Normal operation: open/closed follows the roster and the door.
    #[default]
    Scheduled,
    /// Open as long as the door is open.
    ForcedOpen,
    /// Closed, whatever else is going on.
    ForcedClosed,
}

impl SwitchPosition {
    /// Numeric code used by older activity logs.
    pub fn legacy_code(self) -> u8 {
        match self {
            Self::Scheduled => 0,
            Self::ForcedOpen => 1,
            Self::ForcedClosed => 2,
        }
    }

    pub fn from_legacy_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Scheduled),
            1 => Some(Self::ForcedOpen),
            2 => Some(Self::ForcedClosed),
            _ => None,
        }
    }
}

/// Which raw byte value from the door sensor means "open".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum DoorPolarity {
    /// Any non-zero reading means the door is open.
    #[default]
    NonzeroOpen,
    /// A zero reading means the door is open.
    ZeroOpen,
}

impl DoorPolarity {
    pub fn is_open(self, raw: u8) -> bool {
        match self {
            Self::NonzeroOpen => raw != 0,
            Self::ZeroOpen => raw == 0,
        }
    }
}

/// All sensor readings for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SensorSnapshot {
    pub switch_position: SwitchPosition,
    pub door_open: bool,
    pub motion_detected: bool,
}

/// Read-side port: the sign pulls sensor data through this each tick.
pub trait SensorPort: Send {
    /// Three-position selector. Falls back to [`SwitchPosition::Scheduled`].
    fn read_switch_position(&mut self) -> SwitchPosition;

    /// Door sensor. Falls back to `true` when absent or unreadable.
    fn read_door_open(&mut self) -> bool;

    /// Motion sensor. Falls back to `false` when absent or unreadable.
    fn read_motion(&mut self) -> bool;

    /// Read every sensor once.
    fn read_all(&mut self) -> SensorSnapshot {
        SensorSnapshot {
            switch_position: self.read_switch_position(),
            door_open: self.read_door_open(),
            motion_detected: self.read_motion(),
        }
    }

    /// Give back any hardware handles. Called exactly once, on shutdown.
    fn release(self: Box<Self>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_switch_position_names_round_trip() {
        for position in [
            SwitchPosition::Scheduled,
            SwitchPosition::ForcedOpen,
            SwitchPosition::ForcedClosed,
        ] {
            assert_eq!(position.to_string().parse::<SwitchPosition>().unwrap(), position);
            assert_eq!(SwitchPosition::from_legacy_code(position.legacy_code()), Some(position));
        }
        assert_eq!(SwitchPosition::from_legacy_code(3), None);
    }

    #[test]
    fn test_door_polarity() {
        assert!(DoorPolarity::NonzeroOpen.is_open(1));
        assert!(!DoorPolarity::NonzeroOpen.is_open(0));
        assert!(DoorPolarity::ZeroOpen.is_open(0));
        assert!(!DoorPolarity::ZeroOpen.is_open(1));
        assert_eq!("zero-open".parse::<DoorPolarity>().unwrap(), DoorPolarity::ZeroOpen);
    }
}
