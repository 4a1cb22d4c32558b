//! Open/Closed sign library.
//!
//! Drives a makerspace "Open / Closed" sign from a weekly mentor roster, a
//! door sensor and a three-position override switch, and mirrors the result
//! to a remote endpoint and an activity log.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod hardware;
pub mod instance_lock;
pub mod output;
pub mod schedule;
pub mod sensors;
pub mod sign;
pub mod workers;
