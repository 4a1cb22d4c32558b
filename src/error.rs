use thiserror::Error as ThisError;

use crate::instance_lock::InstanceLockError;
use crate::schedule::ScheduleError;

#[derive(ThisError, Debug)]
pub enum SignError {
    #[error("Display unavailable: {0}")]
    DisplayUnavailable(String),

    #[error("Invalid roster: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    InstanceLock(#[from] InstanceLockError),

    #[error("Tick loop panicked")]
    TickPanicked,

    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SignError>;
