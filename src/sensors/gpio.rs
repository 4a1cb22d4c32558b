//! Sysfs GPIO inputs and the three-position selector switch.
//!
//! The selector is a DPDT switch wired to two BCM pins:
//!
//! | Position | scheduled pin | forced-open pin |
//! |---|---|---|
//! | I (Scheduled) | high | - |
//! | II (ForcedOpen) | low | high |
//! | O (ForcedClosed) | low | low |

use super::SwitchPosition;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Default sysfs GPIO root on Raspberry Pi OS.
pub const DEFAULT_GPIO_ROOT: &str = "/sys/class/gpio";

/// A single input pin exported through sysfs.
#[derive(Debug)]
pub struct SysfsPin {
    number: u32,
    root: PathBuf,
    value_path: PathBuf,
}

impl SysfsPin {
    /// Export `number` (if not already exported) and configure it as an input.
    pub fn export_input(root: &Path, number: u32) -> io::Result<Self> {
        let pin_dir = root.join(format!("gpio{number}"));
        if !pin_dir.exists() {
            fs::write(root.join("export"), number.to_string())?;
        }
        fs::write(pin_dir.join("direction"), "in")?;
        Ok(Self {
            number,
            root: root.to_path_buf(),
            value_path: pin_dir.join("value"),
        })
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn is_high(&self) -> io::Result<bool> {
        let raw = fs::read_to_string(&self.value_path)?;
        match raw.trim() {
            "1" => Ok(true),
            "0" => Ok(false),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("gpio{} reported {:?}", self.number, other),
            )),
        }
    }

    pub fn unexport(self) -> io::Result<()> {
        fs::write(self.root.join("unexport"), self.number.to_string())
    }
}

/// The I / II / O override switch.
#[derive(Debug)]
pub struct SelectorSwitch {
    scheduled: SysfsPin,
    forced_open: SysfsPin,
}

impl SelectorSwitch {
    pub fn acquire(root: &Path, scheduled_pin: u32, forced_open_pin: u32) -> io::Result<Self> {
        let scheduled = SysfsPin::export_input(root, scheduled_pin)?;
        let forced_open = SysfsPin::export_input(root, forced_open_pin)?;
        Ok(Self {
            scheduled,
            forced_open,
        })
    }

    /// Read the switch. The forced-open pin is only consulted when the
    /// scheduled pin is low.
    pub fn read(&self) -> io::Result<SwitchPosition> {
        if self.scheduled.is_high()? {
            return Ok(SwitchPosition::Scheduled);
        }
        if self.forced_open.is_high()? {
            Ok(SwitchPosition::ForcedOpen)
        } else {
            Ok(SwitchPosition::ForcedClosed)
        }
    }

    pub fn release(self) -> io::Result<()> {
        let first = self.scheduled.unexport();
        let second = self.forced_open.unexport();
        first.and(second)
    }
}
