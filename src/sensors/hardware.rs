//! Production sensor backend: GPIO selector switch plus the door/motion Arduino.
//!
//! Either half may be missing. A missing or failing switch reads as
//! [`SwitchPosition::Scheduled`]; a missing or silent Arduino reads as door
//! open, no motion. The mentor on duty can always override with the switch.

use super::arduino::Arduino;
use super::gpio::SelectorSwitch;
use super::{DoorPolarity, SensorPort, SwitchPosition};
use log::{debug, info, warn};
use std::io::{Read, Write};

/// Remembers whether a failing input was already reported, so a broken
/// sensor warns once instead of every tick.
#[derive(Debug, Default)]
struct FaultLatch {
    reported: bool,
}

impl FaultLatch {
    fn fail(&mut self, what: &str, detail: &dyn std::fmt::Display) {
        if self.reported {
            debug!("[Sensors] {} read failed: {}", what, detail);
        } else {
            warn!("[Sensors] {} read failed, using fail-safe default: {}", what, detail);
            self.reported = true;
        }
    }

    fn ok(&mut self, what: &str) {
        if self.reported {
            info!("[Sensors] {} readable again", what);
            self.reported = false;
        }
    }
}

pub struct HardwareSensors<P> {
    switch: Option<SelectorSwitch>,
    board: Option<Arduino<P>>,
    polarity: DoorPolarity,
    switch_fault: FaultLatch,
    door_fault: FaultLatch,
    motion_fault: FaultLatch,
}

impl<P: Read + Write + Send> HardwareSensors<P> {
    pub fn new(
        switch: Option<SelectorSwitch>,
        board: Option<Arduino<P>>,
        polarity: DoorPolarity,
    ) -> Self {
        if switch.is_none() {
            info!("[Sensors] No selector switch, assuming Scheduled");
        }
        if board.is_none() {
            info!("[Sensors] No door sensor, assuming door open");
        }
        Self {
            switch,
            board,
            polarity,
            switch_fault: FaultLatch::default(),
            door_fault: FaultLatch::default(),
            motion_fault: FaultLatch::default(),
        }
    }
}

impl<P: Read + Write + Send> SensorPort for HardwareSensors<P> {
    fn read_switch_position(&mut self) -> SwitchPosition {
        let Some(switch) = &self.switch else {
            return SwitchPosition::Scheduled;
        };
        match switch.read() {
            Ok(position) => {
                self.switch_fault.ok("Switch");
                position
            }
            Err(e) => {
                self.switch_fault.fail("Switch", &e);
                SwitchPosition::Scheduled
            }
        }
    }

    fn read_door_open(&mut self) -> bool {
        let Some(board) = &mut self.board else {
            return true;
        };
        match board.read_door(self.polarity) {
            Ok(Some(open)) => {
                self.door_fault.ok("Door");
                open
            }
            Ok(None) => {
                self.door_fault.fail("Door", &"no reply");
                true
            }
            Err(e) => {
                self.door_fault.fail("Door", &e);
                true
            }
        }
    }

    fn read_motion(&mut self) -> bool {
        let Some(board) = &mut self.board else {
            return false;
        };
        match board.read_motion() {
            Ok(Some(motion)) => {
                self.motion_fault.ok("Motion");
                motion
            }
            Ok(None) => {
                self.motion_fault.fail("Motion", &"no reply");
                false
            }
            Err(e) => {
                self.motion_fault.fail("Motion", &e);
                false
            }
        }
    }

    fn release(self: Box<Self>) {
        let this = *self;
        if let Some(switch) = this.switch
            && let Err(e) = switch.release()
        {
            warn!("[Sensors] Failed to unexport switch pins: {}", e);
        }
        if let Some(board) = this.board {
            board.close();
        }
        info!("[Sensors] Released");
    }
}
