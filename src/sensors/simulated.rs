//! In-memory sensor backend.
//!
//! Used in development mode and on benches without the switch or Arduino
//! attached. Values are changed through the diagnostics server or directly in
//! tests; the tick loop reads them like real sensors.

use super::{BinarySensor, SensorPort, SwitchPosition};
use log::info;
use parking_lot::RwLock;
use std::sync::Arc;

pub struct SimulatedSensors {
    switch_position: RwLock<SwitchPosition>,
    door: BinarySensor,
    motion: BinarySensor,
}

impl SimulatedSensors {
    /// Door open, no motion, switch on Scheduled.
    pub fn new() -> Self {
        Self {
            switch_position: RwLock::new(SwitchPosition::Scheduled),
            door: BinarySensor::new(true),
            motion: BinarySensor::new(false),
        }
    }

    pub fn set_switch_position(&self, position: SwitchPosition) {
        let mut current = self.switch_position.write();
        if *current != position {
            info!("[Sim] Switch moved to {}", position);
            *current = position;
        }
    }

    pub fn switch_position(&self) -> SwitchPosition {
        *self.switch_position.read()
    }

    pub fn door(&self) -> &BinarySensor {
        &self.door
    }

    pub fn motion(&self) -> &BinarySensor {
        &self.motion
    }
}

impl Default for SimulatedSensors {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorPort for Arc<SimulatedSensors> {
    fn read_switch_position(&mut self) -> SwitchPosition {
        self.switch_position()
    }

    fn read_door_open(&mut self) -> bool {
        self.door.get()
    }

    fn read_motion(&mut self) -> bool {
        self.motion.get()
    }
}
