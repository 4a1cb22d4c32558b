//! Production peripheral wiring.
//!
//! Builds the display, the sensor backend and the optional relay from
//! [`SignConfig`] when the tick loop asks for them. Only the display is
//! mandatory: a missing switch or Arduino degrades to the fail-safe sensor
//! defaults, a missing relay board just means no relay output.

use crate::config::{DisplayConfig, SensorBackend, SensorConfig, SignConfig};
use crate::error::Result;
use crate::output::RelayPort;
use crate::output::display::TerminalDisplay;
use crate::output::relay::ArduinoRelay;
use crate::sensors::arduino::{ArduinoBus, SerialOpener};
use crate::sensors::gpio::SelectorSwitch;
use crate::sensors::{HardwareSensors, SensorPort, SimulatedSensors};
use crate::sign::{PeripheralSource, Peripherals};
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

/// How long to wait for an Arduino's one-byte reply.
pub const SERIAL_TIMEOUT: Duration = Duration::from_millis(250);

pub struct HardwarePeripherals {
    sensors: SensorConfig,
    display: DisplayConfig,
    simulated: Option<Arc<SimulatedSensors>>,
}

impl HardwarePeripherals {
    pub fn new(config: &SignConfig) -> Self {
        let simulated = match config.sensors.backend {
            SensorBackend::Simulated => Some(Arc::new(SimulatedSensors::new())),
            SensorBackend::Hardware => None,
        };
        Self {
            sensors: config.sensors.clone(),
            display: config.display.clone(),
            simulated,
        }
    }

    /// The in-memory sensors, when the simulated backend is selected.
    pub fn simulated(&self) -> Option<Arc<SimulatedSensors>> {
        self.simulated.clone()
    }

    fn bus(&self) -> ArduinoBus<SerialOpener> {
        let opener = SerialOpener {
            baud_rate: self.sensors.serial_baud,
            timeout: SERIAL_TIMEOUT,
        };
        ArduinoBus::new(opener, self.sensors.serial_ports.clone())
    }

    fn selector_switch(&self) -> Option<SelectorSwitch> {
        if !self.sensors.gpio_enabled {
            info!("[Sensors] GPIO disabled");
            return None;
        }
        let (scheduled, forced_open) = self.sensors.switch_pins;
        match SelectorSwitch::acquire(&self.sensors.gpio_root, scheduled, forced_open) {
            Ok(switch) => Some(switch),
            Err(e) => {
                warn!(
                    "[Sensors] Failed to acquire selector switch on GPIO {}/{}: {}",
                    scheduled, forced_open, e
                );
                None
            }
        }
    }
}

impl PeripheralSource for HardwarePeripherals {
    fn acquire(&mut self) -> Result<Peripherals> {
        let display = TerminalDisplay::open(
            self.display.device.as_deref(),
            self.display.layout,
            self.display.studio_name.clone(),
        )?;

        if let Some(simulated) = &self.simulated {
            info!("[Sensors] Using simulated sensors");
            return Ok(Peripherals {
                sensors: Box::new(simulated.clone()),
                display: Box::new(display),
                relay: None,
            });
        }

        let bus = self.bus();
        let sensors: Box<dyn SensorPort> = Box::new(HardwareSensors::new(
            self.selector_switch(),
            bus.claim(self.sensors.door_uid),
            self.sensors.door_polarity,
        ));
        let relay = self
            .sensors
            .relay_uid
            .and_then(|uid| bus.claim(uid))
            .map(|board| Box::new(ArduinoRelay::new(board)) as Box<dyn RelayPort>);

        Ok(Peripherals {
            sensors,
            display: Box::new(display),
            relay,
        })
    }
}
