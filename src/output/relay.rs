//! Relay output on a dedicated Arduino.
//!
//! The relay is only written when the open/closed state changes (and once on
//! the first tick), so the serial line stays quiet at 30 ticks per second.

use super::{RelayError, RelayPort};
use crate::sensors::arduino::Arduino;
use log::{debug, info};
use std::io::{Read, Write};

pub struct ArduinoRelay<P> {
    board: Arduino<P>,
    last: Option<bool>,
}

impl<P: Read + Write> ArduinoRelay<P> {
    pub fn new(board: Arduino<P>) -> Self {
        info!("[Relay] Using Arduino on {}", board.path());
        Self { board, last: None }
    }
}

impl<P: Read + Write + Send> RelayPort for ArduinoRelay<P> {
    fn set_open(&mut self, open: bool) -> Result<(), RelayError> {
        if self.last == Some(open) {
            return Ok(());
        }
        self.board.set_relay(open)?;
        debug!("[Relay] Switched {}", if open { "on" } else { "off" });
        self.last = Some(open);
        Ok(())
    }

    fn release(self: Box<Self>) {
        self.board.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::arduino::testing::ScriptedPort;
    use crate::sensors::arduino::{RELAY_CHANGE, RELAY_CLOSED, RELAY_OPEN};

    #[test]
    fn test_writes_only_on_change() {
        let port = ScriptedPort::default();
        let written = port.written.clone();
        let mut relay = ArduinoRelay::new(Arduino::new("/dev/ttyACM1", port));

        for open in [false, false, true, true, true, false] {
            relay.set_open(open).unwrap();
        }

        assert_eq!(
            *written.lock(),
            [
                RELAY_CHANGE,
                RELAY_CLOSED,
                RELAY_CHANGE,
                RELAY_OPEN,
                RELAY_CHANGE,
                RELAY_CLOSED
            ]
        );
    }
}
