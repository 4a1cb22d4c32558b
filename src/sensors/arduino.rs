//! Serial link to the sign's helper Arduinos.
//!
//! Each Arduino answers single-byte requests with a single-byte reply:
//!
//! | Request | Byte | Reply |
//! |---|---|---|
//! | door sensor | `4` | raw door reading |
//! | motion sensor | `8` | `0` = none, anything else = motion |
//! | relay change | `16`, then `0`/`2` | none |
//! | identify | `32` | the board's identity byte |
//!
//! Boards enumerate as `/dev/ttyACM*` in no particular order, so a board is
//! found by probing each candidate port with an identify request until one
//! answers with the wanted identity ([`ArduinoBus::claim`]).

use super::DoorPolarity;
use log::{info, warn};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::io::{self, Read, Write};
use std::time::Duration;

pub const DOOR_SENSOR_REQ: u8 = 4;
pub const MOTION_SENSOR_REQ: u8 = 8;
pub const RELAY_CHANGE: u8 = 16;
pub const IDENT_REQ: u8 = 32;

/// Relay argument for "sign open".
pub const RELAY_OPEN: u8 = 2;
/// Relay argument for "sign closed".
pub const RELAY_CLOSED: u8 = 0;

/// Identity byte of the door/motion board.
pub const DEFAULT_DOOR_UID: u8 = 16;

/// Opens a candidate port by path.
pub trait PortOpener: Send + Sync {
    type Port: Read + Write + Send;

    fn open(&self, path: &str) -> io::Result<Self::Port>;
}

/// Opens real serial ports.
#[derive(Debug, Clone)]
pub struct SerialOpener {
    pub baud_rate: u32,
    pub timeout: Duration,
}

impl PortOpener for SerialOpener {
    type Port = Box<dyn serialport::SerialPort>;

    fn open(&self, path: &str) -> io::Result<Self::Port> {
        serialport::new(path, self.baud_rate)
            .timeout(self.timeout)
            .open()
            .map_err(io::Error::from)
    }
}

/// One claimed Arduino.
pub struct Arduino<P> {
    path: String,
    port: P,
}

impl<P: Read + Write> Arduino<P> {
    pub fn new(path: impl Into<String>, port: P) -> Self {
        Self {
            path: path.into(),
            port,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Send a one-byte request and wait for a one-byte reply.
    ///
    /// `Ok(None)` means the board stayed silent until the port timeout.
    pub fn request(&mut self, req: u8) -> io::Result<Option<u8>> {
        self.port.write_all(&[req])?;
        self.port.flush()?;
        let mut buf = [0u8; 1];
        match self.port.read(&mut buf) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(buf[0])),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn identify(&mut self) -> io::Result<Option<u8>> {
        self.request(IDENT_REQ)
    }

    /// `None` when the board did not answer.
    pub fn read_door(&mut self, polarity: DoorPolarity) -> io::Result<Option<bool>> {
        Ok(self.request(DOOR_SENSOR_REQ)?.map(|raw| polarity.is_open(raw)))
    }

    /// `None` when the board did not answer.
    pub fn read_motion(&mut self) -> io::Result<Option<bool>> {
        Ok(self.request(MOTION_SENSOR_REQ)?.map(|raw| raw != 0))
    }

    pub fn set_relay(&mut self, open: bool) -> io::Result<()> {
        let arg = if open { RELAY_OPEN } else { RELAY_CLOSED };
        self.port.write_all(&[RELAY_CHANGE, arg])?;
        self.port.flush()
    }

    /// Flush and drop the port.
    pub fn close(mut self) {
        if let Err(e) = self.port.flush() {
            warn!("[Sensors] Failed to flush {}: {}", self.path, e);
        }
    }
}

/// The set of candidate serial ports, shared by everything that needs a board.
pub struct ArduinoBus<O: PortOpener> {
    opener: O,
    ports: Vec<String>,
    unavailable: Mutex<HashSet<String>>,
}

impl<O: PortOpener> ArduinoBus<O> {
    pub fn new(opener: O, ports: Vec<String>) -> Self {
        Self {
            opener,
            ports,
            unavailable: Mutex::new(HashSet::new()),
        }
    }

    /// Probe the remaining ports for the board answering with `uid`.
    ///
    /// A port that gets claimed, or that cannot be opened at all, is never
    /// probed again.
    pub fn claim(&self, uid: u8) -> Option<Arduino<O::Port>> {
        let mut unavailable = self.unavailable.lock();
        for path in &self.ports {
            if unavailable.contains(path) {
                continue;
            }
            let port = match self.opener.open(path) {
                Ok(port) => port,
                Err(e) => {
                    warn!("[Sensors] Failed to open {} while looking for {}: {}", path, uid, e);
                    unavailable.insert(path.clone());
                    continue;
                }
            };
            let mut arduino = Arduino::new(path.clone(), port);
            match arduino.identify() {
                Ok(Some(id)) if id == uid => {
                    info!("[Sensors] Found Arduino {} on {}", uid, path);
                    unavailable.insert(path.clone());
                    return Some(arduino);
                }
                Ok(Some(id)) => info!("[Sensors] {} is Arduino {}, not {}", path, id, uid),
                Ok(None) => warn!("[Sensors] Identify request on {} timed out", path),
                Err(e) => warn!("[Sensors] Identify request on {} failed: {}", path, e),
            }
            arduino.close();
        }
        warn!("[Sensors] No port found for Arduino {}", uid);
        None
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Arc;

    /// In-memory port: records writes, answers reads from a script.
    #[derive(Clone, Default)]
    pub struct ScriptedPort {
        pub written: Arc<Mutex<Vec<u8>>>,
        pub replies: Arc<Mutex<VecDeque<io::Result<u8>>>>,
    }

    impl ScriptedPort {
        pub fn replying(replies: impl IntoIterator<Item = io::Result<u8>>) -> Self {
            let port = Self::default();
            port.replies.lock().extend(replies);
            port
        }
    }

    impl Read for ScriptedPort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.replies.lock().pop_front() {
                Some(Ok(byte)) => {
                    buf[0] = byte;
                    Ok(1)
                }
                Some(Err(e)) => Err(e),
                None => Ok(0),
            }
        }
    }

    impl Write for ScriptedPort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Opener handing out pre-built scripted ports; unknown paths fail to open.
    #[derive(Default)]
    pub struct ScriptedOpener {
        pub ports: Mutex<HashMap<String, ScriptedPort>>,
        pub opened: Mutex<Vec<String>>,
    }

    impl ScriptedOpener {
        pub fn with(mut self, path: &str, port: ScriptedPort) -> Self {
            self.ports.get_mut().insert(path.to_string(), port);
            self
        }
    }

    impl PortOpener for ScriptedOpener {
        type Port = ScriptedPort;

        fn open(&self, path: &str) -> io::Result<ScriptedPort> {
            self.opened.lock().push(path.to_string());
            self.ports
                .lock()
                .get(path)
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))
        }
    }
}
