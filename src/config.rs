//! Runtime configuration.
//!
//! Defaults, overlaid with a `.env` file (see [`load_dotenv`]), overlaid with
//! the process environment, overlaid with command-line flags in `main`.

use crate::error::{Result, SignError};
use crate::output::display::Layout;
use crate::output::publish::DEFAULT_PUBLISH_URL;
use crate::sensors::DoorPolarity;
use crate::sensors::arduino::DEFAULT_DOOR_UID;
use crate::sensors::gpio::DEFAULT_GPIO_ROOT;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use strum::EnumString;

/// Split one `.env` line into key and value.
///
/// Blank lines and `#` comments yield `None`. Values may contain spaces
/// without quoting; one pair of surrounding quotes is stripped.
fn parse_dotenv_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let (key, value) = line.split_once('=')?;
    let value = value.trim();
    let unquoted = ['"', '\'']
        .iter()
        .find_map(|q| value.strip_prefix(*q)?.strip_suffix(*q))
        .unwrap_or(value);
    Some((key.trim(), unquoted))
}

/// Load `.env` from the working directory. Variables already set in the
/// environment win. Must run before any other thread is started.
pub fn load_dotenv() {
    load_dotenv_from(Path::new(".env"));
}

fn load_dotenv_from(path: &Path) {
    let Ok(content) = fs::read_to_string(path) else {
        return;
    };
    for (key, value) in content.lines().filter_map(parse_dotenv_line) {
        if std::env::var_os(key).is_none() {
            // SAFETY: called from main before the runtime and worker threads exist
            unsafe { std::env::set_var(key, value) };
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum SensorBackend {
    #[default]
    Hardware,
    Simulated,
}

#[derive(Debug, Clone)]
pub struct SensorConfig {
    pub backend: SensorBackend,
    pub gpio_enabled: bool,
    pub gpio_root: PathBuf,
    /// (scheduled, forced open) BCM pin numbers.
    pub switch_pins: (u32, u32),
    pub serial_ports: Vec<String>,
    pub serial_baud: u32,
    pub door_uid: u8,
    pub relay_uid: Option<u8>,
    pub door_polarity: DoorPolarity,
}

#[derive(Debug, Clone)]
pub struct DisplayConfig {
    pub studio_name: String,
    /// `None` renders to stdout.
    pub device: Option<PathBuf>,
    pub layout: Layout,
}

#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub publish_url: String,
    pub stats_url: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SignConfig {
    pub dev: bool,
    pub tick_ms: u64,
    pub schedule_path: Option<PathBuf>,
    pub activity_log: PathBuf,
    pub http_port: u16,
    pub sensors: SensorConfig,
    pub display: DisplayConfig,
    pub remote: RemoteConfig,
}

impl Default for SignConfig {
    fn default() -> Self {
        Self {
            dev: false,
            tick_ms: 33,
            schedule_path: None,
            activity_log: PathBuf::from("activity.log"),
            http_port: 8080,
            sensors: SensorConfig {
                backend: SensorBackend::Hardware,
                gpio_enabled: true,
                gpio_root: PathBuf::from(DEFAULT_GPIO_ROOT),
                switch_pins: (17, 27),
                serial_ports: (0..3).map(|n| format!("/dev/ttyACM{n}")).collect(),
                serial_baud: 9600,
                door_uid: DEFAULT_DOOR_UID,
                relay_uid: None,
                door_polarity: DoorPolarity::NonzeroOpen,
            },
            display: DisplayConfig {
                studio_name: "Design Studio".to_string(),
                device: None,
                layout: Layout::default(),
            },
            remote: RemoteConfig {
                publish_url: DEFAULT_PUBLISH_URL.to_string(),
                stats_url: None,
                api_key: None,
            },
        }
    }
}

/// Parse `key`'s value if it is set and non-empty.
fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| SignError::InvalidConfig(format!("{key}={raw}: {e}"))),
    }
}

fn flag(raw: &str) -> bool {
    !matches!(raw.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off")
}

fn list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl SignConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        let set = |key: &str| lookup(key).filter(|v| !v.is_empty());

        config.dev = set("DEV").is_some();
        if let Some(ms) = parsed(&lookup, "SIGN_TICK_MS")? {
            config.tick_ms = ms;
        }
        if let Some(name) = set("SIGN_STUDIO_NAME") {
            config.display.studio_name = name;
        }
        config.schedule_path = set("SIGN_SCHEDULE").map(PathBuf::from);

        let sensors = &mut config.sensors;
        if let Some(backend) = parsed(&lookup, "SIGN_SENSORS")? {
            sensors.backend = backend;
        }
        if let Some(gpio) = set("SIGN_GPIO") {
            sensors.gpio_enabled = flag(&gpio);
        }
        if let Some(root) = set("SIGN_GPIO_ROOT") {
            sensors.gpio_root = PathBuf::from(root);
        }
        if let Some(pins) = set("SIGN_SWITCH_PINS") {
            sensors.switch_pins = match list(&pins).as_slice() {
                [scheduled, forced_open] => (
                    parse_pin("SIGN_SWITCH_PINS", scheduled)?,
                    parse_pin("SIGN_SWITCH_PINS", forced_open)?,
                ),
                _ => {
                    return Err(SignError::InvalidConfig(format!(
                        "SIGN_SWITCH_PINS={pins}: expected two pins"
                    )));
                }
            };
        }
        if let Some(ports) = set("SIGN_SERIAL_PORTS") {
            sensors.serial_ports = list(&ports);
        }
        if let Some(baud) = parsed(&lookup, "SIGN_SERIAL_BAUD")? {
            sensors.serial_baud = baud;
        }
        if let Some(uid) = parsed(&lookup, "SIGN_DOOR_UID")? {
            sensors.door_uid = uid;
        }
        sensors.relay_uid = parsed(&lookup, "SIGN_RELAY_UID")?;
        if let Some(polarity) = parsed(&lookup, "SIGN_DOOR_POLARITY")? {
            sensors.door_polarity = polarity;
        }

        config.display.device = set("SIGN_DISPLAY")
            .filter(|d| d != "-")
            .map(PathBuf::from);
        if let Some(layout) = parsed(&lookup, "SIGN_DISPLAY_SIZE")? {
            config.display.layout = layout;
        }

        if let Some(url) = set("SIGN_PUBLISH_URL") {
            config.remote.publish_url = url;
        }
        config.remote.stats_url = set("SIGN_STATS_URL");
        config.remote.api_key = set("SIGN_API_KEY").or_else(|| set("x_api_key"));

        if let Some(path) = set("SIGN_ACTIVITY_LOG") {
            config.activity_log = PathBuf::from(path);
        }
        if let Some(port) = parsed(&lookup, "SIGN_HTTP_PORT")? {
            config.http_port = port;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_ms == 0 {
            return Err(SignError::InvalidConfig("tick period must be positive".into()));
        }
        if self.sensors.switch_pins.0 == self.sensors.switch_pins.1 {
            return Err(SignError::InvalidConfig(
                "selector switch pins must differ".into(),
            ));
        }
        if self.sensors.relay_uid == Some(self.sensors.door_uid) {
            return Err(SignError::InvalidConfig(
                "relay and door Arduinos need different identities".into(),
            ));
        }
        Ok(())
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// The API key, unless dev mode keeps everything local.
    pub fn remote_api_key(&self) -> Option<&str> {
        if self.dev {
            None
        } else {
            self.remote.api_key.as_deref()
        }
    }

    pub fn diagnostics_enabled(&self) -> bool {
        self.http_port != 0
    }
}

fn parse_pin(key: &str, raw: &str) -> Result<u32> {
    raw.parse()
        .map_err(|e| SignError::InvalidConfig(format!("{key}: pin {raw:?}: {e}")))
}
