//! Bench tool for the sign's sensors.
//!
//! Usage:
//!   cargo run --bin sensor-probe
//!   cargo run --bin sensor-probe -- --interval-ms 100 --count 50
//!   cargo run --bin sensor-probe -- --identify
//!
//! Reads the selector switch and the door/motion Arduino with the same
//! configuration as the sign and prints every reading, or with `--identify`
//! lists which Arduino answers on which serial port.

use clap::Parser;
use log::{error, info};
use open_sign::config::SignConfig;
use open_sign::hardware::SERIAL_TIMEOUT;
use open_sign::sensors::arduino::{Arduino, PortOpener, SerialOpener};
use open_sign::sensors::gpio::SelectorSwitch;
use open_sign::sensors::{HardwareSensors, SensorPort};
use std::process::ExitCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "sensor-probe")]
#[command(about = "Print live readings from the sign's switch, door and motion sensors")]
struct Cli {
    /// Delay between readings
    #[arg(long, default_value_t = 500)]
    interval_ms: u64,

    /// Stop after this many readings
    #[arg(long)]
    count: Option<u64>,

    /// Ask every candidate serial port for its Arduino identity and exit
    #[arg(long)]
    identify: bool,
}

fn opener(config: &SignConfig) -> SerialOpener {
    SerialOpener {
        baud_rate: config.sensors.serial_baud,
        timeout: SERIAL_TIMEOUT,
    }
}

fn identify(config: &SignConfig) {
    let opener = opener(config);
    for path in &config.sensors.serial_ports {
        match opener.open(path) {
            Ok(port) => {
                let mut arduino = Arduino::new(path.clone(), port);
                match arduino.identify() {
                    Ok(Some(id)) => println!("{path}: Arduino {id}"),
                    Ok(None) => println!("{path}: no answer"),
                    Err(e) => println!("{path}: identify failed: {e}"),
                }
                arduino.close();
            }
            Err(e) => println!("{path}: cannot open: {e}"),
        }
    }
}

fn probe(config: SignConfig, interval: Duration, count: Option<u64>, stop: CancellationToken) {
    let switch = if config.sensors.gpio_enabled {
        let (scheduled, forced_open) = config.sensors.switch_pins;
        SelectorSwitch::acquire(&config.sensors.gpio_root, scheduled, forced_open)
            .inspect_err(|e| error!("Selector switch unavailable: {}", e))
            .ok()
    } else {
        None
    };
    let bus = open_sign::sensors::arduino::ArduinoBus::new(
        opener(&config),
        config.sensors.serial_ports.clone(),
    );
    let board = bus.claim(config.sensors.door_uid);
    let mut sensors = Box::new(HardwareSensors::new(
        switch,
        board,
        config.sensors.door_polarity,
    ));

    let mut taken = 0;
    while !stop.is_cancelled() && count.is_none_or(|n| taken < n) {
        let reading = sensors.read_all();
        println!(
            "{}  switch={:<12} door_open={:<5} motion={}",
            chrono::Local::now().format("%H:%M:%S%.3f"),
            reading.switch_position.to_string(),
            reading.door_open,
            reading.motion_detected
        );
        taken += 1;
        std::thread::sleep(interval);
    }

    sensors.release();
    info!("Probe finished after {} readings", taken);
}

#[tokio::main]
async fn main() -> ExitCode {
    open_sign::config::load_dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = match SignConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if cli.identify {
        identify(&config);
        return ExitCode::SUCCESS;
    }

    let stop = CancellationToken::new();
    let interval = Duration::from_millis(cli.interval_ms);
    let mut probe = tokio::task::spawn_blocking({
        let stop = stop.clone();
        move || probe(config, interval, cli.count, stop)
    });

    let finished = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Stopping");
            stop.cancel();
            probe.await
        }
        result = &mut probe => result,
    };

    match finished {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Probe panicked: {}", e);
            ExitCode::FAILURE
        }
    }
}
