use clap::Parser;
use log::{error, info, warn};
use open_sign::config::{self, SensorBackend, SignConfig};
use open_sign::diagnostics::{self, DiagnosticsState};
use open_sign::error::{Result, SignError};
use open_sign::hardware::HardwarePeripherals;
use open_sign::instance_lock::InstanceLock;
use open_sign::output::activity_log::ActivityLog;
use open_sign::output::publish::HttpPublisher;
use open_sign::output::stats::StatsUploader;
use open_sign::output::{OutputDispatcher, handoff};
use open_sign::schedule::{ScheduleTable, roster};
use open_sign::sign::{SignMachine, machine};
use open_sign::workers::{self, LOG_PUBLISH_PERIOD, STATS_PERIOD, StateSinks};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Open/Closed sign for the studio.
#[derive(Parser, Debug)]
#[command(name = "open-sign", version)]
struct Args {
    /// JSON roster file replacing the built-in roster
    #[arg(long, env = "SIGN_SCHEDULE")]
    schedule: Option<PathBuf>,

    /// Development mode: no publishing, no statistics, no activity log
    #[arg(long)]
    dev: bool,

    /// Tick period in milliseconds
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Print the roster and exit
    #[arg(long)]
    print_schedule: bool,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() -> ExitCode {
    // before any thread exists, see load_dotenv
    config::load_dotenv();
    init_logger();
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(args: &Args) -> Result<SignConfig> {
    let mut config = SignConfig::from_env()?;
    config.dev |= args.dev;
    if let Some(ms) = args.tick_ms {
        config.tick_ms = ms;
    }
    if let Some(path) = &args.schedule {
        config.schedule_path = Some(path.clone());
    }
    config.validate()?;
    Ok(config)
}

fn load_schedule(config: &SignConfig) -> Result<ScheduleTable> {
    let table = match &config.schedule_path {
        Some(path) => roster::load(path)?,
        None => roster::built_in()?,
    };
    Ok(table)
}

fn print_schedule(schedule: &ScheduleTable) {
    for shift in schedule.shifts() {
        println!(
            "{}  {}-{}  {}",
            shift.weekday(),
            shift.start().format("%H:%M"),
            (shift.start() + shift.duration()).format("%H:%M"),
            shift.name()
        );
    }
}

fn state_sinks(config: &SignConfig) -> StateSinks {
    let mut sinks = StateSinks::default();
    if config.dev {
        info!("[Publish] Dev mode: activity log and publishing disabled");
        return sinks;
    }

    match ActivityLog::open(&config.activity_log) {
        Ok(log) => sinks.log = Some(Arc::new(log)),
        Err(e) => warn!(
            "[Log] Cannot open {}, activity will not be logged: {}",
            config.activity_log.display(),
            e
        ),
    }

    match config.remote_api_key() {
        Some(key) => match HttpPublisher::new(&config.remote.publish_url, key) {
            Ok(publisher) => sinks.publisher = Some(publisher),
            Err(e) => warn!("[Publish] Publishing disabled: {}", e),
        },
        None => info!("[Publish] No API key, not publishing"),
    }
    sinks
}

fn stats_uploader(config: &SignConfig) -> Option<StatsUploader> {
    let key = config.remote_api_key()?;
    let url = config.remote.stats_url.as_deref()?;
    StatsUploader::new(url, key)
        .inspect_err(|e| warn!("[Stats] Statistics upload disabled: {}", e))
        .ok()
}

fn run(args: Args) -> Result<()> {
    let config = load_config(&args)?;
    let schedule = load_schedule(&config)?;
    if args.print_schedule {
        print_schedule(&schedule);
        return Ok(());
    }

    let _lock = InstanceLock::acquire()?;

    info!("Starting open-sign");
    info!("Configuration loaded:");
    info!("  Dev mode: {}", config.dev);
    info!("  Tick period: {} ms", config.tick_ms);
    info!("  Roster: {} shifts", schedule.len());
    info!(
        "  Sensors: {}",
        match config.sensors.backend {
            SensorBackend::Hardware => "hardware",
            SensorBackend::Simulated => "simulated",
        }
    );
    info!("  Door polarity: {}", config.sensors.door_polarity);

    let schedule = Arc::new(schedule);
    let runtime = tokio::runtime::Runtime::new()?;
    let shutdown = CancellationToken::new();
    let (handoff_tx, _) = handoff();
    let dispatcher = OutputDispatcher::new(handoff_tx);
    let source = HardwarePeripherals::new(&config);

    let mut tasks = Vec::new();
    tasks.push(runtime.spawn(workers::listen_for_shutdown(shutdown.clone())));
    if std::io::stdin().is_terminal() {
        tasks.push(runtime.spawn(workers::watch_quit_keys(
            tokio::io::stdin(),
            shutdown.clone(),
        )));
    }

    let sinks = state_sinks(&config);
    let states = dispatcher.subscribe();
    let token = shutdown.clone();
    tasks.push(runtime.spawn(async move {
        workers::run_log_and_publish(states, sinks, LOG_PUBLISH_PERIOD, token).await;
    }));

    if let Some(uploader) = stats_uploader(&config) {
        tasks.push(runtime.spawn(workers::run_stats(
            config.activity_log.clone(),
            uploader,
            STATS_PERIOD,
            shutdown.clone(),
        )));
    }

    if config.diagnostics_enabled() {
        let state = DiagnosticsState {
            states: dispatcher.subscribe(),
            schedule: schedule.clone(),
            simulated: source.simulated(),
        };
        let addr = diagnostics::bind_address(config.dev, config.http_port);
        let token = shutdown.clone();
        tasks.push(runtime.spawn(async move {
            if let Err(e) = diagnostics::serve(state, addr, token).await {
                error!("[HTTP] Diagnostics server failed on {}: {}", addr, e);
            }
        }));
    }

    let sign = SignMachine::new(source, schedule, dispatcher);
    let period = config.tick_period();
    let token = shutdown.clone();
    let tick_loop = std::thread::Builder::new()
        .name("sign-tick".into())
        .spawn(move || machine::run(sign, period, token))?;

    info!("open-sign is running, press Ctrl+C (or q then Enter) to exit");
    let outcome = tick_loop.join().unwrap_or(Err(SignError::TickPanicked));

    shutdown.cancel();
    runtime.block_on(async {
        for task in tasks {
            if tokio::time::timeout(Duration::from_secs(5), task).await.is_err() {
                warn!("A background task did not stop in time");
            }
        }
    });
    runtime.shutdown_timeout(Duration::from_secs(1));

    if outcome.is_ok() {
        info!("open-sign stopped");
    }
    outcome
}
