//! The sign's Moore machine.
//!
//! ```text
//! Uninitialized ──first tick──▶ Running ──shutdown seen──▶ Halted
//!       │                                                   ▲
//!       └──────────── acquisition error (fatal) ────────────┘
//! ```
//!
//! Terminating is not a resting state: the tick that sees the shutdown
//! releases the peripherals and leaves the machine `Halted`.
//!
//! Every tick in `Running` reads the sensors, queries the roster, folds the
//! decision into [`SignState`] and hands the state to the
//! [`OutputDispatcher`]. The outputs only ever see the state, never the inputs.
//!
//! Peripherals are owned by the `Running` phase and consumed by
//! [`Peripherals::release`], so they can only be released once.

use super::decision;
use super::state::SignState;
use crate::error::Result;
use crate::output::{OutputDispatcher, RelayPort, RenderPort};
use crate::schedule::ScheduleTable;
use crate::sensors::SensorPort;
use chrono::{DateTime, FixedOffset, Local};
use log::{debug, info};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Hardware handles held while the sign is running.
pub struct Peripherals {
    pub sensors: Box<dyn SensorPort>,
    pub display: Box<dyn RenderPort>,
    pub relay: Option<Box<dyn RelayPort>>,
}

impl Peripherals {
    pub fn release(self) {
        self.display.release();
        self.sensors.release();
        if let Some(relay) = self.relay {
            relay.release();
        }
    }
}

/// Acquires the display and sensor handles on the first tick.
pub trait PeripheralSource: Send {
    fn acquire(&mut self) -> Result<Peripherals>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Running,
    Halted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Halted,
}

enum Phase {
    Uninitialized,
    Running(Peripherals),
    Halted,
}

pub struct SignMachine<S> {
    source: S,
    phase: Phase,
    state: SignState,
    schedule: Arc<ScheduleTable>,
    output: OutputDispatcher,
}

impl<S: PeripheralSource> SignMachine<S> {
    pub fn new(source: S, schedule: Arc<ScheduleTable>, output: OutputDispatcher) -> Self {
        Self {
            source,
            phase: Phase::Uninitialized,
            state: SignState::new(),
            schedule,
            output,
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        match self.phase {
            Phase::Uninitialized => Lifecycle::Uninitialized,
            Phase::Running(_) => Lifecycle::Running,
            Phase::Halted => Lifecycle::Halted,
        }
    }

    pub fn state(&self) -> &SignState {
        &self.state
    }

    /// Run one tick.
    ///
    /// The shutdown token is checked first; once it is cancelled the
    /// peripherals are released and every later call is a no-op returning
    /// [`TickOutcome::Halted`]. An acquisition failure on the first tick is
    /// returned as an error and also halts the machine.
    pub fn tick(
        &mut self,
        now: DateTime<FixedOffset>,
        shutdown: &CancellationToken,
    ) -> Result<TickOutcome> {
        if shutdown.is_cancelled() {
            self.terminate();
            return Ok(TickOutcome::Halted);
        }

        match std::mem::replace(&mut self.phase, Phase::Halted) {
            Phase::Halted => return Ok(TickOutcome::Halted),
            Phase::Uninitialized => {
                let peripherals = self.source.acquire()?;
                info!(
                    "[Sign] Peripherals acquired ({} shifts on the roster)",
                    self.schedule.len()
                );
                self.state.mark_initialized();
                self.phase = Phase::Running(peripherals);
            }
            Phase::Running(peripherals) => self.phase = Phase::Running(peripherals),
        }

        self.step(now);
        Ok(TickOutcome::Continue)
    }

    fn step(&mut self, now: DateTime<FixedOffset>) {
        let Phase::Running(peripherals) = &mut self.phase else {
            return;
        };

        let sensors = peripherals.sensors.read_all();
        let decision = decision::evaluate(
            &self.schedule,
            sensors.switch_position,
            sensors.door_open,
            now.naive_local(),
        );

        let before = self.state.clone();
        self.state.apply(&sensors, decision, now);
        if before.last_tick().is_none()
            || before.is_open() != self.state.is_open()
            || before.switch_position() != self.state.switch_position()
        {
            info!(
                "[Sign] {} (switch={}, door_open={}, subtitle={:?})",
                self.state.title(),
                self.state.switch_position(),
                sensors.door_open,
                self.state.subtitle()
            );
        } else if before.subtitle() != self.state.subtitle() {
            debug!("[Sign] Subtitle now {:?}", self.state.subtitle());
        }

        let relay = peripherals
            .relay
            .as_mut()
            .map(|relay| relay.as_mut() as &mut dyn RelayPort);
        self.output
            .dispatch(&self.state, peripherals.display.as_mut(), relay);
    }

    fn terminate(&mut self) {
        match std::mem::replace(&mut self.phase, Phase::Halted) {
            Phase::Running(peripherals) => {
                info!("[Sign] Terminating: releasing peripherals");
                peripherals.release();
                info!("[Sign] Halted");
            }
            Phase::Uninitialized => info!("[Sign] Shutdown before first tick, nothing to release"),
            Phase::Halted => {}
        }
    }
}

/// Drive the machine on the current thread at a fixed period until it halts.
///
/// Blocks only on the period timer. A late tick is not made up for; the
/// schedule simply shifts.
pub fn run<S: PeripheralSource>(
    mut machine: SignMachine<S>,
    period: Duration,
    shutdown: CancellationToken,
) -> Result<()> {
    info!("[Sign] Tick loop started ({} ms period)", period.as_millis());
    let mut next = Instant::now();
    loop {
        if machine.tick(Local::now().fixed_offset(), &shutdown)? == TickOutcome::Halted {
            return Ok(());
        }
        next += period;
        let now = Instant::now();
        if next > now {
            std::thread::sleep(next - now);
        } else {
            next = now;
        }
    }
}
