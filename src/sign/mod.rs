//! The sign's core: decision logic, display state and the tick loop.

pub mod decision;
pub mod machine;
pub mod state;

pub use decision::{Decision, decide, evaluate};
pub use machine::{Lifecycle, PeripheralSource, Peripherals, SignMachine, TickOutcome};
pub use state::{Background, SignState};
