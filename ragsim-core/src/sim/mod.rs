//! Simulation
//!
//! The mutable half of the crate: feeding external observations into the
//! store, applying resolution actions against fresh detection reports,
//! and the tick driver that sequences the whole loop.

mod driver;
mod feed;
mod resolve;

pub use driver::{HistoryEntry, Simulator, SimulatorConfig, TickReport};
pub use feed::{ingest, ObservedState, ProcessObservation, ProcessSource};
pub use resolve::{
    resolve, select_victim, ResolutionAction, ResolutionOutcome, VictimPolicy,
};
