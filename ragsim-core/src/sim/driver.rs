//! Simulation Driver
//!
//! The simulator owns the allocation store behind a `parking_lot::RwLock`
//! and advances it in discrete ticks. One tick is the bounded sequence
//! ingest (if a feed source is attached), detect, assess, optionally
//! auto-resolve. Detection and risk assessment run against the same read
//! snapshot, so a tick's reports always describe one consistent state.
//!
//! The lock makes shared readers cheap: any number of threads may inspect
//! the store through `with_store` while a single driver thread ticks.

use std::time::SystemTime;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::analysis::{assess, detect, DeadlockReport, RiskReport};
use crate::sim::feed::{ingest, ProcessSource};
use crate::sim::resolve::{
    resolve, select_victim, ResolutionAction, ResolutionOutcome, VictimPolicy,
};
use crate::store::{AllocationStore, ProcessId, ProcessState};

/// Driver policy knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Terminate a victim automatically whenever a tick detects deadlock.
    pub auto_resolve: bool,
    /// How the automatic resolver picks its victim.
    pub victim_policy: VictimPolicy,
}

/// Everything one tick produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    pub deadlock: DeadlockReport,
    pub risk: RiskReport,
    /// Present only when auto-resolution ran and succeeded.
    pub resolution: Option<ResolutionOutcome>,
}

/// One line of the append-only tick history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub timestamp: SystemTime,
    pub tick: u64,
    pub detected: bool,
    pub summary: String,
}

/// Owns the store and drives the detect/assess/resolve loop.
pub struct Simulator {
    store: RwLock<AllocationStore>,
    config: SimulatorConfig,
    source: Option<Box<dyn ProcessSource + Send>>,
    tick: u64,
    paused: bool,
    last_deadlock: Option<DeadlockReport>,
    history: Vec<HistoryEntry>,
}

impl Simulator {
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            store: RwLock::new(AllocationStore::new()),
            config,
            source: None,
            tick: 0,
            paused: false,
            last_deadlock: None,
            history: Vec::new(),
        }
    }

    /// Attach the feed that will be polled at the start of every tick.
    /// Replaces any previously attached source.
    pub fn attach_source(&mut self, source: Box<dyn ProcessSource + Send>) {
        self.source = Some(source);
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Number of completed ticks since creation or the last `reset`.
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Stop advancing; `tick` becomes a no-op until `resume`.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Run a closure against a read snapshot of the store.
    pub fn with_store<R>(&self, f: impl FnOnce(&AllocationStore) -> R) -> R {
        f(&self.store.read())
    }

    /// Run a closure with exclusive access to the store. Any mutation bumps
    /// the store version, so cached reports go stale on their own.
    pub fn with_store_mut<R>(&mut self, f: impl FnOnce(&mut AllocationStore) -> R) -> R {
        f(&mut self.store.write())
    }

    /// The most recent detection report, if it still matches the store.
    pub fn last_deadlock(&self) -> Option<&DeadlockReport> {
        let store = self.store.read();
        self.last_deadlock.as_ref().filter(|r| r.is_fresh(&store))
    }

    /// Derived state of a process, folding in the latest fresh detection
    /// result. Stale reports contribute nothing.
    pub fn process_state(&self, id: &ProcessId) -> Option<ProcessState> {
        let store = self.store.read();
        let deadlocked = self
            .last_deadlock
            .as_ref()
            .filter(|r| r.is_fresh(&store))
            .map(|r| r.is_deadlocked(id))
            .unwrap_or(false);
        store.process(id).map(|p| p.state(deadlocked))
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Drop everything: store, tick counter, cached report, history. The
    /// attached source and configuration survive.
    pub fn reset(&mut self) {
        *self.store.write() = AllocationStore::new();
        self.tick = 0;
        self.paused = false;
        self.last_deadlock = None;
        self.history.clear();
        info!("simulator reset");
    }

    /// Advance one tick. Returns `None` without side effects while paused.
    pub fn tick(&mut self) -> Option<TickReport> {
        if self.paused {
            return None;
        }
        self.tick += 1;

        if let Some(source) = self.source.as_mut() {
            let observations = source.observe();
            let mut store = self.store.write();
            if let Err(err) = ingest(&mut store, &observations) {
                warn!(%err, "feed snapshot rejected; keeping previous state");
            }
        }

        let (deadlock, risk) = {
            let store = self.store.read();
            (detect(&store), assess(&store))
        };

        let resolution = if deadlock.detected && self.config.auto_resolve {
            let mut store = self.store.write();
            match select_victim(&store, &deadlock, self.config.victim_policy) {
                Some(victim) => {
                    let action = ResolutionAction::Terminate { process: victim };
                    match resolve(&mut store, &deadlock, action) {
                        Ok(outcome) => Some(outcome),
                        Err(err) => {
                            warn!(%err, "automatic resolution failed");
                            None
                        }
                    }
                }
                None => None,
            }
        } else {
            None
        };

        self.history.push(HistoryEntry {
            timestamp: SystemTime::now(),
            tick: self.tick,
            detected: deadlock.detected,
            summary: summarize(&deadlock),
        });
        self.last_deadlock = Some(deadlock.clone());

        Some(TickReport {
            tick: self.tick,
            deadlock,
            risk,
            resolution,
        })
    }
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new(SimulatorConfig::default())
    }
}

/// One-line description of a detection result, closing the cycle trace
/// back on its starting node for readability.
fn summarize(report: &DeadlockReport) -> String {
    if !report.detected {
        return "No deadlock detected".to_string();
    }
    if report.cycle.is_empty() {
        return format!(
            "Deadlock detected among {} processes (no simple cycle)",
            report.deadlocked_processes.len()
        );
    }
    let mut trace: Vec<String> = report.cycle.iter().map(|n| n.to_string()).collect();
    if let Some(first) = trace.first().cloned() {
        trace.push(first);
    }
    format!("Circular wait detected: {}", trace.join(" -> "))
}
