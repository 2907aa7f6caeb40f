//! External Feed Adapter
//!
//! An outside collaborator (a process monitor, a UI, a test harness) can
//! supply the entire system state as a list of observation records. The
//! adapter maps those records 1:1 onto internal process records. The core
//! never shells out or touches platform APIs itself; anything OS-specific
//! lives behind the narrow `ProcessSource` seam, outside this crate.
//!
//! Observed states are advisory: the store derives process state from
//! holdings, requests, and detection results, and that derivation wins
//! over whatever the collaborator reported.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::store::{
    AllocationStore, ProcessId, ResourceId, ResourceKind, StoreResult,
};

/// Process state as reported by the external collaborator. Advisory only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservedState {
    Running,
    Waiting,
    Blocked,
    Deadlocked,
}

/// One observed process, in the collaborator's wire form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessObservation {
    pub pid: u32,
    pub name: String,
    #[serde(default)]
    pub held_resource_ids: Vec<String>,
    #[serde(default)]
    pub waiting_resource_id: Option<String>,
    pub observed_state: ObservedState,
}

impl ProcessObservation {
    /// Parse a JSON array of observations.
    pub fn from_json(json: &str) -> Result<Vec<Self>, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Anything that can produce a snapshot of observed processes. The one
/// seam through which live telemetry may enter the simulation.
pub trait ProcessSource {
    fn observe(&mut self) -> Vec<ProcessObservation>;
}

/// Replace the store's contents with the observed snapshot.
///
/// Each observation becomes process `P{pid}`. Referenced resources are
/// auto-registered; a resource's instance count is grown to cover every
/// observed holder (the collaborator is authoritative for its own
/// snapshot), never below 1. Holds are applied before requests so queue
/// order follows observation order.
pub fn ingest(store: &mut AllocationStore, observations: &[ProcessObservation]) -> StoreResult<()> {
    // Build into a scratch store so a bad record leaves the caller's
    // store untouched.
    let mut fresh = AllocationStore::new();

    // First pass: create processes and count holders per resource.
    let mut holder_counts: Vec<(ResourceId, u32)> = Vec::new();
    let mut mapped: Vec<(ProcessId, &ProcessObservation)> = Vec::new();
    for obs in observations {
        let process = ProcessId::parse(format!("P{}", obs.pid))?;
        for raw in &obs.held_resource_ids {
            let resource = ResourceId::parse(raw.clone())?;
            match holder_counts.iter_mut().find(|(r, _)| *r == resource) {
                Some((_, n)) => *n += 1,
                None => holder_counts.push((resource, 1)),
            }
        }
        if let Some(raw) = &obs.waiting_resource_id {
            let resource = ResourceId::parse(raw.clone())?;
            if !holder_counts.iter().any(|(r, _)| *r == resource) {
                holder_counts.push((resource, 0));
            }
        }
        mapped.push((process, obs));
    }

    for (resource, holders) in &holder_counts {
        fresh.add_resource(
            resource.clone(),
            resource.to_string(),
            ResourceKind::Sharable,
            (*holders).max(1),
        )?;
    }
    for (process, obs) in &mapped {
        fresh.add_process(process.clone(), obs.name.clone(), 1)?;
    }

    // Second pass: apply holds, then requests.
    for (process, obs) in &mapped {
        for raw in &obs.held_resource_ids {
            let resource = ResourceId::parse(raw.clone())?;
            fresh.allocate(&resource, process)?;
        }
    }
    for (process, obs) in &mapped {
        if let Some(raw) = &obs.waiting_resource_id {
            let resource = ResourceId::parse(raw.clone())?;
            fresh.request(process, &resource)?;
        }
    }

    debug!(
        processes = fresh.process_count(),
        resources = fresh.resource_count(),
        "ingested external snapshot"
    );
    *store = fresh;
    Ok(())
}
