//! Deadlock Resolution
//!
//! Two actions can break a detected deadlock: terminating a deadlocked
//! process, or preempting a held unit and handing it to another process.
//! Both demand a fresh detection report — one computed at the store's
//! current version — and both mutate the store, so the report is stale
//! afterwards and the caller must re-run detection to confirm resolution.
//!
//! Victim selection is a policy knob, not a fixed rule. Repeatedly
//! preempting the same process is a starvation risk the engine does not
//! police; callers wanting fairness should bias selection by queue order
//! or aging.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::analysis::DeadlockReport;
use crate::store::{AllocationStore, ProcessId, ResourceId, StoreError, StoreResult};

/// An action that attempts to break a detected deadlock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionAction {
    /// Remove a deadlocked process, releasing everything it holds.
    Terminate { process: ProcessId },
    /// Forcibly move one unit of `resource` from `from` to `to`.
    Preempt {
        resource: ResourceId,
        from: ProcessId,
        to: ProcessId,
    },
}

/// What a successfully applied action changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionOutcome {
    pub action: ResolutionAction,
    /// Resources that had a unit freed.
    pub freed: Vec<ResourceId>,
    /// Units granted as a consequence (waiting-queue grants on
    /// termination, the transfer target on preemption).
    pub granted: Vec<(ResourceId, ProcessId)>,
}

/// How to pick a termination victim from the deadlocked set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VictimPolicy {
    /// Longest-queued waiter first; the fairest default.
    #[default]
    QueueOrder,
    /// Largest numeric priority value first (lower value = more important).
    LowestPriority,
    /// Process holding the fewest resources first (least work lost).
    FewestHeld,
}

/// Apply a resolution action against a fresh detection report.
pub fn resolve(
    store: &mut AllocationStore,
    report: &DeadlockReport,
    action: ResolutionAction,
) -> StoreResult<ResolutionOutcome> {
    if !report.is_fresh(store) {
        return Err(StoreError::InvalidAction(
            "detection report is stale; re-run detection first".into(),
        ));
    }

    match action {
        ResolutionAction::Terminate { ref process } => {
            if store.process(process).is_none() {
                return Err(StoreError::InvalidReference { id: process.to_string() });
            }
            if !report.is_deadlocked(process) {
                return Err(StoreError::InvalidAction(format!(
                    "process {process} is not part of the detected deadlock"
                )));
            }

            let released = store.remove_process(process)?;
            info!(victim = %process, freed = released.len(), "terminated deadlocked process");

            let freed = released.iter().map(|(r, _)| r.clone()).collect();
            let granted = released
                .into_iter()
                .filter_map(|(r, grantee)| grantee.map(|g| (r, g)))
                .collect();
            Ok(ResolutionOutcome { action, freed, granted })
        }

        ResolutionAction::Preempt {
            ref resource,
            ref from,
            ref to,
        } => {
            for id in [from, to] {
                if store.process(id).is_none() {
                    return Err(StoreError::InvalidReference { id: id.to_string() });
                }
            }
            let res = store
                .resource(resource)
                .ok_or_else(|| StoreError::InvalidReference { id: resource.to_string() })?;
            if !res.is_held_by(from) {
                return Err(StoreError::NotHolding {
                    process: from.to_string(),
                    resource: resource.to_string(),
                });
            }
            if from == to {
                return Err(StoreError::InvalidAction(
                    "preemption source and target are the same process".into(),
                ));
            }
            if res.is_held_by(to) {
                return Err(StoreError::InvalidAction(format!(
                    "process {to} already holds {resource}"
                )));
            }

            store.transfer_unit(resource, from, to);
            info!(%resource, %from, %to, "preempted resource unit");

            Ok(ResolutionOutcome {
                freed: vec![resource.clone()],
                granted: vec![(resource.clone(), to.clone())],
                action,
            })
        }
    }
}

/// Pick a termination victim from the report's deadlocked set under the
/// given policy. Ties fall back to report (store) order.
pub fn select_victim(
    store: &AllocationStore,
    report: &DeadlockReport,
    policy: VictimPolicy,
) -> Option<ProcessId> {
    let candidates: Vec<&ProcessId> = report
        .deadlocked_processes
        .iter()
        .filter(|p| store.process(p).is_some())
        .collect();

    let victim = match policy {
        VictimPolicy::QueueOrder => candidates
            .iter()
            .min_by_key(|p| queue_position(store, p))
            .copied(),
        VictimPolicy::LowestPriority => {
            // Highest numeric value loses; min_by_key keeps the first of
            // equals, so invert via max with a strict comparison.
            let mut best: Option<(&ProcessId, u32)> = None;
            for p in &candidates {
                let priority = store.process(p).map(|r| r.priority()).unwrap_or(u32::MAX);
                match best {
                    Some((_, current)) if priority <= current => {}
                    _ => best = Some((*p, priority)),
                }
            }
            best.map(|(p, _)| p)
        }
        VictimPolicy::FewestHeld => candidates
            .iter()
            .min_by_key(|p| store.process(p).map(|r| r.held().len()).unwrap_or(usize::MAX))
            .copied(),
    };

    victim.cloned()
}

/// Position of a process in the waiting queue of the resource it awaits;
/// earlier means it has been waiting longer.
fn queue_position(store: &AllocationStore, process: &ProcessId) -> usize {
    store
        .process(process)
        .and_then(|p| p.waiting_for())
        .and_then(|r| store.resource(r))
        .and_then(|r| r.waiting_queue().iter().position(|w| w == process))
        .unwrap_or(usize::MAX)
}
