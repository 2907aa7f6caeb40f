//! Process Records
//!
//! A process is an inert data record: the simulation never executes real
//! work on its behalf. A process holds a (small) set of resources and may
//! have at most one outstanding request at a time.
//!
//! # Derived State
//!
//! There is deliberately no stored `state` field. A stored state drifts
//! out of sync with recomputed detection results; `ProcessState` is always
//! derived on demand from the record plus the latest detection report.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::id::{ProcessId, ResourceId};

/// Resources held by a process. Almost always a handful.
pub type HeldSet = SmallVec<[ResourceId; 4]>;

/// A process competing for resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Process {
    id: ProcessId,
    name: String,
    /// Scheduling priority, `>= 1`. Lower values are treated as higher
    /// priority by the `LowestPriority` victim policy; nothing else reads it.
    priority: u32,
    /// Resources currently allocated to this process, one unit each.
    held: HeldSet,
    /// The single outstanding request, if any.
    waiting_for: Option<ResourceId>,
    /// Set when the process loses a unit to preemption; cleared by its next
    /// acquisition or release. Only used to derive `ProcessState::Blocked`.
    preempted: bool,
}

impl Process {
    pub(crate) fn new(id: ProcessId, name: String, priority: u32) -> Self {
        Self {
            id,
            name,
            priority,
            held: HeldSet::new(),
            waiting_for: None,
            preempted: false,
        }
    }

    pub fn id(&self) -> &ProcessId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    /// Resources currently held, in acquisition order.
    pub fn held(&self) -> &[ResourceId] {
        &self.held
    }

    pub fn holds(&self, resource: &ResourceId) -> bool {
        self.held.contains(resource)
    }

    /// The resource this process is waiting on, if any.
    pub fn waiting_for(&self) -> Option<&ResourceId> {
        self.waiting_for.as_ref()
    }

    pub fn is_waiting(&self) -> bool {
        self.waiting_for.is_some()
    }

    pub(crate) fn set_waiting_for(&mut self, resource: Option<ResourceId>) {
        self.waiting_for = resource;
    }

    pub(crate) fn grant(&mut self, resource: ResourceId) {
        self.held.push(resource);
        self.preempted = false;
    }

    /// Drop one held unit. Returns false if the resource was not held.
    pub(crate) fn revoke(&mut self, resource: &ResourceId) -> bool {
        match self.held.iter().position(|r| r == resource) {
            Some(idx) => {
                self.held.remove(idx);
                true
            }
            None => false,
        }
    }

    pub(crate) fn mark_preempted(&mut self) {
        self.preempted = true;
    }

    pub(crate) fn clear_preempted(&mut self) {
        self.preempted = false;
    }

    /// Derive the process state. `deadlocked` is membership in the latest
    /// fresh detection report's deadlocked set.
    pub fn state(&self, deadlocked: bool) -> ProcessState {
        if deadlocked {
            ProcessState::Deadlocked
        } else if let Some(resource) = &self.waiting_for {
            ProcessState::Waiting(resource.clone())
        } else if self.preempted && self.held.is_empty() {
            ProcessState::Blocked
        } else {
            ProcessState::Running
        }
    }
}

/// Derived view of what a process is doing right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessState {
    /// Not waiting on anything; free to make progress.
    Running,
    /// Has an outstanding request on the given resource.
    Waiting(ResourceId),
    /// Lost its holdings to preemption and has not been rescheduled.
    Blocked,
    /// Member of the deadlocked set in the latest detection report.
    Deadlocked,
}
