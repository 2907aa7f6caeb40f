//! Resource Records
//!
//! A resource has a fixed number of instances (units). Each allocation
//! entry holds exactly one unit, and a process appears at most once in
//! `allocated_to`. Processes whose requests cannot be satisfied wait in a
//! FIFO queue; queue order decides who is granted a freed unit first.
//!
//! Sharable resources are accepted but behave identically to exclusive
//! ones with the same instance count: the kind is descriptive metadata,
//! the capacity rule is `allocated_to.len() <= instances` either way.

use serde::{Deserialize, Serialize};

use super::id::{ProcessId, ResourceId};

/// How a resource is intended to be used. Has no behavioral effect on
/// capacity accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Exclusive,
    Sharable,
}

/// A finite resource with one or more instances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    id: ResourceId,
    name: String,
    kind: ResourceKind,
    instances: u32,
    /// Holders, one unit each, in grant order.
    allocated_to: Vec<ProcessId>,
    /// FIFO queue of processes with an outstanding request on this resource.
    waiting_queue: Vec<ProcessId>,
}

impl Resource {
    pub(crate) fn new(id: ResourceId, name: String, kind: ResourceKind, instances: u32) -> Self {
        Self {
            id,
            name,
            kind,
            instances,
            allocated_to: Vec::new(),
            waiting_queue: Vec::new(),
        }
    }

    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn instances(&self) -> u32 {
        self.instances
    }

    /// Current holders in grant order.
    pub fn allocated_to(&self) -> &[ProcessId] {
        &self.allocated_to
    }

    /// Waiting processes in FIFO order.
    pub fn waiting_queue(&self) -> &[ProcessId] {
        &self.waiting_queue
    }

    /// Unallocated instances.
    pub fn available(&self) -> u32 {
        self.instances - self.allocated_to.len() as u32
    }

    pub fn is_held_by(&self, process: &ProcessId) -> bool {
        self.allocated_to.contains(process)
    }

    pub(crate) fn push_holder(&mut self, process: ProcessId) {
        debug_assert!(self.available() > 0, "holder pushed onto a full resource");
        self.allocated_to.push(process);
    }

    pub(crate) fn remove_holder(&mut self, process: &ProcessId) -> bool {
        match self.allocated_to.iter().position(|p| p == process) {
            Some(idx) => {
                self.allocated_to.remove(idx);
                true
            }
            None => false,
        }
    }

    pub(crate) fn enqueue_waiter(&mut self, process: ProcessId) {
        debug_assert!(
            !self.waiting_queue.contains(&process),
            "process queued twice on one resource"
        );
        self.waiting_queue.push(process);
    }

    pub(crate) fn remove_waiter(&mut self, process: &ProcessId) -> bool {
        match self.waiting_queue.iter().position(|p| p == process) {
            Some(idx) => {
                self.waiting_queue.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Head of the waiting queue, the next grant candidate.
    pub(crate) fn front_waiter(&self) -> Option<&ProcessId> {
        self.waiting_queue.first()
    }
}
