//! Allocation Store
//!
//! The store is the single source of truth for the resource-allocation
//! state: which processes exist, which resources exist, who holds what and
//! who waits for what. Everything downstream (graph projections, detection,
//! risk assessment) is derived from it on demand.
//!
//! # Atomicity
//!
//! Every operation validates its preconditions completely before touching
//! any record, so an operation either applies in full or returns an error
//! with the store unchanged. Structural invariants are re-checked after
//! every mutation in debug builds; a violation is a bug in this module,
//! never a recoverable condition.
//!
//! # Versioning
//!
//! The store carries a version counter bumped by every successful mutation.
//! Detection reports embed the version they were computed at; a report is
//! only trusted (e.g. by the resolution engine) while its version matches,
//! which is how "any mutation invalidates prior detection results" is
//! enforced without callbacks or shared flags.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{StoreError, StoreResult};
use super::id::{ProcessId, ResourceId};
use super::process::Process;
use super::resource::{Resource, ResourceKind};

/// What happened to a `request` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestOutcome {
    /// The resource had a free instance; it was allocated immediately.
    Granted,
    /// No free instance; the process joined the FIFO waiting queue.
    Queued,
}

/// The current resource-allocation state.
///
/// Tables are insertion-ordered (`IndexMap`), so iteration and everything
/// derived from it (edge sets, reports) is deterministic for a given
/// sequence of operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllocationStore {
    processes: IndexMap<ProcessId, Process>,
    resources: IndexMap<ResourceId, Resource>,
    version: u64,
}

impl AllocationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Version counter; bumped by every successful mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn process(&self, id: &ProcessId) -> Option<&Process> {
        self.processes.get(id)
    }

    pub fn resource(&self, id: &ResourceId) -> Option<&Resource> {
        self.resources.get(id)
    }

    /// Processes in creation order.
    pub fn processes(&self) -> impl Iterator<Item = &Process> {
        self.processes.values()
    }

    /// Resources in creation order.
    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values()
    }

    pub fn process_count(&self) -> usize {
        self.processes.len()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Register a new process.
    pub fn add_process(
        &mut self,
        id: ProcessId,
        name: impl Into<String>,
        priority: u32,
    ) -> StoreResult<()> {
        if priority == 0 {
            return Err(StoreError::InvalidAction(
                "process priority must be at least 1".into(),
            ));
        }
        if self.processes.contains_key(&id) {
            return Err(StoreError::DuplicateId { id: id.to_string() });
        }

        debug!(process = %id, priority, "process added");
        self.processes
            .insert(id.clone(), Process::new(id, name.into(), priority));
        self.touch();
        Ok(())
    }

    /// Register a new resource with `instances >= 1` units.
    pub fn add_resource(
        &mut self,
        id: ResourceId,
        name: impl Into<String>,
        kind: ResourceKind,
        instances: u32,
    ) -> StoreResult<()> {
        if instances == 0 {
            return Err(StoreError::InvalidAction(
                "resource must have at least 1 instance".into(),
            ));
        }
        if self.resources.contains_key(&id) {
            return Err(StoreError::DuplicateId { id: id.to_string() });
        }

        debug!(resource = %id, instances, "resource added");
        self.resources
            .insert(id.clone(), Resource::new(id, name.into(), kind, instances));
        self.touch();
        Ok(())
    }

    /// Remove a process, releasing everything it holds and clearing any
    /// waiting-queue membership first. Each released unit may be granted to
    /// the head of that resource's waiting queue; the returned list pairs
    /// every released resource with the grantee, if any.
    pub fn remove_process(
        &mut self,
        id: &ProcessId,
    ) -> StoreResult<Vec<(ResourceId, Option<ProcessId>)>> {
        if !self.processes.contains_key(id) {
            return Err(StoreError::InvalidReference { id: id.to_string() });
        }

        let held: Vec<ResourceId> = self.processes[id].held().to_vec();
        let mut released = Vec::with_capacity(held.len());
        for resource in held {
            let granted = self.release_unit(&resource, id);
            released.push((resource, granted));
        }

        if let Some(waiting_on) = self.processes[id].waiting_for().cloned() {
            self.resources[&waiting_on].remove_waiter(id);
        }

        self.processes.shift_remove(id);
        debug!(process = %id, "process removed");
        self.touch();
        self.debug_validate();
        Ok(released)
    }

    /// Remove a resource, stripping it from every holder's held set and
    /// clearing every waiter's outstanding request first.
    pub fn remove_resource(&mut self, id: &ResourceId) -> StoreResult<Resource> {
        let resource = self
            .resources
            .get(id)
            .ok_or_else(|| StoreError::InvalidReference { id: id.to_string() })?;

        let holders: Vec<ProcessId> = resource.allocated_to().to_vec();
        let waiters: Vec<ProcessId> = resource.waiting_queue().to_vec();

        for holder in &holders {
            self.processes[holder].revoke(id);
        }
        for waiter in &waiters {
            self.processes[waiter].set_waiting_for(None);
        }

        let removed = self
            .resources
            .shift_remove(id)
            .expect("resource existence checked above");
        debug!(resource = %id, "resource removed");
        self.touch();
        self.debug_validate();
        Ok(removed)
    }

    /// Request one unit of a resource on behalf of a process.
    ///
    /// If a free instance exists the unit is granted immediately; otherwise
    /// the process joins the resource's FIFO waiting queue and its
    /// `waiting_for` is set. A process can have at most one outstanding
    /// request at a time.
    pub fn request(
        &mut self,
        process: &ProcessId,
        resource: &ResourceId,
    ) -> StoreResult<RequestOutcome> {
        let proc = self
            .processes
            .get(process)
            .ok_or_else(|| StoreError::InvalidReference { id: process.to_string() })?;
        let res = self
            .resources
            .get(resource)
            .ok_or_else(|| StoreError::InvalidReference { id: resource.to_string() })?;

        if let Some(waiting_on) = proc.waiting_for() {
            return Err(StoreError::AlreadyWaiting {
                process: process.to_string(),
                waiting_on: waiting_on.to_string(),
            });
        }
        if proc.holds(resource) {
            return Err(StoreError::InvalidAction(format!(
                "process {process} already holds {resource}"
            )));
        }

        let outcome = if res.available() > 0 {
            self.grant_unit(resource, process);
            RequestOutcome::Granted
        } else {
            self.resources[resource].enqueue_waiter(process.clone());
            self.processes[process].set_waiting_for(Some(resource.clone()));
            RequestOutcome::Queued
        };

        debug!(process = %process, resource = %resource, ?outcome, "request");
        self.touch();
        self.debug_validate();
        Ok(outcome)
    }

    /// Explicitly allocate one unit of a resource to a process.
    ///
    /// Fails with `CapacityExceeded` when every instance is already
    /// allocated. On success the process is removed from the resource's
    /// waiting queue and its `waiting_for` is cleared if this grant
    /// satisfies its outstanding request.
    pub fn allocate(&mut self, resource: &ResourceId, process: &ProcessId) -> StoreResult<()> {
        let proc = self
            .processes
            .get(process)
            .ok_or_else(|| StoreError::InvalidReference { id: process.to_string() })?;
        let res = self
            .resources
            .get(resource)
            .ok_or_else(|| StoreError::InvalidReference { id: resource.to_string() })?;

        if proc.holds(resource) {
            return Err(StoreError::InvalidAction(format!(
                "process {process} already holds {resource}"
            )));
        }
        if res.available() == 0 {
            return Err(StoreError::CapacityExceeded {
                resource: resource.to_string(),
                instances: res.instances(),
            });
        }

        self.grant_unit(resource, process);
        debug!(process = %process, resource = %resource, "allocated");
        self.touch();
        self.debug_validate();
        Ok(())
    }

    /// Release one unit held by a process.
    ///
    /// The freed unit is handed to the head of the resource's waiting queue
    /// (FIFO preference); the grantee, if any, is returned.
    pub fn release(
        &mut self,
        resource: &ResourceId,
        process: &ProcessId,
    ) -> StoreResult<Option<ProcessId>> {
        let proc = self
            .processes
            .get(process)
            .ok_or_else(|| StoreError::InvalidReference { id: process.to_string() })?;
        if !self.resources.contains_key(resource) {
            return Err(StoreError::InvalidReference { id: resource.to_string() });
        }
        if !proc.holds(resource) {
            return Err(StoreError::NotHolding {
                process: process.to_string(),
                resource: resource.to_string(),
            });
        }

        let granted = self.release_unit(resource, process);
        self.processes[process].clear_preempted();
        debug!(process = %process, resource = %resource, granted = ?granted, "released");
        self.touch();
        self.debug_validate();
        Ok(granted)
    }

    /// Move one unit of `resource` from `from` to `to` without routing the
    /// freed unit through the waiting queue. Preconditions are the
    /// resolution engine's responsibility; this only performs the transfer.
    pub(crate) fn transfer_unit(
        &mut self,
        resource: &ResourceId,
        from: &ProcessId,
        to: &ProcessId,
    ) {
        self.resources[resource].remove_holder(from);
        self.processes[from].revoke(resource);
        // State derivation turns this into Blocked only while the process
        // holds nothing else and is not waiting.
        self.processes[from].mark_preempted();

        self.grant_unit(resource, to);
        self.touch();
        self.debug_validate();
    }

    /// Grant one unit, clearing the grantee's outstanding request if this
    /// satisfies it. Capacity must already have been checked.
    fn grant_unit(&mut self, resource: &ResourceId, process: &ProcessId) {
        self.resources[resource].push_holder(process.clone());
        self.processes[process].grant(resource.clone());
        if self.processes[process].waiting_for() == Some(resource) {
            self.resources[resource].remove_waiter(process);
            self.processes[process].set_waiting_for(None);
        }
    }

    /// Take one unit back from `process` and hand it to the queue head, if
    /// any. Returns the grantee. Does not bump the version; callers do.
    fn release_unit(&mut self, resource: &ResourceId, process: &ProcessId) -> Option<ProcessId> {
        self.resources[resource].remove_holder(process);
        self.processes[process].revoke(resource);

        let next = self.resources[resource].front_waiter().cloned()?;
        // The releasing process is never its own waiter: it held the unit.
        self.grant_unit(resource, &next);
        Some(next)
    }

    fn touch(&mut self) {
        self.version += 1;
    }

    fn debug_validate(&self) {
        #[cfg(debug_assertions)]
        self.validate();
    }

    /// Check every structural invariant, panicking on violation. Mutations
    /// run this automatically in debug builds.
    pub(crate) fn validate(&self) {
        for resource in self.resources.values() {
            assert!(
                resource.allocated_to().len() as u32 <= resource.instances(),
                "resource {} over-allocated",
                resource.id()
            );
            for holder in resource.allocated_to() {
                let proc = self
                    .processes
                    .get(holder)
                    .unwrap_or_else(|| panic!("dangling holder {holder} on {}", resource.id()));
                assert!(
                    proc.holds(resource.id()),
                    "holder {} of {} does not list it as held",
                    holder,
                    resource.id()
                );
            }
            for waiter in resource.waiting_queue() {
                let proc = self
                    .processes
                    .get(waiter)
                    .unwrap_or_else(|| panic!("dangling waiter {waiter} on {}", resource.id()));
                assert_eq!(
                    proc.waiting_for(),
                    Some(resource.id()),
                    "waiter {} of {} disagrees about waiting_for",
                    waiter,
                    resource.id()
                );
            }
        }

        for process in self.processes.values() {
            for held in process.held() {
                let resource = self
                    .resources
                    .get(held)
                    .unwrap_or_else(|| panic!("process {} holds unknown {held}", process.id()));
                assert!(
                    resource.is_held_by(process.id()),
                    "resource {} does not list holder {}",
                    held,
                    process.id()
                );
            }
            if let Some(waiting_on) = process.waiting_for() {
                let resource = self
                    .resources
                    .get(waiting_on)
                    .unwrap_or_else(|| panic!("process {} waits on unknown {waiting_on}", process.id()));
                assert!(
                    resource.waiting_queue().contains(process.id()),
                    "resource {} queue missing waiter {}",
                    waiting_on,
                    process.id()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(raw: &str) -> ProcessId {
        ProcessId::parse(raw).unwrap()
    }

    fn rid(raw: &str) -> ResourceId {
        ResourceId::parse(raw).unwrap()
    }

    fn store_with(processes: &[&str], resources: &[(&str, u32)]) -> AllocationStore {
        let mut store = AllocationStore::new();
        for p in processes {
            store.add_process(pid(p), format!("Process {}", &p[1..]), 1).unwrap();
        }
        for (r, instances) in resources {
            store
                .add_resource(
                    rid(r),
                    format!("Resource {}", &r[1..]),
                    ResourceKind::Exclusive,
                    *instances,
                )
                .unwrap();
        }
        store
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut store = store_with(&["P1"], &[("R1", 1)]);
        assert_eq!(
            store.add_process(pid("P1"), "again", 1),
            Err(StoreError::DuplicateId { id: "P1".into() })
        );
        assert_eq!(
            store.add_resource(rid("R1"), "again", ResourceKind::Sharable, 2),
            Err(StoreError::DuplicateId { id: "R1".into() })
        );
    }

    #[test]
    fn request_grants_when_capacity_is_free() {
        let mut store = store_with(&["P1"], &[("R1", 1)]);
        let outcome = store.request(&pid("P1"), &rid("R1")).unwrap();
        assert_eq!(outcome, RequestOutcome::Granted);
        assert!(store.process(&pid("P1")).unwrap().holds(&rid("R1")));
        assert_eq!(store.resource(&rid("R1")).unwrap().available(), 0);
    }

    #[test]
    fn request_queues_when_resource_is_full() {
        let mut store = store_with(&["P1", "P2"], &[("R1", 1)]);
        store.request(&pid("P1"), &rid("R1")).unwrap();

        let outcome = store.request(&pid("P2"), &rid("R1")).unwrap();
        assert_eq!(outcome, RequestOutcome::Queued);
        assert_eq!(
            store.process(&pid("P2")).unwrap().waiting_for(),
            Some(&rid("R1"))
        );
        assert_eq!(store.resource(&rid("R1")).unwrap().waiting_queue(), &[pid("P2")]);
    }

    #[test]
    fn second_outstanding_request_is_rejected() {
        let mut store = store_with(&["P1", "P2"], &[("R1", 1), ("R2", 1)]);
        store.request(&pid("P1"), &rid("R1")).unwrap();
        store.request(&pid("P1"), &rid("R2")).unwrap();
        store.request(&pid("P2"), &rid("R1")).unwrap(); // queued

        let err = store.request(&pid("P2"), &rid("R2")).unwrap_err();
        assert_eq!(
            err,
            StoreError::AlreadyWaiting {
                process: "P2".into(),
                waiting_on: "R1".into()
            }
        );
    }

    #[test]
    fn allocate_enforces_capacity() {
        let mut store = store_with(&["P1", "P2", "P3"], &[("R1", 2)]);
        store.allocate(&rid("R1"), &pid("P1")).unwrap();
        store.allocate(&rid("R1"), &pid("P2")).unwrap();

        let err = store.allocate(&rid("R1"), &pid("P3")).unwrap_err();
        assert_eq!(
            err,
            StoreError::CapacityExceeded {
                resource: "R1".into(),
                instances: 2
            }
        );
    }

    #[test]
    fn release_grants_to_queue_head_in_fifo_order() {
        let mut store = store_with(&["P1", "P2", "P3"], &[("R1", 1)]);
        store.request(&pid("P1"), &rid("R1")).unwrap();
        store.request(&pid("P2"), &rid("R1")).unwrap();
        store.request(&pid("P3"), &rid("R1")).unwrap();

        let granted = store.release(&rid("R1"), &pid("P1")).unwrap();
        assert_eq!(granted, Some(pid("P2")));
        assert!(store.process(&pid("P2")).unwrap().holds(&rid("R1")));
        assert!(!store.process(&pid("P2")).unwrap().is_waiting());
        // P3 is still queued.
        assert_eq!(store.resource(&rid("R1")).unwrap().waiting_queue(), &[pid("P3")]);
    }

    #[test]
    fn release_of_unheld_resource_is_an_error() {
        let mut store = store_with(&["P1"], &[("R1", 1)]);
        let err = store.release(&rid("R1"), &pid("P1")).unwrap_err();
        assert_eq!(
            err,
            StoreError::NotHolding {
                process: "P1".into(),
                resource: "R1".into()
            }
        );
    }

    #[test]
    fn rejected_operations_leave_state_untouched() {
        let mut store = store_with(&["P1"], &[("R1", 1)]);
        store.request(&pid("P1"), &rid("R1")).unwrap();
        let version = store.version();

        assert!(store.request(&pid("P9"), &rid("R1")).is_err());
        assert!(store.allocate(&rid("R1"), &pid("P1")).is_err());
        assert!(store.release(&rid("R1"), &pid("P9")).is_err());

        assert_eq!(store.version(), version);
        store.validate();
    }

    #[test]
    fn remove_process_releases_holdings_and_queue_membership() {
        let mut store = store_with(&["P1", "P2"], &[("R1", 1), ("R2", 1)]);
        store.request(&pid("P1"), &rid("R1")).unwrap();
        store.request(&pid("P2"), &rid("R1")).unwrap(); // queued behind P1
        store.request(&pid("P1"), &rid("R2")).unwrap(); // granted

        let released = store.remove_process(&pid("P1")).unwrap();
        // R1's freed unit goes to P2, R2's to nobody.
        assert_eq!(
            released,
            vec![(rid("R1"), Some(pid("P2"))), (rid("R2"), None)]
        );
        assert!(store.process(&pid("P1")).is_none());
        assert!(store.process(&pid("P2")).unwrap().holds(&rid("R1")));
        store.validate();
    }

    #[test]
    fn remove_waiting_process_clears_the_queue() {
        let mut store = store_with(&["P1", "P2"], &[("R1", 1)]);
        store.request(&pid("P1"), &rid("R1")).unwrap();
        store.request(&pid("P2"), &rid("R1")).unwrap();

        store.remove_process(&pid("P2")).unwrap();
        assert!(store.resource(&rid("R1")).unwrap().waiting_queue().is_empty());
        store.validate();
    }

    #[test]
    fn remove_resource_clears_holders_and_waiters() {
        let mut store = store_with(&["P1", "P2"], &[("R1", 1)]);
        store.request(&pid("P1"), &rid("R1")).unwrap();
        store.request(&pid("P2"), &rid("R1")).unwrap();

        store.remove_resource(&rid("R1")).unwrap();
        assert!(store.process(&pid("P1")).unwrap().held().is_empty());
        assert!(!store.process(&pid("P2")).unwrap().is_waiting());
        store.validate();
    }

    #[test]
    fn every_successful_mutation_bumps_the_version() {
        let mut store = AllocationStore::new();
        let v0 = store.version();
        store.add_process(pid("P1"), "Process 1", 1).unwrap();
        store.add_resource(rid("R1"), "Resource 1", ResourceKind::Exclusive, 1).unwrap();
        store.request(&pid("P1"), &rid("R1")).unwrap();
        store.release(&rid("R1"), &pid("P1")).unwrap();
        assert_eq!(store.version(), v0 + 4);
    }
}
