//! Deadlock Detection
//!
//! Detection runs the classical Available/Allocation/Request reduction
//! (Work/Finish) rather than bare cycle search. With multi-instance or
//! sharable resources a wait-for cycle is neither necessary nor sufficient
//! for deadlock; the reduction is exact for the resource classes modeled
//! here and terminates in at most `O(P)` passes of `O(P·R)` work each.
//!
//! # Algorithm
//!
//! 1. `Available[r] = instances[r] - |allocated_to[r]|`.
//! 2. A process's request vector is at most one resource (single
//!    outstanding request), so "Request ≤ Work" collapses to "not waiting,
//!    or at least one unit of the awaited resource is in Work".
//! 3. Processes holding nothing and requesting nothing start finished.
//! 4. Repeatedly finish any process whose request is satisfiable,
//!    reclaiming its allocation into Work, until a pass makes no progress.
//! 5. The unfinished complement is exactly the deadlocked set.
//!
//! A second step builds the wait-for subgraph restricted to the deadlocked
//! set and extracts one minimal cycle by depth-first search with an
//! explicit stack, for human-readable explanation. With multi-instance
//! resources the deadlocked set can form a knot with no simple cycle; the
//! report then carries the subgraph edges as the witness and leaves the
//! cycle empty.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::graph::{wait_for_edges, NodeRef, WaitForEdge};
use crate::store::{AllocationStore, ProcessId, ResourceId};

/// Result of one detection run. A pure value: running detection twice on an
/// unchanged store yields an equal report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadlockReport {
    /// Whether any process can never finish.
    pub detected: bool,
    /// The unfinished complement of the reduction, in store order.
    pub deadlocked_processes: Vec<ProcessId>,
    /// Resources inducing wait-for edges inside the deadlocked set.
    pub deadlocked_resources: Vec<ResourceId>,
    /// One minimal cycle as an alternating process/resource trace, without
    /// repeating the starting node. Empty when no deadlock exists or when
    /// the deadlocked set is a knot with no simple cycle.
    pub cycle: Vec<NodeRef>,
    /// Wait-for subgraph restricted to the deadlocked set; the full
    /// explanation (and the witness in the knot case).
    pub wait_for: Vec<WaitForEdge>,
    /// Store version this report was computed at.
    pub at_version: u64,
}

impl DeadlockReport {
    /// Whether the report still describes the store's current state.
    pub fn is_fresh(&self, store: &AllocationStore) -> bool {
        self.at_version == store.version()
    }

    pub fn is_deadlocked(&self, process: &ProcessId) -> bool {
        self.deadlocked_processes.contains(process)
    }

    /// Serialize the report for export.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Run deadlock detection against the store's current state.
pub fn detect(store: &AllocationStore) -> DeadlockReport {
    let deadlocked = reduce(store);
    let detected = !deadlocked.is_empty();

    let member: HashSet<&ProcessId> = deadlocked.iter().collect();
    let wait_for: Vec<WaitForEdge> = wait_for_edges(store)
        .into_iter()
        .filter(|e| member.contains(&e.from) && member.contains(&e.to))
        .collect();

    let mut deadlocked_resources = Vec::new();
    for edge in &wait_for {
        if !deadlocked_resources.contains(&edge.via) {
            deadlocked_resources.push(edge.via.clone());
        }
    }

    let cycle = extract_cycle(&deadlocked, &wait_for);

    if detected {
        warn!(
            processes = deadlocked.len(),
            resources = deadlocked_resources.len(),
            "deadlock detected"
        );
    } else {
        debug!("no deadlock; every process can finish");
    }

    DeadlockReport {
        detected,
        deadlocked_processes: deadlocked,
        deadlocked_resources,
        cycle,
        wait_for,
        at_version: store.version(),
    }
}

/// The Work/Finish reduction. Returns the unfinished processes in store
/// order.
fn reduce(store: &AllocationStore) -> Vec<ProcessId> {
    let mut work: HashMap<&ResourceId, u32> = store
        .resources()
        .map(|r| (r.id(), r.available()))
        .collect();

    let mut finish: HashMap<&ProcessId, bool> = store
        .processes()
        .map(|p| (p.id(), p.held().is_empty() && !p.is_waiting()))
        .collect();

    let mut passes = 0usize;
    loop {
        passes += 1;
        let mut progressed = false;

        for process in store.processes() {
            if finish[process.id()] {
                continue;
            }
            let satisfiable = match process.waiting_for() {
                None => true,
                Some(resource) => work.get(resource).copied().unwrap_or(0) >= 1,
            };
            if !satisfiable {
                continue;
            }

            // Pretend the process runs to completion and reclaims its
            // allocation into Work.
            for held in process.held() {
                *work.get_mut(held).expect("held resource exists in store") += 1;
            }
            finish.insert(process.id(), true);
            progressed = true;
        }

        if !progressed {
            break;
        }
    }
    debug!(passes, "reduction complete");

    store
        .processes()
        .filter(|p| !finish[p.id()])
        .map(|p| p.id().clone())
        .collect()
}

/// Find one minimal cycle in the deadlocked wait-for subgraph and expand it
/// into the alternating process/resource trace. Iterative DFS with an
/// explicit stack and an on-path set; each node enters the search once.
fn extract_cycle(deadlocked: &[ProcessId], wait_for: &[WaitForEdge]) -> Vec<NodeRef> {
    let mut adjacency: HashMap<&ProcessId, Vec<&WaitForEdge>> = HashMap::new();
    for edge in wait_for {
        adjacency.entry(&edge.from).or_default().push(edge);
    }

    let mut visited: HashSet<&ProcessId> = HashSet::new();
    for start in deadlocked {
        if visited.contains(start) {
            continue;
        }

        let mut path: Vec<&ProcessId> = vec![start];
        let mut on_path: HashSet<&ProcessId> = HashSet::from([start]);
        let mut cursor: Vec<usize> = vec![0];
        visited.insert(start);

        while let Some(&node) = path.last() {
            let neighbors = adjacency.get(node).map(Vec::as_slice).unwrap_or(&[]);
            let idx = *cursor.last().expect("cursor tracks path");

            if idx >= neighbors.len() {
                path.pop();
                cursor.pop();
                on_path.remove(node);
                continue;
            }
            *cursor.last_mut().expect("cursor tracks path") += 1;

            let next = &neighbors[idx].to;
            if on_path.contains(next) {
                // Back edge: the path from `next` onward is a cycle.
                let from = path.iter().position(|p| *p == next).expect("next is on path");
                return expand_cycle(&path[from..], &adjacency);
            }
            if visited.insert(next) {
                path.push(next);
                on_path.insert(next);
                cursor.push(0);
            }
        }
    }

    Vec::new()
}

/// Interleave the resources that induce each wait-for hop, turning a
/// process cycle `[P1, P3, P2]` into `[P1, R1, P3, R3, P2, R2]`.
fn expand_cycle(
    processes: &[&ProcessId],
    adjacency: &HashMap<&ProcessId, Vec<&WaitForEdge>>,
) -> Vec<NodeRef> {
    let mut trace = Vec::with_capacity(processes.len() * 2);
    for (i, current) in processes.iter().enumerate() {
        let next = processes[(i + 1) % processes.len()];
        trace.push(NodeRef::Process((*current).clone()));

        let via = adjacency
            .get(*current)
            .and_then(|edges| edges.iter().find(|e| &e.to == next))
            .map(|e| e.via.clone())
            .expect("consecutive cycle nodes share a wait-for edge");
        trace.push(NodeRef::Resource(via));
    }
    trace
}
