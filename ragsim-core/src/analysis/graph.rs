//! Graph Projections
//!
//! The resource allocation graph (RAG) and the process-only wait-for graph
//! are pure projections of the allocation store. They are recomputed on
//! demand and never cached: a projection is only meaningful for the store
//! version it was derived from, and deriving it is linear in the number of
//! edges anyway.
//!
//! - **Request edge** `P -> R`: process `P` has an outstanding request on
//!   resource `R`.
//! - **Allocation edge** `R -> P`: one unit of `R` is allocated to `P`.
//! - **Wait-for edge** `Pi -> Pj via R`: `Pi` requests `R` and `Pj` holds a
//!   unit of it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::store::{AllocationStore, ProcessId, ResourceId};

/// A node in the bipartite resource allocation graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum NodeRef {
    Process(ProcessId),
    Resource(ResourceId),
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Process(id) => id.fmt(f),
            Self::Resource(id) => id.fmt(f),
        }
    }
}

/// Direction/meaning of a RAG edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Request,
    Allocation,
}

/// One directed edge of the resource allocation graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RagEdge {
    pub from: NodeRef,
    pub to: NodeRef,
    pub kind: EdgeKind,
}

/// One edge of the process-only wait-for graph, annotated with the
/// resource that induces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitForEdge {
    pub from: ProcessId,
    pub to: ProcessId,
    pub via: ResourceId,
}

/// Derive the bipartite request/allocation edge set.
///
/// Edges are emitted in store iteration order: first one request edge per
/// waiting process, then allocation edges per resource in grant order.
pub fn rag_edges(store: &AllocationStore) -> Vec<RagEdge> {
    let mut edges = Vec::new();

    for process in store.processes() {
        if let Some(resource) = process.waiting_for() {
            edges.push(RagEdge {
                from: NodeRef::Process(process.id().clone()),
                to: NodeRef::Resource(resource.clone()),
                kind: EdgeKind::Request,
            });
        }
    }

    for resource in store.resources() {
        for holder in resource.allocated_to() {
            edges.push(RagEdge {
                from: NodeRef::Resource(resource.id().clone()),
                to: NodeRef::Process(holder.clone()),
                kind: EdgeKind::Allocation,
            });
        }
    }

    edges
}

/// Derive the wait-for graph: `Pi -> Pj via R` whenever `Pi` requests `R`
/// and `Pj` holds one of its units. A request on a multi-instance resource
/// yields one edge per holder.
pub fn wait_for_edges(store: &AllocationStore) -> Vec<WaitForEdge> {
    let mut edges = Vec::new();

    for process in store.processes() {
        let Some(resource_id) = process.waiting_for() else {
            continue;
        };
        let Some(resource) = store.resource(resource_id) else {
            continue;
        };
        for holder in resource.allocated_to() {
            edges.push(WaitForEdge {
                from: process.id().clone(),
                to: holder.clone(),
                via: resource_id.clone(),
            });
        }
    }

    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ResourceKind;

    fn pid(raw: &str) -> ProcessId {
        ProcessId::parse(raw).unwrap()
    }

    fn rid(raw: &str) -> ResourceId {
        ResourceId::parse(raw).unwrap()
    }

    /// P1 holds R2 and waits on R1; P2 holds R1.
    fn two_process_store() -> AllocationStore {
        let mut store = AllocationStore::new();
        store.add_process(pid("P1"), "Process 1", 1).unwrap();
        store.add_process(pid("P2"), "Process 2", 1).unwrap();
        store.add_resource(rid("R1"), "Resource 1", ResourceKind::Exclusive, 1).unwrap();
        store.add_resource(rid("R2"), "Resource 2", ResourceKind::Exclusive, 1).unwrap();
        store.request(&pid("P1"), &rid("R2")).unwrap();
        store.request(&pid("P2"), &rid("R1")).unwrap();
        store.request(&pid("P1"), &rid("R1")).unwrap();
        store
    }

    #[test]
    fn rag_edges_cover_requests_and_allocations() {
        let store = two_process_store();
        let edges = rag_edges(&store);

        assert!(edges.contains(&RagEdge {
            from: NodeRef::Process(pid("P1")),
            to: NodeRef::Resource(rid("R1")),
            kind: EdgeKind::Request,
        }));
        assert!(edges.contains(&RagEdge {
            from: NodeRef::Resource(rid("R2")),
            to: NodeRef::Process(pid("P1")),
            kind: EdgeKind::Allocation,
        }));
        // One request edge + two allocation edges.
        assert_eq!(edges.len(), 3);
    }

    #[test]
    fn wait_for_edges_route_through_holders() {
        let store = two_process_store();
        let edges = wait_for_edges(&store);
        assert_eq!(
            edges,
            vec![WaitForEdge {
                from: pid("P1"),
                to: pid("P2"),
                via: rid("R1"),
            }]
        );
    }

    #[test]
    fn multi_instance_request_yields_one_edge_per_holder() {
        let mut store = AllocationStore::new();
        for p in ["P1", "P2", "P3"] {
            store.add_process(pid(p), p, 1).unwrap();
        }
        store.add_resource(rid("R1"), "Resource 1", ResourceKind::Sharable, 2).unwrap();
        store.request(&pid("P1"), &rid("R1")).unwrap();
        store.request(&pid("P2"), &rid("R1")).unwrap();
        store.request(&pid("P3"), &rid("R1")).unwrap(); // queued

        let edges = wait_for_edges(&store);
        assert_eq!(edges.len(), 2);
        assert!(edges.iter().all(|e| e.from == pid("P3") && e.via == rid("R1")));
    }

    #[test]
    fn projections_are_empty_for_an_empty_store() {
        let store = AllocationStore::new();
        assert!(rag_edges(&store).is_empty());
        assert!(wait_for_edges(&store).is_empty());
    }
}
