//! RAG Sim Core
//!
//! This crate implements a deadlock detection and resolution engine over a
//! resource allocation graph (RAG) model. It provides:
//!
//! - An allocation store tracking processes, counted resources, holdings,
//!   and FIFO waiting queues
//! - Graph projections (request/allocation edges, wait-for edges)
//! - Exact deadlock detection via the Available/Allocation/Request
//!   reduction, with a human-readable cycle trace
//! - A heuristic risk assessor with strategy recommendations
//! - A resolution engine (terminate or preempt) and a tick driver that
//!   sequences detect, assess, resolve against one consistent snapshot
//!
//! # Architecture
//!
//! The crate is organized into three modules:
//!
//! - `store`: the single source of truth for allocation state
//! - `analysis`: pure, read-only analyses over a store snapshot
//! - `sim`: feed ingestion, resolution actions, and the tick driver
//!
//! # Example
//!
//! ```rust
//! use ragsim_core::store::{AllocationStore, ProcessId, ResourceId, ResourceKind};
//! use ragsim_core::analysis::detect;
//!
//! let mut store = AllocationStore::new();
//! let p1 = ProcessId::parse("P1").unwrap();
//! let p2 = ProcessId::parse("P2").unwrap();
//! let r1 = ResourceId::parse("R1").unwrap();
//! let r2 = ResourceId::parse("R2").unwrap();
//!
//! store.add_process(p1.clone(), "Process 1", 1).unwrap();
//! store.add_process(p2.clone(), "Process 2", 1).unwrap();
//! store.add_resource(r1.clone(), "Resource 1", ResourceKind::Exclusive, 1).unwrap();
//! store.add_resource(r2.clone(), "Resource 2", ResourceKind::Exclusive, 1).unwrap();
//!
//! // Each process grabs one resource, then requests the other.
//! store.request(&p1, &r1).unwrap();
//! store.request(&p2, &r2).unwrap();
//! store.request(&p1, &r2).unwrap();
//! store.request(&p2, &r1).unwrap();
//!
//! let report = detect(&store);
//! assert!(report.detected);
//! assert_eq!(report.deadlocked_processes, vec![p1, p2]);
//! ```

pub mod analysis;
pub mod sim;
pub mod store;
