//! Analysis
//!
//! Pure, read-only analyses over an allocation store snapshot:
//!
//! - `graph`: the resource allocation graph and wait-for graph projections
//! - `detect`: the Work/Finish deadlock detection reduction
//! - `risk`: the heuristic risk score and strategy recommendation
//!
//! Nothing here mutates the store, so detection and risk assessment may
//! safely run back-to-back (or concurrently) against the same snapshot.
//! Every report embeds the store version it was derived from.

mod detect;
mod graph;
mod risk;

pub use detect::{detect, DeadlockReport};
pub use graph::{rag_edges, wait_for_edges, EdgeKind, NodeRef, RagEdge, WaitForEdge};
pub use risk::{assess, ContentionLevel, RiskReport, Strategy};
