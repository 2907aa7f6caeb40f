//! Allocation Store
//!
//! This module holds the mutable heart of the simulator: process and
//! resource records plus the operations that move units between them.
//!
//! # Overview
//!
//! - `Process` and `Resource` are plain data records; process state is
//!   always derived, never stored.
//! - `AllocationStore` owns both tables and exposes the mutation surface
//!   (add/remove, request, allocate, release). Every operation is atomic:
//!   fully applied with invariants intact, or rejected with a `StoreError`
//!   and no state change.
//! - A version counter invalidates downstream detection reports on any
//!   mutation.

mod allocation;
mod error;
mod id;
mod process;
mod resource;

pub use allocation::{AllocationStore, RequestOutcome};
pub use error::{StoreError, StoreResult};
pub use id::{ProcessId, ResourceId};
pub use process::{Process, ProcessState};
pub use resource::{Resource, ResourceKind};
