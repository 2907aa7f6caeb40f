//! Store Errors
//!
//! Every fallible operation on the allocation store returns a typed
//! `StoreError`. A rejected operation leaves the store unchanged; none of
//! these errors are fatal to the store itself. Invariant violations are a
//! different category entirely: they indicate a bug and panic via the
//! store's internal assertions rather than surfacing here.

use thiserror::Error;

/// Result alias for allocation store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by allocation store and resolution operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// An id did not match the required format (`P<digits>` / `R<digits>`).
    #[error("malformed id: {id:?}")]
    MalformedId { id: String },

    /// A referenced process or resource does not exist.
    #[error("unknown id: {id}")]
    InvalidReference { id: String },

    /// An id is already taken by an existing process or resource.
    #[error("duplicate id: {id}")]
    DuplicateId { id: String },

    /// All instances of the resource are already allocated.
    #[error("resource {resource} has no free instances ({instances} allocated)")]
    CapacityExceeded { resource: String, instances: u32 },

    /// The process already has an outstanding request.
    #[error("process {process} is already waiting on {waiting_on}")]
    AlreadyWaiting { process: String, waiting_on: String },

    /// The process does not hold the resource it tried to release.
    #[error("process {process} does not hold {resource}")]
    NotHolding { process: String, resource: String },

    /// The requested action is not applicable to the current state,
    /// e.g. terminating a process that is not deadlocked.
    #[error("invalid action: {0}")]
    InvalidAction(String),
}
