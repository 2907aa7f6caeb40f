//! Identifiers
//!
//! Process and resource identifiers are short strings in a fixed format:
//! `P` followed by digits for processes, `R` followed by digits for
//! resources. The format is validated at construction, so a `ProcessId` or
//! `ResourceId` held anywhere in the system is known to be well-formed.
//!
//! Both types serialize as their plain string form and validate again on
//! deserialization, so malformed ids are rejected at the wire boundary too.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::StoreError;

/// Check that `raw` is `prefix` followed by one or more ASCII digits.
fn is_well_formed(raw: &str, prefix: char) -> bool {
    let mut chars = raw.chars();
    if chars.next() != Some(prefix) {
        return false;
    }
    let digits = chars.as_str();
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Identifier of a process, e.g. `P1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProcessId(String);

impl ProcessId {
    /// Parse and validate a process id.
    pub fn parse(raw: impl Into<String>) -> Result<Self, StoreError> {
        let raw = raw.into();
        if is_well_formed(&raw, 'P') {
            Ok(Self(raw))
        } else {
            Err(StoreError::MalformedId { id: raw })
        }
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ProcessId {
    type Error = StoreError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(raw)
    }
}

impl From<ProcessId> for String {
    fn from(id: ProcessId) -> Self {
        id.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a resource, e.g. `R1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceId(String);

impl ResourceId {
    /// Parse and validate a resource id.
    pub fn parse(raw: impl Into<String>) -> Result<Self, StoreError> {
        let raw = raw.into();
        if is_well_formed(&raw, 'R') {
            Ok(Self(raw))
        } else {
            Err(StoreError::MalformedId { id: raw })
        }
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ResourceId {
    type Error = StoreError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(raw)
    }
}

impl From<ResourceId> for String {
    fn from(id: ResourceId) -> Self {
        id.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
