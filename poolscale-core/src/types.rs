// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Newtype wrappers for validated inputs.
//!
//! Kinds and worker identifiers are validated once at creation time so the
//! control loop can treat them as opaque keys.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::HardValidationError;

/// Maximum length of a kind or worker identifier.
const MAX_ID_LEN: usize = 64;

fn validate_id(field: &'static str, id: &str) -> Result<(), HardValidationError> {
    if id.is_empty() {
        return Err(HardValidationError::InvalidFieldValue {
            field,
            value: id.to_string(),
            reason: "Identifier cannot be empty".to_string(),
        });
    }

    if id.len() > MAX_ID_LEN {
        return Err(HardValidationError::InvalidFieldValue {
            field,
            value: id.to_string(),
            reason: format!("Identifier too long: {} chars (max {})", id.len(), MAX_ID_LEN),
        });
    }

    // Validate characters: alphanumeric, hyphens, underscores, dots
    if !id
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(HardValidationError::InvalidFieldValue {
            field,
            value: id.to_string(),
            reason: "Identifier must contain only alphanumeric characters, hyphens, underscores, and dots".to_string(),
        });
    }

    Ok(())
}

/// Validated workload kind: the unit of pool grouping.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WorkloadKind(String);

impl WorkloadKind {
    /// Create a new WorkloadKind with validation.
    pub fn new(kind: impl Into<String>) -> Result<Self, HardValidationError> {
        let kind = kind.into();
        validate_id("kind", &kind)?;
        Ok(Self(kind))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for WorkloadKind {
    type Error = HardValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<WorkloadKind> for String {
    fn from(kind: WorkloadKind) -> Self {
        kind.0
    }
}

/// Validated identifier of a provisioned worker.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WorkerId(String);

impl WorkerId {
    /// Create a new WorkerId with validation.
    pub fn new(id: impl Into<String>) -> Result<Self, HardValidationError> {
        let id = id.into();
        validate_id("worker_id", &id)?;
        Ok(Self(id))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for WorkerId {
    type Error = HardValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<WorkerId> for String {
    fn from(id: WorkerId) -> Self {
        id.0
    }
}

/// A worker as seen by the pool registry at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerHandle {
    id: WorkerId,
    active_work: bool,
}

impl WorkerHandle {
    /// Create an idle worker handle.
    pub fn new(id: WorkerId) -> Self {
        Self {
            id,
            active_work: false,
        }
    }

    /// Builder-style setter for the active work flag.
    pub fn with_active_work(mut self, active: bool) -> Self {
        self.active_work = active;
        self
    }

    /// The worker identifier.
    pub fn id(&self) -> &WorkerId {
        &self.id
    }

    /// True if the worker is executing a task or has one queued.
    pub fn has_active_work(&self) -> bool {
        self.active_work
    }

    pub(crate) fn set_active_work(&mut self, active: bool) {
        self.active_work = active;
    }
}

impl fmt::Display for WorkerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}
