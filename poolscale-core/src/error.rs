// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Custom error types for poolscale.
//!
//! This module defines explicit enum error types as per coding guidelines.
//! No `Box<dyn Error>`, no `anyhow::Result` - all errors are strongly typed.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::{WorkerId, WorkloadKind};

/// Top-level error type for the autoscaler.
#[derive(Debug, Error)]
pub enum AutoscaleError {
    // =========================================================================
    // Configuration Errors - Fail-Fast on Invalid Config
    // =========================================================================
    #[error("Hard validation error: {0}")]
    HardValidation(#[from] HardValidationError),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    ConfigParse { message: String },

    // =========================================================================
    // Control Loop Errors
    // =========================================================================
    #[error("Tick {received} already evaluated (last tick: {last})")]
    DuplicateTick { last: u64, received: u64 },

    #[error("Kind not found: {0}")]
    KindNotFound(WorkloadKind),

    #[error("Worker not found: {worker} (kind: {kind})")]
    WorkerNotFound { kind: WorkloadKind, worker: WorkerId },

    // =========================================================================
    // System Errors
    // =========================================================================
    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Hard validation errors prevent startup.
/// Used when configuration is invalid and the loop cannot safely run.
#[derive(Debug, Error)]
pub enum HardValidationError {
    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Threshold out of range: {field} = {value} (must be within 0.0..=1.0)")]
    ThresholdOutOfRange { field: &'static str, value: f64 },

    #[error("Duplicate kind: {id}")]
    DuplicateKind { id: String },
}

/// Failures reported by the provisioning backend.
/// Neither is fatal to the control loop: they are collected in the tick report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProvisioningError {
    #[error("Failed to provision worker for kind {kind}: {reason}")]
    ProvisioningFailure { kind: WorkloadKind, reason: String },

    #[error("Failed to destroy worker {worker}: {reason}")]
    DestructionFailure { worker: WorkerId, reason: String },
}

/// Result type alias using AutoscaleError.
pub type AutoscaleResult<T> = Result<T, AutoscaleError>;
