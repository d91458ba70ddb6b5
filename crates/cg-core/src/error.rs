//! # AppError
//!
//! Centralized error handling for the CaseGuard ecosystem.
//! Each variant is one reportable outcome kind; callers must be able to
//! tell them apart, so nothing here collapses into a generic failure.

use thiserror::Error;

/// The primary error type for all cg-core operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Referenced entity does not exist (e.g. product code, registration id)
    #[error("{0} not found: {1}")]
    NotFound(String, String),

    /// Validation failure (e.g. wrong code length, prefix/type mismatch)
    #[error("validation error: {0}")]
    Validation(String),

    /// Security/Auth failure (missing or stale session token)
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but the role does not permit the operation
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Resource already exists (duplicate registration for a code)
    #[error("conflict: {0}")]
    Conflict(String),

    /// A backing store or collaborator is unreachable or errored
    #[error("dependency error: {0}")]
    Dependency(String),

    /// Anything else that should still surface with a specific reason
    #[error("internal service error: {0}")]
    Internal(String),
}

/// A specialized Result type for CaseGuard logic.
pub type Result<T> = std::result::Result<T, AppError>;
