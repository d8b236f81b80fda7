//! Error types for the console core
//!
//! One variant per failure class the console distinguishes:
//! - stream failures are absorbed at the session boundary and rendered as
//!   transcript content, never propagated as `Err`
//! - CRUD failures are caught at the call site and shown as transient feedback
//! - validation failures block locally and name the wizard step to fix

use crate::wizard::WizardStep;
use thiserror::Error;

/// Errors that can occur in the console core
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// Connection-level failure (refused, reset, mid-stream read error)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Bearer credential rejected (HTTP 401); escalated out-of-band
    #[error("Unauthorized: bearer credential invalid or expired")]
    Unauthorized,

    /// Local validation failure; names the wizard step that must be fixed
    #[error("Validation failed on the {step} step: {reason}")]
    Validation { step: WizardStep, reason: String },

    /// Remote rejection (4xx/5xx) on a CRUD call
    #[error("API error ({status}): {message}")]
    Remote { status: u16, message: String },

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Draft snapshot storage failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for console operations
pub type Result<T> = std::result::Result<T, ConsoleError>;
