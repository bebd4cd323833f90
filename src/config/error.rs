//! Configuration error types.

use thiserror::Error;

use crate::cache::PolicyError;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A numeric variable could not be parsed.
    #[error("invalid value '{value}' for {name}: {reason}")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },

    /// `STRATA_LOCK_MODE` is neither `global` nor `per_key`.
    #[error("invalid lock mode '{value}': expected 'global' or 'per_key'")]
    InvalidLockMode { value: String },

    /// The assembled policy table is inconsistent.
    #[error("invalid cache policy: {0}")]
    Policy(#[from] PolicyError),
}
