//! Structured error types for statprop.

use thiserror::Error;

/// Unified error type for all statprop operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StatPropError {
    /// Malformed call (mismatched shapes, bad precision, too few observations).
    #[error("invalid argument: {0}")]
    Argument(String),

    /// The posted constraints admit no solution.
    #[error("infeasible: {0}")]
    Infeasible(String),

    /// A bound formula or interval constructor produced an invalid interval.
    #[error("numeric domain error: {0}")]
    NumericDomain(String),

    /// Configuration could not be parsed or validated.
    #[error("config error: {0}")]
    Config(String),
}

impl StatPropError {
    /// Whether this error signals an unsatisfiable constraint set.
    pub fn is_infeasible(&self) -> bool {
        matches!(self, StatPropError::Infeasible(_))
    }
}

/// Convenience alias used throughout statprop.
pub type Result<T> = std::result::Result<T, StatPropError>;
