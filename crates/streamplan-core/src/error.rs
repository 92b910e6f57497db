//! Error types for streamplan.

use thiserror::Error;

use crate::types::ObjectId;

/// Main error type for planning sessions.
#[derive(Error, Debug, Clone)]
pub enum PlanError {
    /// An optimistic object was read before any binding resolved it.
    #[error("Optimistic object {object} is unbound")]
    UnboundObject { object: ObjectId },

    /// An optimistic object was resolved twice within one binding.
    #[error("Optimistic object {object} is already resolved")]
    ObjectAlreadyResolved { object: ObjectId },

    /// The planner proved that no plan exists under the current facts and axioms.
    #[error("Goal is infeasible: {message}")]
    InfeasibleGoal { message: String },

    /// The time or effort budget ran out before a solution was found.
    #[error("Budget exceeded after {elapsed_ms}ms (limit {limit_ms}ms)")]
    BudgetExceeded { elapsed_ms: u64, limit_ms: u64 },

    /// A stream procedure misbehaved.
    #[error("Stream {stream} failed: {message}")]
    StreamFailed { stream: String, message: String },

    /// A stream declaration is malformed.
    #[error("Invalid stream {stream}: {message}")]
    InvalidStream { stream: String, message: String },

    /// A goal term names a function or stream that was never declared.
    #[error("{name} is not implemented")]
    UnknownExternal { name: String },

    /// The planning domain is malformed.
    #[error("Invalid domain: {message}")]
    InvalidDomain { message: String },

    /// A fact does not have the shape its context requires.
    #[error("Invalid fact: {message}")]
    InvalidFact { message: String },

    /// The external planner reported an error.
    #[error("Planner failed: {message}")]
    PlannerFailed { message: String },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error (should not happen).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlanError {
    /// Returns true if retrying with a larger budget could succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PlanError::BudgetExceeded { .. } | PlanError::InfeasibleGoal { .. }
        )
    }

    /// Shorthand for a failing stream procedure.
    pub fn stream_failed(stream: impl Into<String>, message: impl std::fmt::Display) -> Self {
        PlanError::StreamFailed {
            stream: stream.into(),
            message: message.to_string(),
        }
    }
}

/// Convenience Result type for streamplan operations.
pub type Result<T> = std::result::Result<T, PlanError>;

impl From<serde_json::Error> for PlanError {
    fn from(err: serde_json::Error) -> Self {
        PlanError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable() {
        assert!(PlanError::BudgetExceeded {
            elapsed_ms: 10,
            limit_ms: 5
        }
        .is_recoverable());
        assert!(!PlanError::UnboundObject {
            object: ObjectId(3)
        }
        .is_recoverable());
    }

    #[test]
    fn test_display() {
        let err = PlanError::stream_failed("sample-grasp", "solver crashed");
        assert_eq!(err.to_string(), "Stream sample-grasp failed: solver crashed");
        assert_eq!(
            PlanError::UnboundObject { object: ObjectId(7) }.to_string(),
            "Optimistic object #o7 is unbound"
        );
    }
}
