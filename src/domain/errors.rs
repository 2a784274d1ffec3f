//! Domain errors for the Waypoint orchestration core.

use thiserror::Error;
use uuid::Uuid;

/// Format a legal successor set as `a | b | c`, or `(terminal)` when empty.
fn format_legal_set(legal: &[String]) -> String {
    if legal.is_empty() {
        "(terminal)".to_string()
    } else {
        legal.join(" | ")
    }
}

/// Domain-level errors that can occur in the Waypoint system.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error(
        "Invalid {workflow} transition from {from} to {to} (legal: {})",
        format_legal_set(.legal)
    )]
    InvalidTransition {
        workflow: String,
        from: String,
        to: String,
        legal: Vec<String>,
    },

    #[error("A {workflow} workflow is already active for '{slug}' in phase {phase}")]
    AlreadyActive {
        workflow: String,
        slug: String,
        phase: String,
    },

    #[error("No active {0} workflow for this session")]
    NoActiveWorkflow(String),

    #[error("Fix loop limit reached: iteration {iteration} of {max}")]
    MaxIterationsExceeded { iteration: u32, max: u32 },

    #[error("No active phase is reachable from {0}")]
    NoReachablePhase(String),

    #[error("Invalid orchestration mode: {0} (expected classic, swarm or auto)")]
    InvalidMode(String),

    #[error("Candidate not found: {0}")]
    CandidateNotFound(Uuid),

    #[error("Proposal not found: {0}")]
    ProposalNotFound(Uuid),

    #[error("Proposal {id} was already decided ({status})")]
    AlreadyDecided { id: Uuid, status: String },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("External command failed: {0}")]
    ExternalCommand(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_names_legal_set() {
        let err = DomainError::InvalidTransition {
            workflow: "spec".to_string(),
            from: "plan".to_string(),
            to: "verify".to_string(),
            legal: vec!["implement".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("from plan to verify"));
        assert!(msg.contains("legal: implement"));
    }

    #[test]
    fn test_invalid_transition_from_terminal() {
        let err = DomainError::InvalidTransition {
            workflow: "spec".to_string(),
            from: "learn".to_string(),
            to: "plan".to_string(),
            legal: vec![],
        };
        assert!(err.to_string().contains("(terminal)"));
    }

    #[test]
    fn test_serde_error_conversion() {
        let err: DomainError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, DomainError::SerializationError(_)));
    }
}
