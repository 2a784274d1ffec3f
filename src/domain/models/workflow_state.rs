//! Workflow state sum type.
//!
//! Persisted as one JSON document per session and workflow kind. At most one
//! instance of each kind exists per session.

use serde::{Deserialize, Serialize};

use super::delivery_state::DeliveryState;
use super::spec_state::SpecState;
use crate::domain::errors::{DomainError, DomainResult};

/// Opaque key identifying the session that owns a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Session ids name a directory under the state root, so they must be a
    /// single plain path segment.
    pub fn validate(&self) -> DomainResult<()> {
        let id = self.0.as_str();
        let reason = if id.is_empty() {
            Some("must not be empty")
        } else if id == "." || id == ".." {
            Some("must not be a relative directory reference")
        } else if id.contains(['/', '\\', ':', '\0']) {
            Some("must not contain path separators")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(DomainError::ValidationFailed(format!("session id {id:?} {reason}"))),
            None => Ok(()),
        }
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which coordinator owns a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    Spec,
    Delivery,
}

impl WorkflowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spec => "spec",
            Self::Delivery => "delivery",
        }
    }
}

impl std::fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of a workflow instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkflowState {
    Spec(SpecState),
    Delivery(DeliveryState),
}

impl WorkflowState {
    pub fn kind(&self) -> WorkflowKind {
        match self {
            Self::Spec(_) => WorkflowKind::Spec,
            Self::Delivery(_) => WorkflowKind::Delivery,
        }
    }

    pub fn slug(&self) -> &str {
        match self {
            Self::Spec(s) => &s.slug,
            Self::Delivery(d) => &d.slug,
        }
    }

    /// Whether the workflow has reached its terminal phase.
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Spec(s) => s.is_terminal(),
            Self::Delivery(d) => d.is_terminal(),
        }
    }

    pub fn into_spec(self) -> Option<SpecState> {
        match self {
            Self::Spec(s) => Some(s),
            Self::Delivery(_) => None,
        }
    }

    pub fn into_delivery(self) -> Option<DeliveryState> {
        match self {
            Self::Delivery(d) => Some(d),
            Self::Spec(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::spec_state::{SpecPhase, SpecVariant};

    #[test]
    fn test_session_id_validation() {
        for ok in ["default", "s1", "2026-10-19.run_3", "..hidden"] {
            assert!(SessionId::new(ok).validate().is_ok(), "{ok:?}");
        }
        for bad in ["", ".", "..", "a/b", "/tmp/x", "..\\up", "c:x"] {
            assert!(SessionId::new(bad).validate().is_err(), "{bad:?}");
        }
    }

    #[test]
    fn test_workflow_state_serde_roundtrip() {
        let mut spec = SpecState::new("feat-1", Some("plans/feat-1.md".into()), SpecVariant::Standard, 3);
        spec.phase = SpecPhase::Verify;
        spec.total_tasks = 4;
        spec.completed_tasks = 2;
        let state = WorkflowState::Spec(spec);

        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"kind\":\"spec\""));
        let deserialized: WorkflowState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, deserialized);
        assert_eq!(deserialized.kind(), WorkflowKind::Spec);
        assert_eq!(deserialized.slug(), "feat-1");
    }

    #[test]
    fn test_terminal() {
        let mut spec = SpecState::new("feat-1", None, SpecVariant::Standard, 3);
        assert!(!WorkflowState::Spec(spec.clone()).is_terminal());
        spec.phase = SpecPhase::Learn;
        assert!(WorkflowState::Spec(spec).is_terminal());
    }

    #[test]
    fn test_variant_accessors() {
        let spec = WorkflowState::Spec(SpecState::new("a", None, SpecVariant::Standard, 1));
        assert!(spec.clone().into_delivery().is_none());
        assert!(spec.into_spec().is_some());
    }
}
