//! Workflow state persistence port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{SessionId, WorkflowKind, WorkflowState};

/// Durable read/modify/write of one workflow state per session and kind.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read the state for a session. Missing or unreadable state is `None`:
    /// callers treat it as "no active workflow".
    async fn read(&self, session: &SessionId, kind: WorkflowKind) -> Option<WorkflowState>;

    /// Replace the state atomically. Readers never observe a partial write;
    /// concurrent writers are last-write-wins.
    async fn write(&self, session: &SessionId, state: &WorkflowState) -> DomainResult<()>;
}
