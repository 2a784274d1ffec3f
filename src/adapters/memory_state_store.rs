//! In-process state store for tests and embedding.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::errors::DomainResult;
use crate::domain::models::{SessionId, WorkflowKind, WorkflowState};
use crate::domain::ports::StateStore;

#[derive(Default)]
pub struct InMemoryStateStore {
    states: RwLock<HashMap<(SessionId, WorkflowKind), WorkflowState>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn read(&self, session: &SessionId, kind: WorkflowKind) -> Option<WorkflowState> {
        self.states.read().await.get(&(session.clone(), kind)).cloned()
    }

    async fn write(&self, session: &SessionId, state: &WorkflowState) -> DomainResult<()> {
        self.states
            .write()
            .await
            .insert((session.clone(), state.kind()), state.clone());
        Ok(())
    }
}
