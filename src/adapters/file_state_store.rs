//! JSON-file state store.
//!
//! Layout: `<state_dir>/<session>/<kind>-state.json`. Writes go to a
//! uniquely named temp file in the same directory and are renamed over the
//! target, so readers see either the old or the new document.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{SessionId, WorkflowKind, WorkflowState};
use crate::domain::ports::StateStore;

#[derive(Debug, Clone)]
pub struct FileStateStore {
    root: PathBuf,
}

impl FileStateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the state document. Fails for session ids that would resolve
    /// outside the root.
    pub fn state_path(&self, session: &SessionId, kind: WorkflowKind) -> DomainResult<PathBuf> {
        session.validate()?;
        Ok(self
            .root
            .join(session.as_str())
            .join(format!("{}-state.json", kind.as_str())))
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn read(&self, session: &SessionId, kind: WorkflowKind) -> Option<WorkflowState> {
        let path = match self.state_path(session, kind) {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!(session = %session, error = %e, "rejected session id");
                return None;
            }
        };
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unreadable workflow state");
                return None;
            }
        };

        match serde_json::from_str::<WorkflowState>(&raw) {
            Ok(state) if state.kind() == kind => Some(state),
            Ok(state) => {
                tracing::warn!(
                    path = %path.display(),
                    found = %state.kind(),
                    "workflow state has the wrong kind"
                );
                None
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "malformed workflow state");
                None
            }
        }
    }

    async fn write(&self, session: &SessionId, state: &WorkflowState) -> DomainResult<()> {
        let path = self.state_path(session, state.kind())?;
        let dir = path.parent().unwrap_or(&self.root);
        tokio::fs::create_dir_all(dir).await?;

        let json = serde_json::to_string_pretty(state)?;
        let tmp = dir.join(format!(".{}-state.{}.tmp", state.kind().as_str(), Uuid::new_v4()));
        tokio::fs::write(&tmp, json).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{SpecState, SpecVariant};

    fn spec_state(slug: &str) -> WorkflowState {
        WorkflowState::Spec(SpecState::new(slug, Some("plans/a.md".into()), SpecVariant::Standard, 3))
    }

    #[tokio::test]
    async fn test_missing_state_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());
        assert!(store.read(&SessionId::new("nope"), WorkflowKind::Spec).await.is_none());
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());
        let session = SessionId::new("s1");
        let state = spec_state("feat");

        store.write(&session, &state).await.unwrap();
        assert_eq!(store.read(&session, WorkflowKind::Spec).await, Some(state));
        assert!(store.read(&session, WorkflowKind::Delivery).await.is_none());

        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("s1"))
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_state_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());
        let session = SessionId::new("s1");
        let path = store.state_path(&session, WorkflowKind::Spec).unwrap();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();

        assert!(store.read(&session, WorkflowKind::Spec).await.is_none());
    }

    #[tokio::test]
    async fn test_overwrite_replaces_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());
        let session = SessionId::new("s1");
        store.write(&session, &spec_state("first")).await.unwrap();
        store.write(&session, &spec_state("second")).await.unwrap();

        let state = store.read(&session, WorkflowKind::Spec).await.unwrap();
        assert_eq!(state.slug(), "second");
    }

    #[tokio::test]
    async fn test_session_ids_cannot_escape_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("sessions"));
        let absolute = outside.path().to_string_lossy().into_owned();

        for id in ["", ".", "..", "../escape", "a/b", "a\\b", "/etc", absolute.as_str()] {
            let session = SessionId::new(id);
            let err = store.write(&session, &spec_state("feat")).await.unwrap_err();
            assert!(
                matches!(err, crate::domain::errors::DomainError::ValidationFailed(_)),
                "{id:?} should be rejected, got {err:?}"
            );
            assert!(store.read(&session, WorkflowKind::Spec).await.is_none());
        }

        assert_eq!(std::fs::read_dir(outside.path()).unwrap().count(), 0);
        assert!(!dir.path().join("escape").exists());
    }
}
