//! Hand-off of a validated script to persistence.
//!
//! A store never raises: failures come back as [`SaveOutcome::Failed`] so the
//! caller can report them in the response alongside the script it did get.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SaveOutcome {
    Saved { id: String },
    Failed { error: String },
}

#[async_trait]
pub trait ScriptStore: Send + Sync {
    async fn save(&self, script_json: &str) -> SaveOutcome;
}

/// Writes each script to `<dir>/<uuid>.json`.
pub struct FileScriptStore {
    dir: PathBuf,
}

impl FileScriptStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }
}

#[async_trait]
impl ScriptStore for FileScriptStore {
    async fn save(&self, script_json: &str) -> SaveOutcome {
        let id = Uuid::new_v4().to_string();
        let path = self.dir.join(format!("{}.json", id));

        if let Err(e) = tokio::fs::create_dir_all(&self.dir).await {
            warn!(dir = %self.dir.display(), error = %e, "cannot create script directory");
            return SaveOutcome::Failed {
                error: format!("cannot create {}: {}", self.dir.display(), e),
            };
        }

        match tokio::fs::write(&path, script_json).await {
            Ok(()) => {
                debug!(path = %path.display(), "script saved");
                SaveOutcome::Saved { id }
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "script save failed");
                SaveOutcome::Failed {
                    error: format!("cannot write {}: {}", path.display(), e),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn saved_script_lands_under_its_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileScriptStore::new(dir.path().join("scripts"));

        let outcome = store.save(r#"{"title":"T"}"#).await;
        let id = match outcome {
            SaveOutcome::Saved { id } => id,
            other => panic!("unexpected outcome: {other:?}"),
        };

        let written = std::fs::read_to_string(store.dir().join(format!("{id}.json"))).unwrap();
        assert_eq!(written, r#"{"title":"T"}"#);
    }

    #[tokio::test]
    async fn unwritable_location_reports_failure() {
        let file = tempfile::NamedTempFile::new().unwrap();
        // A regular file cannot act as the parent directory.
        let store = FileScriptStore::new(file.path().join("nested"));

        match store.save("{}").await {
            SaveOutcome::Failed { error } => assert!(error.starts_with("cannot create")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let json = serde_json::to_value(SaveOutcome::Saved { id: "abc".into() }).unwrap();
        assert_eq!(json["status"], "saved");
        assert_eq!(json["id"], "abc");
    }
}
