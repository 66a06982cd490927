//! Static Sharing Weekend tasks, read from a JSON list of task drafts.

use crate::domain::{DomainError, TaskDraft};
use std::path::Path;
use tracing::warn;

/// Load `[{"text": ..., "type": "habit", "notes": ...}, ...]` from `path`.
/// A missing file yields no tasks.
pub async fn load_static_tasks(path: impl AsRef<Path>) -> Result<Vec<TaskDraft>, DomainError> {
    let path = path.as_ref();
    match tokio::fs::read_to_string(path).await {
        Ok(text) => serde_json::from_str(&text).map_err(|e| {
            DomainError::Validation(format!("static task file {}: {}", path.display(), e))
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "static task file not found, adding no static tasks");
            Ok(Vec::new())
        }
        Err(e) => Err(DomainError::Validation(format!(
            "static task file {}: {}",
            path.display(),
            e
        ))),
    }
}
