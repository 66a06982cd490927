//! Implements QuestionStore using a JSON file.
//!
//! File shape: `{"questions": [{"question": ..., "description": ..., "used": bool}]}`.

use crate::domain::{DomainError, Question};
use crate::ports::QuestionStore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

#[derive(Debug, Default, Serialize, Deserialize)]
struct QuestionFile {
    #[serde(default)]
    questions: Vec<Question>,
}

/// JSON file-based question list.
pub struct QuestionJson {
    path: PathBuf,
}

impl QuestionJson {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait::async_trait]
impl QuestionStore for QuestionJson {
    /// A missing file is an empty list. A file that does not parse is an error.
    async fn load(&self) -> Result<Vec<Question>, DomainError> {
        let text = match fs::read_to_string(&self.path).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %self.path.display(), "question file not found, using empty list");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(DomainError::Questions(format!(
                    "read {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };
        let file: QuestionFile = serde_json::from_str(&text)
            .map_err(|e| DomainError::Questions(format!("{}: {}", self.path.display(), e)))?;
        Ok(file.questions)
    }

    /// Write-replace: temp file, sync, rename over the target.
    async fn save(&self, questions: &[Question]) -> Result<(), DomainError> {
        let file = QuestionFile {
            questions: questions.to_vec(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| DomainError::Questions(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| DomainError::Questions(format!("create dir: {}", e)))?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        let mut f = fs::File::create(&temp_path)
            .await
            .map_err(|e| DomainError::Questions(format!("create temp file: {}", e)))?;
        f.write_all(json.as_bytes())
            .await
            .map_err(|e| DomainError::Questions(format!("write temp file: {}", e)))?;
        f.sync_all()
            .await
            .map_err(|e| DomainError::Questions(format!("sync temp file: {}", e)))?;
        drop(f);

        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| DomainError::Questions(format!("atomic rename failed: {}", e)))?;

        debug!(path = %self.path.display(), count = questions.len(), "saved questions");
        Ok(())
    }
}
