//! Persona text read from markdown files on disk.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::PersonaSource;

pub const DEFAULT_PERSONA: &str = "You are Cadence, an assistant that carries out scheduled and \
triggered tasks for the user. Answer with the result of the task only, concisely and accurately.";

/// Concatenates every `*.md` file in a directory, in file-name order.
/// Falls back to [`DEFAULT_PERSONA`] when the directory is missing or empty.
#[derive(Debug, Clone)]
pub struct FilePersonaSource {
    dir: PathBuf,
}

impl FilePersonaSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl PersonaSource for FilePersonaSource {
    async fn system_prompt(&self) -> DomainResult<String> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(DEFAULT_PERSONA.to_string());
            }
            Err(e) => {
                return Err(DomainError::ExecutionFailed(format!(
                    "cannot read persona directory: {e}"
                )));
            }
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| {
                DomainError::ExecutionFailed(format!("cannot read persona directory: {e}"))
            })?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "md") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut parts = Vec::with_capacity(paths.len());
        for path in paths {
            let text = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| {
                    DomainError::ExecutionFailed(format!("cannot read {}: {e}", path.display()))
                })?;
            if !text.trim().is_empty() {
                parts.push(text.trim().to_string());
            }
        }

        if parts.is_empty() {
            Ok(DEFAULT_PERSONA.to_string())
        } else {
            Ok(parts.join("\n\n"))
        }
    }
}
