//! Label documents on disk.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;

use super::LabelError;

/// Keep letters, digits, `-`, `_` and `.`; force a `.pdf` extension.
pub fn sanitize_file_name(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(name);
    let mut cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        cleaned = "label".to_string();
    }
    if !cleaned.to_ascii_lowercase().ends_with(".pdf") {
        cleaned.push_str(".pdf");
    }
    cleaned
}

/// Directory of stored label PDFs.
#[derive(Debug, Clone)]
pub struct LabelFiles {
    dir: PathBuf,
}

impl LabelFiles {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_of(&self, file_name: &str) -> PathBuf {
        self.dir.join(sanitize_file_name(file_name))
    }

    /// Write `bytes` under `file_name`, replacing any previous content.
    pub async fn write(&self, file_name: &str, bytes: &[u8]) -> Result<u64, LabelError> {
        fs::create_dir_all(&self.dir).await.map_err(|e| {
            LabelError::Storage(format!("Failed to create {}: {}", self.dir.display(), e))
        })?;

        let path = self.path_of(file_name);
        let partial = path.with_extension("pdf.part");
        fs::write(&partial, bytes)
            .await
            .map_err(|e| LabelError::Storage(format!("Failed to write {}: {}", partial.display(), e)))?;
        fs::rename(&partial, &path)
            .await
            .map_err(|e| LabelError::Storage(format!("Failed to move {}: {}", path.display(), e)))?;

        Ok(bytes.len() as u64)
    }

    pub async fn read(&self, file_name: &str) -> Result<Vec<u8>, LabelError> {
        let path = self.path_of(file_name);
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(LabelError::NotFound(file_name.to_string()))
            }
            Err(e) => Err(LabelError::Storage(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Returns false when the file was already gone.
    pub async fn remove(&self, file_name: &str) -> Result<bool, LabelError> {
        let path = self.path_of(file_name);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(LabelError::Storage(format!(
                "Failed to remove {}: {}",
                path.display(),
                e
            ))),
        }
    }
}
