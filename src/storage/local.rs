//! Local-directory artifact sink.

use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use super::ArtifactSink;
use crate::domain::AnalyzedArtifact;
use crate::error::{CallpipeError, Result};

/// Writes artifacts below a root directory.
#[derive(Debug, Clone)]
pub struct LocalArtifactSink {
    root: PathBuf,
    remove_sources: bool,
}

impl LocalArtifactSink {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            remove_sources: false,
        }
    }

    /// Delete each artifact's source transcript once the artifact is written
    pub fn with_remove_sources(mut self, remove_sources: bool) -> Self {
        self.remove_sources = remove_sources;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Destination paths are relative and may not climb out of the root
    fn resolve(&self, destination: &str) -> Result<PathBuf> {
        let relative = Path::new(destination);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || destination.is_empty() {
            return Err(CallpipeError::Storage(format!(
                "destination {:?} is not a relative path below the output root",
                destination
            )));
        }
        Ok(self.root.join(relative))
    }

    fn remove_source(&self, source_path: &str) -> Result<()> {
        match fs::remove_file(source_path) {
            Ok(()) => {
                tracing::debug!(source = source_path, "Removed source transcript");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!(source = source_path, "Source transcript already gone");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl ArtifactSink for LocalArtifactSink {
    fn persist(&self, artifact: &AnalyzedArtifact) -> Result<PathBuf> {
        let path = self.resolve(&artifact.destination_path)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, &artifact.payload)?;
        tracing::info!(path = %path.display(), tokens_used = artifact.tokens_used, "Saved artifact");

        // Only a written artifact releases its source
        if self.remove_sources {
            self.remove_source(&artifact.source_path).map_err(|e| {
                CallpipeError::Storage(format!(
                    "artifact written to {}, but source {} could not be removed: {}",
                    path.display(),
                    artifact.source_path,
                    e
                ))
            })?;
        }
        Ok(path)
    }
}
