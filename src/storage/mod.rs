//! Artifact persistence for the command-line caller.
//!
//! The analysis core never touches the filesystem; it hands back
//! `(destination_path, payload)` pairs and an `ArtifactSink` decides where
//! they end up.

mod local;

use std::path::PathBuf;

use crate::domain::AnalyzedArtifact;
use crate::error::{CallpipeError, Result};

pub use local::LocalArtifactSink;

/// An artifact that could not be fully persisted
#[derive(Debug)]
pub struct PersistFailure {
    pub destination_path: String,
    pub error: CallpipeError,
}

impl std::fmt::Display for PersistFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.destination_path, self.error)
    }
}

/// Outcome of persisting a set of artifacts
#[derive(Debug, Default)]
pub struct PersistReport {
    pub saved: Vec<PathBuf>,
    pub failures: Vec<PersistFailure>,
}

impl PersistReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Somewhere analyzed artifacts can be written.
pub trait ArtifactSink: Send + Sync {
    /// Persist one artifact, returning where it was written.
    fn persist(&self, artifact: &AnalyzedArtifact) -> Result<PathBuf>;

    /// Persist every artifact; one failure never stops the rest.
    fn persist_all(&self, artifacts: &[AnalyzedArtifact]) -> PersistReport {
        let mut report = PersistReport::default();
        for artifact in artifacts {
            match self.persist(artifact) {
                Ok(path) => report.saved.push(path),
                Err(error) => {
                    tracing::error!(destination = %artifact.destination_path, error = %error, "Failed to persist artifact");
                    report.failures.push(PersistFailure {
                        destination_path: artifact.destination_path.clone(),
                        error,
                    });
                }
            }
        }
        report
    }
}
