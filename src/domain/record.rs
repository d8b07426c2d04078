//! Records flowing through the analysis pipeline.

use serde::{Deserialize, Serialize};

/// One transcribed call. Read-only once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRecord {
    pub transcribed_text: String,
    /// Duration as reported by the transcription service (e.g. `PT1M2.5S`)
    pub call_duration: String,
    pub source_path: String,
}

impl CallRecord {
    pub fn new(
        transcribed_text: impl Into<String>,
        call_duration: impl Into<String>,
        source_path: impl Into<String>,
    ) -> Self {
        Self {
            transcribed_text: transcribed_text.into(),
            call_duration: call_duration.into(),
            source_path: source_path.into(),
        }
    }

    /// File name of the source, without directories
    pub fn file_name(&self) -> &str {
        self.source_path.rsplit('/').next().unwrap_or(&self.source_path)
    }
}

/// Output of one call to the analysis service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub raw_text: String,
    pub tokens_used: u64,
}

impl AnalysisOutcome {
    pub fn new(raw_text: impl Into<String>, tokens_used: u64) -> Self {
        Self {
            raw_text: raw_text.into(),
            tokens_used,
        }
    }
}

/// Final document for one successfully analyzed record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzedArtifact {
    pub destination_path: String,
    pub payload: String,
    /// Source the artifact was built from, so callers can clean it up
    pub source_path: String,
    pub tokens_used: u64,
}
