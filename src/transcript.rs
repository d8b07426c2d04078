//! Build CallRecords from batch-transcription result documents.
//!
//! A result document carries the full transcript in the `display` field of
//! `combinedRecognizedPhrases` (one entry per channel; the last entry is
//! used) and the call length as an ISO-8601 `duration` string.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::domain::CallRecord;
use crate::error::{CallpipeError, Result};

/// Marker in the file name of transcription reports
const REPORT_MARKER: &str = "_report";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranscriptionDocument {
    duration: Option<String>,
    combined_recognized_phrases: Option<Vec<CombinedPhrase>>,
}

#[derive(Debug, Deserialize)]
struct CombinedPhrase {
    display: Option<String>,
}

/// Reports describe the transcription job and hold no transcript
pub fn is_report(path: &str) -> bool {
    path.contains(REPORT_MARKER)
}

/// Parse a transcription result document into a CallRecord.
///
/// An empty `combinedRecognizedPhrases` list yields an empty transcript.
pub fn parse(source_path: &str, content: &str) -> Result<CallRecord> {
    let doc: TranscriptionDocument = serde_json::from_str(content)
        .map_err(|e| CallpipeError::Transcript(format!("{}: {}", source_path, e)))?;

    let phrases = doc.combined_recognized_phrases.ok_or_else(|| {
        CallpipeError::Transcript(format!("{}: missing combinedRecognizedPhrases", source_path))
    })?;

    let text = match phrases.last() {
        Some(phrase) => phrase.display.clone().ok_or_else(|| {
            CallpipeError::Transcript(format!("{}: phrase without display text", source_path))
        })?,
        None => String::new(),
    };

    let duration = doc
        .duration
        .ok_or_else(|| CallpipeError::Transcript(format!("{}: missing duration", source_path)))?;

    Ok(CallRecord::new(text, duration, source_path))
}

/// Read and parse one transcript file
pub fn read(path: &Path) -> Result<CallRecord> {
    let content = fs::read_to_string(path)?;
    let record = parse(&path.to_string_lossy(), &content)?;
    tracing::debug!(source = %record.source_path, duration = %record.call_duration, "Read transcript");
    Ok(record)
}
