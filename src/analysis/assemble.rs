//! Turn a validated analysis into a storage-ready artifact.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::analysis::agent::{AgentLookup, SubstringAgentLookup};
use crate::domain::{AnalysisOutcome, AnalyzedArtifact, CallRecord};
use crate::error::AssembleError;

/// Where artifacts are addressed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblerConfig {
    /// Prefix for every destination path
    pub save_dir: String,
    /// Appended to the source file stem
    pub suffix: String,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            save_dir: "analyzed/".to_string(),
            suffix: ".json".to_string(),
        }
    }
}

/// Merges analysis output with record metadata.
pub struct ResultAssembler {
    config: AssemblerConfig,
    agents: Arc<dyn AgentLookup>,
}

impl ResultAssembler {
    pub fn new(config: AssemblerConfig, agents: Arc<dyn AgentLookup>) -> Self {
        Self { config, agents }
    }

    /// Build the artifact for one record.
    ///
    /// The model's keys keep their order; `FileLength`, `TokensUsed` and
    /// `AgentName` follow them.
    pub fn assemble(
        &self,
        outcome: &AnalysisOutcome,
        record: &CallRecord,
    ) -> Result<AnalyzedArtifact, AssembleError> {
        let mut document = match serde_json::from_str::<Value>(&outcome.raw_text)? {
            Value::Object(map) => map,
            other => return Err(AssembleError::NotAnObject(other.to_string())),
        };

        self.enrich(&mut document, outcome, record);
        let payload = serde_json::to_string_pretty(&Value::Object(document))?;

        Ok(AnalyzedArtifact {
            destination_path: self.destination_path(&record.source_path),
            payload,
            source_path: record.source_path.clone(),
            tokens_used: outcome.tokens_used,
        })
    }

    fn enrich(&self, document: &mut Map<String, Value>, outcome: &AnalysisOutcome, record: &CallRecord) {
        document.insert("FileLength".to_string(), Value::from(record.call_duration.clone()));
        document.insert("TokensUsed".to_string(), Value::from(outcome.tokens_used));
        document.insert(
            "AgentName".to_string(),
            Value::from(self.agents.agent_name(&record.source_path)),
        );
    }

    /// `save_dir` + file stem of the source + `suffix`
    pub fn destination_path(&self, source_path: &str) -> String {
        let mut path = self.config.save_dir.clone();
        if !path.is_empty() && !path.ends_with('/') {
            path.push('/');
        }
        path.push_str(file_stem(source_path));
        path.push_str(&self.config.suffix);
        path
    }
}

impl Default for ResultAssembler {
    fn default() -> Self {
        Self::new(AssemblerConfig::default(), Arc::new(SubstringAgentLookup::default()))
    }
}

/// Directory and every extension removed: `a/b/call.wav.json` -> `call`
fn file_stem(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.split('.').next().unwrap_or(name)
}
