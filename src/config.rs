//! Configuration for callpipe.
//!
//! Loaded from an explicit path, ~/.config/callpipe/callpipe.yml or
//! ./callpipe.yml, in that order. Every section has defaults, so an empty
//! file is a valid config.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::analysis::{AgentRule, AssemblerConfig, ResultAssembler, RetryPolicy, SubstringAgentLookup, UNKNOWN_AGENT};
use crate::batch::BatchConfig;
use crate::error::{CallpipeError, Result};
use crate::llm::{ApiFlavor, OpenAiConfig};
use crate::prompt::DEFAULT_SYSTEM_INSTRUCTION;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default `env_logger` filter, e.g. `info` or `callpipe=debug`
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
    pub llm: LlmConfig,
    pub analysis: AnalysisConfig,
    pub batch: BatchSettings,
    pub output: OutputConfig,
    pub agents: AgentsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            llm: LlmConfig::default(),
            analysis: AnalysisConfig::default(),
            batch: BatchSettings::default(),
            output: OutputConfig::default(),
            agents: AgentsConfig::default(),
        }
    }
}

/// Analysis service endpoint and transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub flavor: ApiFlavor,
    pub endpoint: String,
    /// Deployment name (Azure) or model id
    pub model: String,
    #[serde(rename = "api-version")]
    pub api_version: String,
    /// Environment variable holding the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,
    #[serde(rename = "max-tokens")]
    pub max_tokens: Option<u32>,
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
    #[serde(rename = "max-retries")]
    pub max_retries: u32,
    #[serde(rename = "retry-delay-ms")]
    pub retry_delay_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        let defaults = OpenAiConfig::default();
        Self {
            flavor: defaults.flavor,
            endpoint: String::new(),
            model: defaults.model,
            api_version: defaults.api_version,
            api_key_env: "OPENAI_API_KEY".to_string(),
            max_tokens: None,
            timeout_ms: 120_000,
            max_retries: 3,
            retry_delay_ms: 10_000,
        }
    }
}

impl LlmConfig {
    pub fn to_openai_config(&self) -> OpenAiConfig {
        OpenAiConfig {
            flavor: self.flavor,
            endpoint: self.endpoint.clone(),
            model: self.model.clone(),
            api_version: self.api_version.clone(),
            max_tokens: self.max_tokens,
            timeout: Duration::from_millis(self.timeout_ms),
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

/// Retry-until-valid and prompt settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,
    /// Pause between validity retries; none when unset
    #[serde(rename = "backoff-ms")]
    pub backoff_ms: Option<u64>,
    /// Task prompt template file
    #[serde(rename = "prompt-path")]
    pub prompt_path: PathBuf,
    #[serde(rename = "system-instruction")]
    pub system_instruction: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: None,
            prompt_path: PathBuf::from("prompt.txt"),
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
        }
    }
}

impl AnalysisConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        let policy = RetryPolicy::new(self.max_attempts);
        match self.backoff_ms {
            Some(ms) => policy.with_backoff(Duration::from_millis(ms)),
            None => policy,
        }
    }
}

/// Worker pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    #[serde(rename = "max-workers")]
    pub max_workers: usize,
    #[serde(rename = "deadline-secs")]
    pub deadline_secs: Option<u64>,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            max_workers: 20,
            deadline_secs: None,
        }
    }
}

impl BatchSettings {
    pub fn batch_config(&self) -> BatchConfig {
        let config = BatchConfig::default().with_max_workers(self.max_workers);
        match self.deadline_secs {
            Some(secs) => config.with_deadline(Duration::from_secs(secs)),
            None => config,
        }
    }
}

/// Where artifacts go and what happens to consumed transcripts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Prefix of every artifact's destination path
    #[serde(rename = "save-dir")]
    pub save_dir: String,
    pub suffix: String,
    /// Local directory destination paths are resolved against
    pub root: PathBuf,
    /// Delete each transcript once its artifact is written
    #[serde(rename = "remove-sources")]
    pub remove_sources: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        let defaults = AssemblerConfig::default();
        Self {
            save_dir: defaults.save_dir,
            suffix: defaults.suffix,
            root: PathBuf::from("."),
            remove_sources: false,
        }
    }
}

impl OutputConfig {
    pub fn assembler_config(&self) -> AssemblerConfig {
        AssemblerConfig {
            save_dir: self.save_dir.clone(),
            suffix: self.suffix.clone(),
        }
    }
}

/// Agent-name rules, checked in order against each source path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    pub rules: Vec<AgentRule>,
    #[serde(rename = "default-name")]
    pub default_name: String,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            rules: SubstringAgentLookup::default_rules(),
            default_name: UNKNOWN_AGENT.to_string(),
        }
    }
}

impl AgentsConfig {
    pub fn lookup(&self) -> SubstringAgentLookup {
        SubstringAgentLookup::new(self.rules.clone(), self.default_name.clone())
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let project_name = env!("CARGO_PKG_NAME");

        if let Some(config_dir) = dirs::config_dir() {
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| CallpipeError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;

        log::info!("Loaded config from: {}", path.display());
        Ok(config)
    }

    /// Log filter to use when RUST_LOG is not set
    pub fn log_filter(&self) -> &str {
        match self.log_level.as_deref() {
            Some(level) if !level.trim().is_empty() => level,
            _ => "info",
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.batch.max_workers == 0 {
            return Err(CallpipeError::Config("batch.max-workers must be > 0".to_string()));
        }
        if self.analysis.max_attempts == 0 {
            return Err(CallpipeError::Config("analysis.max-attempts must be > 0".to_string()));
        }
        if self.llm.api_key_env.is_empty() {
            return Err(CallpipeError::Config("llm.api-key-env must not be empty".to_string()));
        }
        if self.output.suffix.is_empty() {
            return Err(CallpipeError::Config("output.suffix must not be empty".to_string()));
        }
        if self.agents.rules.iter().any(|rule| rule.pattern.is_empty()) {
            return Err(CallpipeError::Config("agents.rules patterns must not be empty".to_string()));
        }
        Ok(())
    }

    /// Assembler built from the output and agent sections
    pub fn result_assembler(&self) -> ResultAssembler {
        ResultAssembler::new(self.output.assembler_config(), Arc::new(self.agents.lookup()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AgentLookup;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level.as_deref(), Some("info"));
        assert_eq!(config.batch.max_workers, 20);
        assert_eq!(config.analysis.max_attempts, 3);
        assert_eq!(config.llm.timeout_ms, 120_000);
        assert_eq!(config.llm.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.output.save_dir, "analyzed/");
        assert_eq!(config.output.suffix, ".json");
        assert_eq!(config.agents.default_name, "Unknown");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_yaml() {
        let yaml = r#"
llm:
  flavor: openai
  endpoint: https://api.example.com
  model: gpt-4o
  max-retries: 1
batch:
  max-workers: 8
  deadline-secs: 600
analysis:
  backoff-ms: 250
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.llm.flavor, ApiFlavor::OpenAi);
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.llm.max_retries, 1);
        assert_eq!(config.llm.timeout_ms, 120_000);
        assert_eq!(config.batch.max_workers, 8);
        assert_eq!(config.analysis.max_attempts, 3);

        let batch = config.batch.batch_config();
        assert_eq!(batch.max_workers, 8);
        assert_eq!(batch.deadline, Some(Duration::from_secs(600)));

        let policy = config.analysis.retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.backoff, Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_to_openai_config() {
        let mut config = LlmConfig::default();
        config.endpoint = "https://example.openai.azure.com".to_string();
        config.timeout_ms = 5_000;

        let openai = config.to_openai_config();
        assert_eq!(openai.flavor, ApiFlavor::Azure);
        assert_eq!(openai.timeout, Duration::from_secs(5));
        assert_eq!(openai.retry_delay, Duration::from_secs(10));
        assert!(openai.completions_url().starts_with("https://example.openai.azure.com/openai/deployments/"));
    }

    #[test]
    fn test_agent_rules_from_yaml() {
        let yaml = r#"
agents:
  default-name: Okänt
  rules:
    - pattern: maria
      name: Maria
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let lookup = config.agents.lookup();

        assert_eq!(lookup.agent_name("calls/maria_1.json"), "Maria");
        assert_eq!(lookup.agent_name("calls/linus_1.json"), "Okänt");
    }

    #[test]
    fn test_log_filter() {
        assert_eq!(Config::default().log_filter(), "info");

        let config: Config = serde_yaml::from_str("log-level: callpipe=debug").unwrap();
        assert_eq!(config.log_filter(), "callpipe=debug");

        let mut config = Config::default();
        config.log_level = None;
        assert_eq!(config.log_filter(), "info");
        config.log_level = Some("  ".to_string());
        assert_eq!(config.log_filter(), "info");
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let mut config = Config::default();
        config.batch.max_workers = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max-workers"));
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = Config::default();
        config.analysis.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_explicit_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "output:\n  save-dir: out/\n  remove-sources: true").unwrap();

        let config = Config::load(Some(&file.path().to_path_buf())).unwrap();

        assert_eq!(config.output.save_dir, "out/");
        assert!(config.output.remove_sources);
        assert_eq!(config.output.assembler_config().suffix, ".json");
    }

    #[test]
    fn test_load_explicit_invalid_config_fails() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "batch:\n  max-workers: 0").unwrap();

        assert!(Config::load(Some(&file.path().to_path_buf())).is_err());
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let path = PathBuf::from("/nonexistent/callpipe.yml");
        let err = Config::load(Some(&path)).unwrap_err();
        assert!(matches!(err, CallpipeError::Config(_)));
    }
}
