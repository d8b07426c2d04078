//! Prompt Loader - load and cache prompt templates from files

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::{CallpipeError, Result};

/// Instruction sent ahead of the task prompt on every request
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "Before continuing, REMOVE OLD CACHE.";

/// The two system messages that precede the transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisPrompt {
    pub system_instruction: String,
    pub task_prompt: String,
}

impl AnalysisPrompt {
    pub fn new(task_prompt: impl Into<String>) -> Self {
        Self {
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            task_prompt: task_prompt.into(),
        }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = instruction.into();
        self
    }
}

/// Loads and caches prompt templates
pub struct PromptLoader {
    /// Directory relative paths are resolved against
    base_dir: PathBuf,
    cache: RwLock<HashMap<PathBuf, String>>,
}

impl PromptLoader {
    /// Create a new PromptLoader resolving relative paths against `base_dir`
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Load a template from disk and cache it
    pub fn load(&self, path: impl AsRef<Path>) -> Result<String> {
        let path = self.resolve(path.as_ref());

        // Check cache first
        {
            let cache = self
                .cache
                .read()
                .map_err(|e| CallpipeError::Prompt(format!("Failed to acquire read lock: {}", e)))?;
            if let Some(content) = cache.get(&path) {
                return Ok(content.clone());
            }
        }

        let content = std::fs::read_to_string(&path).map_err(|e| {
            CallpipeError::Prompt(format!("Failed to load prompt from {}: {}", path.display(), e))
        })?;

        if content.trim().is_empty() {
            return Err(CallpipeError::Prompt(format!(
                "Prompt file {} is empty",
                path.display()
            )));
        }

        {
            let mut cache = self
                .cache
                .write()
                .map_err(|e| CallpipeError::Prompt(format!("Failed to acquire write lock: {}", e)))?;
            cache.insert(path, content.clone());
        }

        Ok(content)
    }

    /// Load the task prompt and pair it with a system instruction
    pub fn load_analysis_prompt(
        &self,
        path: impl AsRef<Path>,
        system_instruction: &str,
    ) -> Result<AnalysisPrompt> {
        let task_prompt = self.load(path)?;
        Ok(AnalysisPrompt::new(task_prompt).with_system_instruction(system_instruction))
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}
