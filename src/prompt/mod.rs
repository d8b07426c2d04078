//! Prompt System - task prompt templates for the analysis call
//!
//! The task prompt describes the JSON document the model must produce. It is
//! external configuration, loaded from a text file.

mod loader;

pub use loader::{AnalysisPrompt, DEFAULT_SYSTEM_INSTRUCTION, PromptLoader};
