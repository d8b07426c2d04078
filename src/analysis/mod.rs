//! Analysis core - from one CallRecord to one AnalyzedArtifact
//!
//! - `validity`: is the model output a well-formed JSON object?
//! - `client`: the external analysis call (AnalysisClient)
//! - `retry`: retry-until-valid loop (RetryingAnalyzer)
//! - `agent`: agent-name policy keyed on the source path
//! - `assemble`: merge validated output with record metadata (ResultAssembler)

pub mod agent;
pub mod assemble;
pub mod client;
pub mod retry;
pub mod validity;

pub use agent::{AgentLookup, AgentRule, SubstringAgentLookup, UNKNOWN_AGENT};
pub use assemble::{AssemblerConfig, ResultAssembler};
pub use client::{AnalysisClient, LlmAnalysisClient};
pub use retry::{RetryPolicy, RetryingAnalyzer, ValidityFn};
pub use validity::is_valid;
