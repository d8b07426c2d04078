//! LLM Client Layer - chat-completion transport for call analysis
//!
//! This module provides:
//! - Message types for chat-completion requests
//! - LlmClient trait for API abstraction
//! - MockLlmClient for scripted tests
//! - OpenAiClient for OpenAI / Azure OpenAI endpoints

pub mod client;
pub mod openai;
pub mod types;

pub use client::{LlmClient, MockLlmClient};
pub use openai::{ApiFlavor, OpenAiClient, OpenAiConfig};
pub use types::{CompletionRequest, CompletionResponse, Message, Role, Usage};
