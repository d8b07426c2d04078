//! callpipe - bounded-concurrency LLM analysis of transcribed calls
//!
//! A batch of call transcripts is fanned out over a fixed pool of workers.
//! Each worker asks an analysis service for a JSON verdict, retries until
//! the output is a well-formed JSON object, and enriches it with call
//! metadata. Every record ends either as an artifact or as a reported
//! failure; one bad record never sinks the rest of the batch.

pub mod analysis;
pub mod batch;
pub mod config;
pub mod domain;
pub mod error;
pub mod llm;
pub mod prompt;
pub mod storage;
pub mod transcript;

pub use error::{CallpipeError, Result};
