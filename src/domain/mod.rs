//! Domain types for callpipe
//!
//! - CallRecord: one transcribed call awaiting analysis
//! - AnalysisOutcome: raw output of a single analysis attempt
//! - AnalyzedArtifact: the storage-ready document for one record
//! - RecordStatus / RecordFailure / BatchResult: batch bookkeeping

pub mod outcome;
pub mod record;

pub use outcome::{BatchResult, RecordFailure, RecordStatus};
pub use record::{AnalysisOutcome, AnalyzedArtifact, CallRecord};
