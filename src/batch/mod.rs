//! Batch coordination - bounded worker pool over a batch of call records

pub mod coordinator;
mod status;

pub use coordinator::{BatchConfig, BatchCoordinator};
