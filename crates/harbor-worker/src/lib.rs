//! Batch variant generation.
//!
//! The one parallel region in Harbor: a small bounded pool of workers that
//! runs the per-file variant pipeline over a batch of records.

pub mod batch;

pub use batch::{BatchCoordinator, BatchSummary, DEFAULT_MAX_WORKERS, MAX_WORKERS};
