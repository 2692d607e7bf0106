//! Harbor database layer
//!
//! PostgreSQL persistence for file records. The variant pipeline only ever
//! writes variant pointers through [`FileRecordRepository`].

pub mod files;
pub mod setup;

pub use files::FileRecordRepository;
pub use setup::{setup_database, MIGRATOR};
