//! Data models shared across the Harbor crates.

mod file;
mod storage;
mod variant;

pub use file::*;
pub use storage::*;
pub use variant::*;
