//! File serving: variant → fallback → original.

mod resolver;
mod types;

pub use resolver::FileServingResolver;
pub use types::{ServeKind, ServedFile, ServingError, ServingTarget};
