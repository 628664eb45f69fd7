pub mod schema;

pub use schema::{Config, MemoryConfig, ObservabilityConfig, SummarizerConfig};
