mod core;
mod memory;
mod observability;
mod summarizer;

pub use self::core::Config;
pub use memory::MemoryConfig;
pub use observability::ObservabilityConfig;
pub use summarizer::SummarizerConfig;
