pub mod directory;
pub mod ingest;
pub mod stdin;
pub mod traits;

pub use directory::ChannelDirectory;
pub use ingest::run_ingestion;
pub use stdin::StdinTransport;
pub use traits::{ChannelMessage, Transport};
