pub mod compatible;
pub mod factory;
pub mod heuristic;
pub mod scrub;
pub mod traits;

pub use compatible::OpenAiCompatibleSummarizer;
pub use factory::create_summarizer;
pub use heuristic::HeuristicSummarizer;
pub use traits::{Summarizer, Summary};

use reqwest::Client;
use std::time::Duration;

pub(crate) fn build_client_with_timeout(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .connect_timeout(Duration::from_secs(10))
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
        .unwrap_or_else(|_| Client::new())
}
