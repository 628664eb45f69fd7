pub mod tracker;
pub mod types;

pub use tracker::{NoopUsageTracker, SqliteUsageTracker, UsageTracker};
pub use types::{CompactionUsageRecord, ModelPricing, UsageSummary, default_pricing, lookup_pricing};
