use serde::{Deserialize, Serialize};

/// One compaction run as seen by the usage tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactionUsageRecord {
    pub id: String,
    /// Day the run compacted relative to, `YYYY-MM-DD`.
    pub run_date: String,
    pub provider: String,
    pub model: String,
    pub periods_total: u64,
    pub periods_degraded: u64,
    pub periods_failed: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub estimated_cost_micros: Option<i64>,
    pub success: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_estimated_cost_micros: i64,
    pub run_count: u64,
    pub failed_run_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPricing {
    pub model_pattern: String,
    pub input_cost_per_million: f64,
    pub output_cost_per_million: f64,
}

impl ModelPricing {
    fn new(model_pattern: &str, input_cost_per_million: f64, output_cost_per_million: f64) -> Self {
        Self {
            model_pattern: model_pattern.to_string(),
            input_cost_per_million,
            output_cost_per_million,
        }
    }

    #[must_use]
    pub fn estimate_cost_micros(&self, input_tokens: u64, output_tokens: u64) -> i64 {
        let input = i128::from(input_tokens)
            * i128::from(micros_per_million(self.input_cost_per_million));
        let output = i128::from(output_tokens)
            * i128::from(micros_per_million(self.output_cost_per_million));
        i64::try_from((input + output) / 1_000_000).unwrap_or(i64::MAX)
    }
}

fn micros_per_million(cost_per_million: f64) -> i64 {
    let scaled = (cost_per_million * 1_000_000.0).round();
    format!("{scaled:.0}").parse::<i64>().unwrap_or_default()
}

/// Prices for the models commonly used as summarizers. Longer patterns come
/// first so `gpt-4o-mini` does not match the `gpt-4o` row.
#[must_use]
pub fn default_pricing() -> Vec<ModelPricing> {
    vec![
        ModelPricing::new("gpt-4o-mini", 0.15, 0.6),
        ModelPricing::new("gpt-4o", 2.5, 10.0),
        ModelPricing::new("gpt-4.1-mini", 0.4, 1.6),
        ModelPricing::new("gpt-4.1-nano", 0.1, 0.4),
        ModelPricing::new("claude-3-5-haiku", 0.8, 4.0),
        ModelPricing::new("claude-sonnet-4", 3.0, 15.0),
        ModelPricing::new("gemini-2.0-flash", 0.1, 0.4),
    ]
}

#[must_use]
pub fn lookup_pricing<'a>(
    model: &str,
    pricing_table: &'a [ModelPricing],
) -> Option<&'a ModelPricing> {
    pricing_table
        .iter()
        .find(|pricing| model.contains(&pricing.model_pattern))
}
