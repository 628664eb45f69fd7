use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use cron::Schedule;
use std::str::FromStr;

pub fn next_run_for(expression: &str, from: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let schedule = parse_schedule(expression)?;
    schedule
        .after(&from)
        .next()
        .ok_or_else(|| anyhow::anyhow!("No future occurrence for expression: {expression}"))
}

/// Accepts 5-field crontab syntax as well as the crate-native 6/7 fields.
pub fn validate_schedule(expression: &str) -> Result<()> {
    parse_schedule(expression).map(|_| ())
}

fn parse_schedule(expression: &str) -> Result<Schedule> {
    let normalized = normalize_expression(expression)?;
    Schedule::from_str(&normalized)
        .with_context(|| format!("Invalid cron expression: {expression}"))
}

fn normalize_expression(expression: &str) -> Result<String> {
    let expression = expression.trim();
    let field_count = expression.split_whitespace().count();

    match field_count {
        // standard crontab syntax: minute hour day month weekday
        5 => Ok(format!("0 {expression}")),
        // crate-native syntax includes seconds (+ optional year)
        6 | 7 => Ok(expression.to_string()),
        _ => anyhow::bail!(
            "Invalid cron expression: {expression} (expected 5, 6, or 7 fields, got {field_count})"
        ),
    }
}
