//! Calendar identifiers for tier artifacts.
//!
//! All three identifier shapes sort lexicographically in chronological order,
//! which is what lets the store answer "newest first" with a plain sort.

use chrono::{Datelike, Days, NaiveDate, Weekday};

pub fn date_id(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn parse_date_id(raw: &str) -> Option<NaiveDate> {
    if raw.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// ISO week identifier, `YYYY-Www`, using the ISO week-numbering year.
pub fn week_id(date: NaiveDate) -> String {
    let week = date.iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}

/// Parse `YYYY-Www` into `(iso_year, week)`.
pub fn parse_week_id(raw: &str) -> Option<(i32, u32)> {
    let (year, week) = raw.split_once("-W")?;
    if year.len() != 4 || week.len() != 2 {
        return None;
    }
    let year: i32 = year.parse().ok()?;
    let week: u32 = week.parse().ok()?;
    NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)?;
    Some((year, week))
}

pub fn month_id(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

/// Parse `YYYY-MM` into the first day of that month.
pub fn parse_month_id(raw: &str) -> Option<NaiveDate> {
    if raw.len() != 7 {
        return None;
    }
    NaiveDate::parse_from_str(&format!("{raw}-01"), "%Y-%m-%d").ok()
}

pub fn yesterday(today: NaiveDate) -> NaiveDate {
    today.pred_opt().unwrap_or(today)
}

/// Identifier of the ISO week before the one containing `today`.
pub fn previous_week_id(today: NaiveDate) -> String {
    week_id(today.checked_sub_days(Days::new(7)).unwrap_or(today))
}

/// Monday..Sunday of an ISO week identifier.
pub fn week_dates(week: &str) -> Vec<NaiveDate> {
    let Some((year, number)) = parse_week_id(week) else {
        return Vec::new();
    };
    let Some(monday) = NaiveDate::from_isoywd_opt(year, number, Weekday::Mon) else {
        return Vec::new();
    };
    monday.iter_days().take(7).collect()
}

/// First day of the month before the one containing `today`.
pub fn previous_month_start(today: NaiveDate) -> NaiveDate {
    let first = today.with_day(1).unwrap_or(today);
    let last_of_previous = first.pred_opt().unwrap_or(first);
    last_of_previous.with_day(1).unwrap_or(last_of_previous)
}

/// Whether any day of the ISO week falls inside the month starting at `month_start`.
pub fn week_overlaps_month(week: &str, month_start: NaiveDate) -> bool {
    week_dates(week)
        .iter()
        .any(|d| d.year() == month_start.year() && d.month() == month_start.month())
}
