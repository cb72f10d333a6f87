//! opera.hu `alldates` feed: every date with at least one performance.
//!
//! `{ "status": "OK", "data": { "eloadasok": ["2025-09-05", "2025-09-06", ...] } }`

use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use std::collections::BTreeSet;

#[derive(Debug, Deserialize, Default)]
pub struct AllDatesResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub data: AllDatesData,
}

#[derive(Debug, Deserialize, Default)]
pub struct AllDatesData {
    #[serde(default)]
    pub eloadasok: Vec<String>,
}

impl AllDatesResponse {
    /// Distinct `(year, month)` pairs, oldest first. Unparsable dates are dropped.
    pub fn distinct_months(&self) -> Vec<(i32, u32)> {
        distinct_months(&self.data.eloadasok)
    }
}

/// Distinct `(year, month)` pairs of `dates`, oldest first.
pub fn distinct_months<S: AsRef<str>>(dates: &[S]) -> Vec<(i32, u32)> {
    dates
        .iter()
        .filter_map(|d| NaiveDate::parse_from_str(d.as_ref().trim(), "%Y-%m-%d").ok())
        .map(|d| (d.year(), d.month()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Parse the raw feed body. A malformed payload or a status other than `OK`
/// means no active months.
pub fn parse_active_months(json: &str) -> Vec<(i32, u32)> {
    match serde_json::from_str::<AllDatesResponse>(json) {
        Ok(response) if response.status == "OK" => response.distinct_months(),
        Ok(response) => {
            tracing::warn!("alldates feed returned status {:?}", response.status);
            Vec::new()
        }
        Err(e) => {
            tracing::warn!("alldates feed is not valid JSON: {}", e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_months_in_order() {
        let months = distinct_months(&["2025-09-05", "2025-09-06", "2026-01-15"]);
        assert_eq!(months, vec![(2025, 9), (2026, 1)]);
    }

    #[test]
    fn test_extracts_unique_months() {
        let months = distinct_months(&[
            "2025-09-05", "2025-09-06", "2025-09-12", "2025-10-01", "2025-10-03", "2026-01-15",
            "2026-01-20", "2026-02-01",
        ]);
        assert_eq!(months, vec![(2025, 9), (2025, 10), (2026, 1), (2026, 2)]);
    }

    #[test]
    fn test_skips_invalid_dates() {
        let months = distinct_months(&["not-a-date", "2026-02-15", "", "2026-13-01", "2026-03-01"]);
        assert_eq!(months, vec![(2026, 2), (2026, 3)]);
    }

    #[test]
    fn test_sorted_chronologically() {
        let months = distinct_months(&["2026-06-01", "2025-12-01", "2026-01-01"]);
        assert_eq!(months, vec![(2025, 12), (2026, 1), (2026, 6)]);
    }

    #[test]
    fn test_parses_real_feed() {
        let json = r#"{"status": "OK", "data": {"eloadasok": ["2025-09-05", "2025-09-06", "2026-02-15", "2026-08-18"]}}"#;
        assert_eq!(parse_active_months(json), vec![(2025, 9), (2026, 2), (2026, 8)]);
    }

    #[test]
    fn test_empty_or_bad_payloads() {
        assert!(parse_active_months(r#"{"status": "OK", "data": {"eloadasok": []}}"#).is_empty());
        assert!(parse_active_months(r#"{"status": "ERROR", "data": {"eloadasok": ["2026-01-01"]}}"#).is_empty());
        assert!(parse_active_months("<html>maintenance</html>").is_empty());
        assert!(parse_active_months(r#"{"status": "OK"}"#).is_empty());
    }
}
