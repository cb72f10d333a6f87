//! Pipeline metrics. Recorded through the `metrics` facade; exporting them
//! is left to whichever recorder the embedding process installs.

/// Metric names
pub const RUNS_TOTAL: &str = "allet_scraper_runs_total";
pub const SCRAPE_DURATION_SECONDS: &str = "allet_scrape_duration_seconds";
pub const PRODUCTIONS_NEW_TOTAL: &str = "allet_productions_new_total";
pub const PRODUCTIONS_UPDATED_TOTAL: &str = "allet_productions_updated_total";
pub const SHOWS_UPSERTED_TOTAL: &str = "allet_shows_upserted_total";
pub const PERSIST_ERRORS_TOTAL: &str = "allet_persist_errors_total";
pub const SCRAPE_ERRORS_TOTAL: &str = "allet_scrape_errors_total";
pub const FETCH_ERRORS_TOTAL: &str = "allet_fetch_errors_total";

pub struct PipelineMetrics;

impl PipelineMetrics {
    pub fn record_run(source: &str, duration_secs: f64) {
        metrics::counter!(RUNS_TOTAL, "source" => source.to_string()).increment(1);
        metrics::histogram!(SCRAPE_DURATION_SECONDS, "source" => source.to_string())
            .record(duration_secs);
    }

    pub fn record_production_new(source: &str) {
        metrics::counter!(PRODUCTIONS_NEW_TOTAL, "source" => source.to_string()).increment(1);
    }

    pub fn record_production_updated(source: &str) {
        metrics::counter!(PRODUCTIONS_UPDATED_TOTAL, "source" => source.to_string()).increment(1);
    }

    pub fn record_shows(source: &str, count: usize) {
        metrics::counter!(SHOWS_UPSERTED_TOTAL, "source" => source.to_string()).increment(count as u64);
    }

    pub fn record_persist_error(source: &str) {
        metrics::counter!(PERSIST_ERRORS_TOTAL, "source" => source.to_string()).increment(1);
    }

    /// Error entries of one run: fetch, group and persist failures alike
    pub fn record_scrape_errors(source: &str, count: usize) {
        metrics::counter!(SCRAPE_ERRORS_TOTAL, "source" => source.to_string()).increment(count as u64);
    }

    pub fn record_fetch_error() {
        metrics::counter!(FETCH_ERRORS_TOTAL).increment(1);
    }
}
