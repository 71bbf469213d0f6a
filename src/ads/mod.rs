//! Ad record model and the pure stages of the pipeline
//!
//! - [`normalizer`]: raw sheet rows → [`AdRecord`]s
//! - [`metrics`]: zero-safe derived metrics, memoized
//! - [`aggregator`]: per-day/week/month buckets for charting
//! - [`query`]: filtering, sorting and pagination for record listings

pub mod aggregator;
pub mod metrics;
pub mod models;
pub mod normalizer;
pub mod query;

pub use aggregator::{aggregate, series, SeriesPoint};
pub use metrics::MetricCalculator;
pub use models::{
    AdDataSummary, AdRecord, AggregatedBucket, Counters, DateRange, DerivedMetrics, Granularity,
};
pub use normalizer::{normalize, Normalizer, RawRow};
pub use query::{AdField, ListPage, ListQuery, SortOrder};

/// Fields every record must expose for the dashboard to render it
pub const REQUIRED_FIELDS: [&str; 11] = [
    "date",
    "dataSourceTypeName",
    "campaignName",
    "adSetName",
    "adName",
    "amountSpent",
    "impressions",
    "linkClicks",
    "appInstalls",
    "registrationsCompleted",
    "purchases",
];

/// Check that the record set is non-empty and that its first record carries
/// every field in [`REQUIRED_FIELDS`]
///
/// Returns `false` instead of failing; callers decide whether that is fatal.
pub fn validate_data_structure(records: &[AdRecord]) -> bool {
    let Some(sample) = records.first() else {
        tracing::error!("Data array is empty");
        return false;
    };

    let value = match serde_json::to_value(sample) {
        Ok(value) => value,
        Err(e) => {
            tracing::error!("Sample record could not be inspected: {}", e);
            return false;
        }
    };

    let missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| value.get(field).is_none())
        .collect();

    if !missing.is_empty() {
        tracing::error!("Missing required fields in data: {:?}", missing);
        return false;
    }

    true
}
