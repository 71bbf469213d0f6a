//! Period aggregation of ad records for charting
//!
//! Records are filtered to an inclusive date range, mapped to a bucket key
//! (day, ISO week start or month start), and summed per bucket. Buckets come
//! out in ascending order. Empty periods are not synthesized.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use crate::ads::metrics;
use crate::ads::models::{
    AdRecord, AggregatedBucket, DateRange, DerivedMetrics, Granularity,
};
use crate::ads::query::AdField;

/// Start of the bucket containing `date`
pub fn bucket_start(date: NaiveDate, granularity: Granularity) -> NaiveDate {
    match granularity {
        Granularity::Daily => date,
        Granularity::Weekly => start_of_week(date),
        Granularity::Monthly => date.with_day(1).unwrap_or(date),
    }
}

/// Monday of the ISO week containing `date`
pub fn start_of_week(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Sum records falling inside `range` into per-period buckets
///
/// An inverted range (`start > end`) yields no buckets. Records whose date
/// cell is not a recognizable date are skipped.
pub fn aggregate(
    records: &[AdRecord],
    range: &DateRange,
    granularity: Granularity,
) -> Vec<AggregatedBucket> {
    if range.is_empty() {
        return Vec::new();
    }

    let mut buckets: BTreeMap<NaiveDate, AggregatedBucket> = BTreeMap::new();

    for record in records {
        let Some(date) = record.parsed_date() else {
            continue;
        };
        if !range.contains(date) {
            continue;
        }

        let key = bucket_start(date, granularity);
        buckets
            .entry(key)
            .and_modify(|bucket| {
                bucket.record_count += 1;
                bucket.counters += record.counters;
                bucket.metrics += record.metrics;
            })
            .or_insert_with(|| AggregatedBucket {
                bucket_start: key,
                record_count: 1,
                data_source_type_name: record.data_source_type_name.clone(),
                campaign_name: record.campaign_name.clone(),
                ad_set_name: record.ad_set_name.clone(),
                ad_name: record.ad_name.clone(),
                counters: record.counters,
                metrics: record.metrics,
            });
    }

    buckets.into_values().collect()
}

impl AggregatedBucket {
    /// Metrics recomputed from the bucket's summed counters
    ///
    /// Unlike [`AggregatedBucket::metrics`], these are true period ratios.
    pub fn recomputed_metrics(&self) -> DerivedMetrics {
        metrics::derive(&self.counters)
    }

    /// Value of one numeric field in this bucket
    pub fn value(&self, field: AdField) -> Option<f64> {
        let c = &self.counters;
        let m = &self.metrics;
        let value = match field {
            AdField::AmountSpent => c.amount_spent,
            AdField::Impressions => c.impressions as f64,
            AdField::LinkClicks => c.link_clicks as f64,
            AdField::AppInstalls => c.app_installs as f64,
            AdField::RegistrationsCompleted => c.registrations_completed as f64,
            AdField::Purchases => c.purchases as f64,
            AdField::Cpm => m.cpm,
            AdField::ClickThroughRate => m.click_through_rate,
            AdField::CostPerLinkClick => m.cost_per_link_click,
            AdField::CostPerAppInstall => m.cost_per_app_install,
            AdField::ClickToInstall => m.click_to_install,
            AdField::CostPerRegistration => m.cost_per_registration,
            AdField::CostPerPurchase => m.cost_per_purchase,
            AdField::InstallToPurchase => m.install_to_purchase,
            _ => return None,
        };
        Some(value)
    }
}

/// One chart point
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub bucket: NaiveDate,
    pub value: f64,
}

/// Project aggregated buckets onto a single numeric metric
///
/// Returns `None` when `metric` is not a numeric field.
pub fn series(buckets: &[AggregatedBucket], metric: AdField) -> Option<Vec<SeriesPoint>> {
    if !metric.is_numeric() {
        return None;
    }
    buckets
        .iter()
        .map(|bucket| {
            bucket.value(metric).map(|value| SeriesPoint {
                bucket: bucket.bucket_start,
                value,
            })
        })
        .collect()
}

/// Range covering the last four weeks: from the start of the week three
/// weeks before the one containing `today`, through `today`
pub fn default_dashboard_range(today: NaiveDate) -> DateRange {
    let start = start_of_week(today - Duration::weeks(3));
    DateRange::new(start, today)
}
