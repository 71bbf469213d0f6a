//! Derived ratio and cost metrics
//!
//! Every function returns 0 when its denominator is not positive, so a derived
//! metric is never NaN or infinite.
//!
//! [`MetricCalculator`] memoizes the four functions by their exact argument
//! pair. Rows sharing a date/campaign repeat the same pairs, so large sheets
//! hit the tables often. Memoization never changes a result.

use dashmap::DashMap;

use crate::ads::models::{Counters, DerivedMetrics};

/// Cost per thousand impressions
pub fn cpm(spend: f64, impressions: f64) -> f64 {
    if impressions > 0.0 {
        finite_or_zero(spend / impressions * 1000.0)
    } else {
        0.0
    }
}

/// Click-through rate as a fraction (0.05 = 5%)
pub fn ctr(clicks: f64, impressions: f64) -> f64 {
    ratio(clicks, impressions)
}

/// Spend divided by any count (clicks, installs, registrations, purchases)
pub fn cost_per_metric(spend: f64, metric: f64) -> f64 {
    ratio(spend, metric)
}

pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        finite_or_zero(numerator / denominator)
    } else {
        0.0
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

type MemoKey = (u64, u64);

fn memo_key(a: f64, b: f64) -> MemoKey {
    (a.to_bits(), b.to_bits())
}

/// One memo table per metric function
struct MemoTable {
    entries: DashMap<MemoKey, f64>,
    max_entries: usize,
}

impl MemoTable {
    fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries,
        }
    }

    fn get_or_compute(&self, a: f64, b: f64, f: fn(f64, f64) -> f64) -> f64 {
        let key = memo_key(a, b);
        if let Some(hit) = self.entries.get(&key) {
            return *hit;
        }

        let value = f(a, b);
        // Full tables stop growing; results are still computed
        if self.entries.len() < self.max_entries {
            self.entries.insert(key, value);
        }
        value
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Memoizing front for the metric functions
pub struct MetricCalculator {
    cpm: MemoTable,
    ctr: MemoTable,
    cost_per_metric: MemoTable,
    ratio: MemoTable,
}

impl MetricCalculator {
    pub fn new(max_entries_per_table: usize) -> Self {
        Self {
            cpm: MemoTable::new(max_entries_per_table),
            ctr: MemoTable::new(max_entries_per_table),
            cost_per_metric: MemoTable::new(max_entries_per_table),
            ratio: MemoTable::new(max_entries_per_table),
        }
    }

    pub fn cpm(&self, spend: f64, impressions: f64) -> f64 {
        self.cpm.get_or_compute(spend, impressions, cpm)
    }

    pub fn ctr(&self, clicks: f64, impressions: f64) -> f64 {
        self.ctr.get_or_compute(clicks, impressions, ctr)
    }

    pub fn cost_per_metric(&self, spend: f64, metric: f64) -> f64 {
        self.cost_per_metric
            .get_or_compute(spend, metric, cost_per_metric)
    }

    pub fn ratio(&self, numerator: f64, denominator: f64) -> f64 {
        self.ratio.get_or_compute(numerator, denominator, ratio)
    }

    /// Compute every derived metric for one set of counters
    pub fn derive(&self, counters: &Counters) -> DerivedMetrics {
        let spend = counters.amount_spent;
        let impressions = counters.impressions as f64;
        let clicks = counters.link_clicks as f64;
        let installs = counters.app_installs as f64;
        let registrations = counters.registrations_completed as f64;
        let purchases = counters.purchases as f64;

        DerivedMetrics {
            cpm: self.cpm(spend, impressions),
            click_through_rate: self.ctr(clicks, impressions),
            cost_per_link_click: self.cost_per_metric(spend, clicks),
            cost_per_app_install: self.cost_per_metric(spend, installs),
            click_to_install: self.ratio(installs, clicks),
            cost_per_registration: self.cost_per_metric(spend, registrations),
            cost_per_purchase: self.cost_per_metric(spend, purchases),
            install_to_purchase: self.ratio(purchases, installs),
        }
    }

    /// Total memoized entries across all tables
    pub fn memoized_entries(&self) -> usize {
        self.cpm.len() + self.ctr.len() + self.cost_per_metric.len() + self.ratio.len()
    }
}

impl Default for MetricCalculator {
    fn default() -> Self {
        Self::new(100_000)
    }
}

/// Derive metrics without memoization
pub fn derive(counters: &Counters) -> DerivedMetrics {
    let spend = counters.amount_spent;
    let impressions = counters.impressions as f64;
    let clicks = counters.link_clicks as f64;
    let installs = counters.app_installs as f64;

    DerivedMetrics {
        cpm: cpm(spend, impressions),
        click_through_rate: ctr(clicks, impressions),
        cost_per_link_click: cost_per_metric(spend, clicks),
        cost_per_app_install: cost_per_metric(spend, installs),
        click_to_install: ratio(installs, clicks),
        cost_per_registration: cost_per_metric(spend, counters.registrations_completed as f64),
        cost_per_purchase: cost_per_metric(spend, counters.purchases as f64),
        install_to_purchase: ratio(counters.purchases as f64, installs),
    }
}
