//! Data models for advertising performance records

use std::ops::AddAssign;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Raw counters read straight from a spreadsheet row
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Counters {
    /// Amount spent in USD
    pub amount_spent: f64,
    pub impressions: u64,
    pub link_clicks: u64,
    pub app_installs: u64,
    pub registrations_completed: u64,
    pub purchases: u64,
}

/// Counts saturate at `u64::MAX` instead of wrapping
impl AddAssign for Counters {
    fn add_assign(&mut self, rhs: Self) {
        self.amount_spent += rhs.amount_spent;
        self.impressions = self.impressions.saturating_add(rhs.impressions);
        self.link_clicks = self.link_clicks.saturating_add(rhs.link_clicks);
        self.app_installs = self.app_installs.saturating_add(rhs.app_installs);
        self.registrations_completed = self
            .registrations_completed
            .saturating_add(rhs.registrations_completed);
        self.purchases = self.purchases.saturating_add(rhs.purchases);
    }
}

/// Ratio and cost metrics derived from [`Counters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedMetrics {
    pub cpm: f64,
    pub click_through_rate: f64,
    pub cost_per_link_click: f64,
    pub cost_per_app_install: f64,
    pub click_to_install: f64,
    pub cost_per_registration: f64,
    pub cost_per_purchase: f64,
    pub install_to_purchase: f64,
}

impl AddAssign for DerivedMetrics {
    fn add_assign(&mut self, rhs: Self) {
        self.cpm += rhs.cpm;
        self.click_through_rate += rhs.click_through_rate;
        self.cost_per_link_click += rhs.cost_per_link_click;
        self.cost_per_app_install += rhs.cost_per_app_install;
        self.click_to_install += rhs.click_to_install;
        self.cost_per_registration += rhs.cost_per_registration;
        self.cost_per_purchase += rhs.cost_per_purchase;
        self.install_to_purchase += rhs.install_to_purchase;
    }
}

/// One row of advertising performance for a (date, campaign, ad set, ad) tuple
///
/// Immutable once built; a cache refresh replaces the whole record set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdRecord {
    /// `{date}-{row index}`; unique within one fetch cycle only
    pub id: String,

    /// Date as written in the sheet (normally `yyyy-MM-dd`)
    pub date: String,

    pub data_source_type_name: String,
    pub campaign_name: String,
    pub ad_set_name: String,
    pub ad_name: String,

    #[serde(flatten)]
    pub counters: Counters,

    #[serde(flatten)]
    pub metrics: DerivedMetrics,
}

impl AdRecord {
    /// Calendar date of the record, if the sheet value is a recognizable date
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        parse_sheet_date(&self.date)
    }
}

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Parse a date cell in any of the layouts the source sheet has been seen to use
pub fn parse_sheet_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    // Datetime cells: keep the date part
    let raw = raw.split(['T', ' ']).next().unwrap_or(raw);
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// Closed interval of calendar dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// An inverted range contains nothing
    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Time bucket granularity for aggregation (the dashboard's "view mode")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Daily,
    #[default]
    Weekly,
    Monthly,
}

impl std::str::FromStr for Granularity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" | "day" => Ok(Self::Daily),
            "weekly" | "week" => Ok(Self::Weekly),
            "monthly" | "month" => Ok(Self::Monthly),
            other => Err(anyhow::anyhow!(
                "unknown view mode '{other}', expected daily, weekly or monthly"
            )),
        }
    }
}

/// Summed numeric fields of every record falling into one time bucket
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedBucket {
    /// Bucket start: the day itself, the Monday of its week, or the 1st of its month
    pub bucket_start: NaiveDate,

    /// Number of records summed into this bucket
    pub record_count: usize,

    /// Dimensions copied from the first record seen for this bucket
    pub data_source_type_name: String,
    pub campaign_name: String,
    pub ad_set_name: String,
    pub ad_name: String,

    #[serde(flatten)]
    pub counters: Counters,

    /// Per-record metrics summed as-is, matching what the charts plot
    #[serde(flatten)]
    pub metrics: DerivedMetrics,
}

/// Totals across a record set
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdDataSummary {
    pub total_records: usize,
    #[serde(flatten)]
    pub totals: Counters,
}

impl AdDataSummary {
    pub fn from_records(records: &[AdRecord]) -> Self {
        let mut totals = Counters::default();
        for record in records {
            totals += record.counters;
        }
        Self {
            total_records: records.len(),
            totals,
        }
    }
}
