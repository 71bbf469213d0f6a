//! Converts raw sheet rows into typed [`AdRecord`]s
//!
//! The header row is resolved once into a column index. Numeric cells that do
//! not parse become 0 and text cells that are absent become `"unknown"`, so a
//! malformed row never aborts the batch. Only the `Date` column is mandatory.

use tracing::debug;

use crate::ads::metrics::MetricCalculator;
use crate::ads::models::{AdRecord, Counters};
use crate::error::{FetchError, FetchResult};

/// Ordered cells of one sheet row, aligned with the header row
pub type RawRow = Vec<String>;

pub const UNKNOWN: &str = "unknown";

/// Columns the normalizer understands, keyed by their sheet header label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Date,
    DataSourceTypeName,
    CampaignName,
    AdSetName,
    AdName,
    AmountSpent,
    Impressions,
    LinkClicks,
    AppInstalls,
    RegistrationsCompleted,
    Purchases,
}

impl Column {
    pub const ALL: [Column; 11] = [
        Column::Date,
        Column::DataSourceTypeName,
        Column::CampaignName,
        Column::AdSetName,
        Column::AdName,
        Column::AmountSpent,
        Column::Impressions,
        Column::LinkClicks,
        Column::AppInstalls,
        Column::RegistrationsCompleted,
        Column::Purchases,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Column::Date => "Date",
            Column::DataSourceTypeName => "Data Source type name",
            Column::CampaignName => "Campaign Name",
            Column::AdSetName => "Ad Set Name",
            Column::AdName => "Ad Name",
            Column::AmountSpent => "Amount Spent (USD)",
            Column::Impressions => "Impressions",
            Column::LinkClicks => "Link Clicks",
            Column::AppInstalls => "App Installs",
            Column::RegistrationsCompleted => "Registrations Completed",
            Column::Purchases => "Purchases",
        }
    }

    pub const fn is_required(self) -> bool {
        matches!(self, Column::Date)
    }

    const fn slot(self) -> usize {
        self as usize
    }
}

/// Header label → cell position, built once per normalization
#[derive(Debug, Clone)]
pub struct HeaderIndex {
    positions: [Option<usize>; Column::ALL.len()],
}

impl HeaderIndex {
    pub fn from_header(header: &[String]) -> FetchResult<Self> {
        let mut positions = [None; Column::ALL.len()];
        for column in Column::ALL {
            // First occurrence wins when a label is duplicated
            positions[column.slot()] = header
                .iter()
                .position(|label| label.trim() == column.label());
        }

        if let Some(missing) = Column::ALL
            .iter()
            .find(|c| c.is_required() && positions[c.slot()].is_none())
        {
            return Err(FetchError::MissingHeader(missing.label()));
        }

        Ok(Self { positions })
    }

    pub fn position(&self, column: Column) -> Option<usize> {
        self.positions[column.slot()]
    }

    /// Cell for `column` in `row`; absent columns and short rows yield `None`
    fn cell<'r>(&self, row: &'r [String], column: Column) -> Option<&'r str> {
        self.position(column)
            .and_then(|i| row.get(i))
            .map(String::as_str)
            .filter(|cell| !cell.is_empty())
    }

    fn text(&self, row: &[String], column: Column) -> String {
        self.cell(row, column).unwrap_or(UNKNOWN).to_string()
    }
}

/// Parse a decimal cell; anything that is not a finite number reads as 0
pub fn parse_number(raw: &str) -> f64 {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => 0.0,
    }
}

/// Parse a count cell. Fractions truncate toward zero; negative, out of
/// range or unparseable values read as 0.
pub fn parse_count(raw: &str) -> u64 {
    let trimmed = raw.trim();
    if let Ok(value) = trimmed.parse::<u64>() {
        return value;
    }
    let value = parse_number(trimmed);
    if value > 0.0 && value < u64::MAX as f64 {
        value.trunc() as u64
    } else {
        0
    }
}

/// Row-to-record conversion with batch chunking
pub struct Normalizer<'a> {
    calculator: &'a MetricCalculator,
    batch_size: usize,
}

impl<'a> Normalizer<'a> {
    pub fn new(calculator: &'a MetricCalculator, batch_size: usize) -> Self {
        Self {
            calculator,
            batch_size: batch_size.max(1),
        }
    }

    /// Normalize `rows` in input order
    ///
    /// Rows are processed in chunks of `batch_size`; the chunking has no
    /// effect on order or values.
    pub fn normalize(&self, header: &[String], rows: &[RawRow]) -> FetchResult<Vec<AdRecord>> {
        let index = HeaderIndex::from_header(header)?;
        let mut records = Vec::with_capacity(rows.len());

        for (batch_no, batch) in rows.chunks(self.batch_size).enumerate() {
            let offset = batch_no * self.batch_size;
            records.extend(
                batch
                    .iter()
                    .enumerate()
                    .map(|(i, row)| self.record_from_row(&index, row, offset + i)),
            );
            debug!(
                "Normalized batch {} ({} rows, {} total)",
                batch_no,
                batch.len(),
                records.len()
            );
        }

        Ok(records)
    }

    fn record_from_row(&self, index: &HeaderIndex, row: &[String], position: usize) -> AdRecord {
        let count = |column| index.cell(row, column).map(parse_count).unwrap_or(0);

        let counters = Counters {
            amount_spent: index
                .cell(row, Column::AmountSpent)
                .map(parse_number)
                .unwrap_or(0.0),
            impressions: count(Column::Impressions),
            link_clicks: count(Column::LinkClicks),
            app_installs: count(Column::AppInstalls),
            registrations_completed: count(Column::RegistrationsCompleted),
            purchases: count(Column::Purchases),
        };

        let date = index.text(row, Column::Date);

        AdRecord {
            id: format!("{date}-{position}"),
            data_source_type_name: index.text(row, Column::DataSourceTypeName),
            campaign_name: index.text(row, Column::CampaignName),
            ad_set_name: index.text(row, Column::AdSetName),
            ad_name: index.text(row, Column::AdName),
            metrics: self.calculator.derive(&counters),
            counters,
            date,
        }
    }
}

/// Normalize with a throwaway calculator and the default batch size
pub fn normalize(header: &[String], rows: &[RawRow]) -> FetchResult<Vec<AdRecord>> {
    let calculator = MetricCalculator::default();
    Normalizer::new(&calculator, 10_000).normalize(header, rows)
}
