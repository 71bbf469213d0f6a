use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::ads::{AdDataSummary, AdRecord, MetricCalculator, Normalizer};
use crate::error::FetchResult;
use crate::provider::AdDataLoader;
use crate::sheets::{fetch_all_rows, PageSource, SheetWindow};

/// Row fetch → normalize → derive metrics, uncached
pub struct SheetsPipeline {
    source: Arc<dyn PageSource>,
    window: SheetWindow,
    calculator: MetricCalculator,
    batch_size: usize,
}

impl SheetsPipeline {
    pub fn new(
        source: Arc<dyn PageSource>,
        window: SheetWindow,
        calculator: MetricCalculator,
        batch_size: usize,
    ) -> Self {
        Self {
            source,
            window,
            calculator,
            batch_size,
        }
    }

    pub fn calculator(&self) -> &MetricCalculator {
        &self.calculator
    }
}

#[async_trait]
impl AdDataLoader for SheetsPipeline {
    async fn load(&self) -> FetchResult<Vec<AdRecord>> {
        let fetched = fetch_all_rows(self.source.as_ref(), &self.window).await?;
        if fetched.header.is_empty() {
            info!("No data fetched");
            return Ok(Vec::new());
        }

        let records =
            Normalizer::new(&self.calculator, self.batch_size).normalize(&fetched.header, &fetched.rows)?;
        log_sample(&records);
        Ok(records)
    }
}

fn log_sample(records: &[AdRecord]) {
    let (Some(first), Some(last)) = (records.first(), records.last()) else {
        info!("No data fetched");
        return;
    };

    let summary = AdDataSummary::from_records(records);
    let totals = summary.totals;
    info!(
        total_records = summary.total_records,
        first_record = %first.id,
        last_record = %last.id,
        total_spend = %format!("{:.2}", totals.amount_spent),
        total_impressions = totals.impressions,
        total_clicks = totals.link_clicks,
        total_installs = totals.app_installs,
        total_registrations = totals.registrations_completed,
        total_purchases = totals.purchases,
        "Sample data"
    );
}
