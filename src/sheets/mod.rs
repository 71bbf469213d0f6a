//! Spreadsheet row source
//!
//! [`client`] talks to the values API; [`fetcher`] walks it page by page.

pub mod client;
pub mod fetcher;

pub use client::{PageSource, SheetsClient, ValueRange};
pub use fetcher::{fetch_all_rows, FetchedRows, SheetWindow};

use crate::config::SheetsConfig;

impl From<&SheetsConfig> for SheetWindow {
    fn from(config: &SheetsConfig) -> Self {
        Self {
            sheet_name: config.sheet_name.clone(),
            first_column: config.first_column.clone(),
            last_column: config.last_column.clone(),
            page_size: config.page_size,
        }
    }
}
