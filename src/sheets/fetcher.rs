//! Paged retrieval of every row in the sheet
//!
//! Pages are requested strictly in order. The next window starts one row
//! after the last row the server reports having served; paging stops on an
//! empty response or on a page shorter than the window.

use tracing::{debug, info};

use crate::ads::normalizer::RawRow;
use crate::error::{FetchError, FetchResult};
use crate::sheets::client::PageSource;

/// Column window and page size of the sheet being read
#[derive(Debug, Clone)]
pub struct SheetWindow {
    pub sheet_name: Option<String>,
    pub first_column: String,
    pub last_column: String,
    pub page_size: usize,
}

impl Default for SheetWindow {
    fn default() -> Self {
        Self {
            sheet_name: None,
            first_column: "A".to_string(),
            last_column: "K".to_string(),
            page_size: 50_000,
        }
    }
}

impl SheetWindow {
    /// A1 range covering `page_size` rows starting at `first_row` (1-based)
    pub fn range_from(&self, first_row: usize) -> String {
        let last_row = first_row + self.page_size.max(1) - 1;
        let cells = format!(
            "{}{}:{}{}",
            self.first_column, first_row, self.last_column, last_row
        );
        match &self.sheet_name {
            Some(sheet) => format!("{sheet}!{cells}"),
            None => cells,
        }
    }
}

/// Header plus data rows of the whole sheet
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedRows {
    pub header: RawRow,
    pub rows: Vec<RawRow>,
    pub pages: usize,
}

/// Last row number of a served range such as `Sheet1!A1:K50000`
pub fn last_row_of(range: &str) -> Option<usize> {
    let (_, end) = range.rsplit_once(':')?;
    let digits: String = end
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/// Fetch every page of the sheet
///
/// The first row of the first page is the header. Every row of later pages is
/// data. Any failed page fails the whole call.
pub async fn fetch_all_rows(
    source: &dyn PageSource,
    window: &SheetWindow,
) -> FetchResult<FetchedRows> {
    let page_size = window.page_size.max(1);
    let mut range = window.range_from(1);
    let mut fetched = FetchedRows::default();
    let mut header: Option<RawRow> = None;

    loop {
        let page = source.fetch_range(&range).await?;
        let values = match page.values {
            Some(values) if !values.is_empty() => values,
            _ => break,
        };

        fetched.pages += 1;
        let served = values.len();
        debug!("Page {} returned {} rows", fetched.pages, served);

        let mut rows = values.into_iter();
        if header.is_none() {
            header = rows.next();
        }
        fetched.rows.extend(rows);

        if served < page_size {
            break;
        }

        let served_range = page.range.unwrap_or_default();
        let last_row = last_row_of(&served_range).ok_or(FetchError::Range(served_range))?;
        range = window.range_from(last_row + 1);
    }

    // An empty sheet yields an empty header and no rows
    fetched.header = header.unwrap_or_default();

    info!(
        "Total rows fetched: {} ({} pages)",
        fetched.rows.len() + usize::from(!fetched.header.is_empty()),
        fetched.pages
    );

    Ok(fetched)
}
