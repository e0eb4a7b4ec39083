use crate::html;
use chrono::{DateTime, Utc};
use reqwest::{Client, Error as ReqwestError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_SOURCE_URL: &str = "https://nepalstock.com.np/today-price";

// Zero-based <td> offsets of the listing table, in StockRecord field order.
const BUSINESS_DATE: usize = 1;
const SYMBOL: usize = 3;
const OPEN_PRICE: usize = 5;
const HIGH_PRICE: usize = 6;
const LOW_PRICE: usize = 7;
const CLOSE_PRICE: usize = 8;
const PREVIOUS_DAY_CLOSE_PRICE: usize = 11;
const TOTAL_TRADES: usize = 16;
const AVERAGE_TRADED_PRICE: usize = 17;
const MARKET_CAPITALIZATION: usize = 18;

/// Minimum number of cells a data row must have.
pub const REQUIRED_CELLS: usize = MARKET_CAPITALIZATION + 1;

#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("failed to fetch price page: {0}")]
    Transport(#[from] ReqwestError),
    #[error("failed to parse price page: {0}")]
    Parse(#[from] ParseError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("no <table> with classes {classes:?}")]
    TableNotFound { classes: Vec<String> },
    #[error("data row {row} has {found} cells, expected at least {required}")]
    MissingCells {
        row: usize,
        found: usize,
        required: usize,
    },
}

/// One row of the day's price listing. Values are the page's text, trimmed
/// and otherwise untouched: prices keep their thousands separators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    pub business_date: String,
    pub symbol: String,
    pub open_price: String,
    pub high_price: String,
    pub low_price: String,
    pub close_price: String,
    pub previous_day_close_price: String,
    pub total_trades: String,
    pub average_traded_price: String,
    pub market_capitalization: String,
}

impl StockRecord {
    pub const FIELD_NAMES: [&'static str; 10] = [
        "business_date",
        "symbol",
        "open_price",
        "high_price",
        "low_price",
        "close_price",
        "previous_day_close_price",
        "total_trades",
        "average_traded_price",
        "market_capitalization",
    ];

    fn from_cells(row: usize, cells: &[String]) -> Result<Self, ParseError> {
        if cells.len() < REQUIRED_CELLS {
            return Err(ParseError::MissingCells {
                row,
                found: cells.len(),
                required: REQUIRED_CELLS,
            });
        }
        let cell = |idx: usize| cells[idx].trim().to_string();

        Ok(StockRecord {
            business_date: cell(BUSINESS_DATE),
            symbol: cell(SYMBOL),
            open_price: cell(OPEN_PRICE),
            high_price: cell(HIGH_PRICE),
            low_price: cell(LOW_PRICE),
            close_price: cell(CLOSE_PRICE),
            previous_day_close_price: cell(PREVIOUS_DAY_CLOSE_PRICE),
            total_trades: cell(TOTAL_TRADES),
            average_traded_price: cell(AVERAGE_TRADED_PRICE),
            market_capitalization: cell(MARKET_CAPITALIZATION),
        })
    }

    /// Field values in `FIELD_NAMES` order.
    pub fn values(&self) -> [&str; 10] {
        [
            self.business_date.as_str(),
            self.symbol.as_str(),
            self.open_price.as_str(),
            self.high_price.as_str(),
            self.low_price.as_str(),
            self.close_price.as_str(),
            self.previous_day_close_price.as_str(),
            self.total_trades.as_str(),
            self.average_traded_price.as_str(),
            self.market_capitalization.as_str(),
        ]
    }
}

/// One extraction's records, as served by the JSON endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub fetched_at: DateTime<Utc>,
    pub count: usize,
    pub records: Vec<StockRecord>,
}

impl Snapshot {
    pub fn new(records: Vec<StockRecord>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            fetched_at,
            count: records.len(),
            records,
        }
    }
}

/// The class list identifying the listing table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMarker {
    pub classes: Vec<String>,
}

impl TableMarker {
    pub fn new<I, S>(classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            classes: classes.into_iter().map(Into::into).collect(),
        }
    }

    /// Parses a whitespace separated class list, e.g. `"table my-table"`.
    pub fn parse(s: &str) -> Self {
        Self::new(s.split_whitespace())
    }
}

impl Default for TableMarker {
    fn default() -> Self {
        Self::new(["table", "my-table"])
    }
}

/// Extracts every data row of the listing table. The first row is the header.
/// A short row fails the whole page.
pub fn parse_today_price(body: &str, marker: &TableMarker) -> Result<Vec<StockRecord>, ParseError> {
    let rows = html::find_table_rows(body, &marker.classes).ok_or_else(|| ParseError::TableNotFound {
        classes: marker.classes.clone(),
    })?;

    rows.iter()
        .skip(1)
        .enumerate()
        .map(|(row, cells)| StockRecord::from_cells(row, cells))
        .collect()
}

#[derive(Clone)]
pub struct StockPriceClient {
    client: Client,
    url: String,
    marker: TableMarker,
}

impl StockPriceClient {
    pub fn new(url: impl Into<String>, marker: TableMarker, timeout: Duration) -> Result<Self, ScrapeError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(StockPriceClient {
            client,
            url: url.into(),
            marker,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetches the listing page once and parses it. No retries: any transport
    /// error or non-success status is returned as is.
    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn fetch_snapshot(&self) -> Result<Vec<StockRecord>, ScrapeError> {
        debug!("Fetching today's price page");

        let response = self.client.get(&self.url).send().await.map_err(|e| {
            warn!(error = %e, "Price page request failed");
            e
        })?;

        let status = response.status();
        let response = response.error_for_status().map_err(|e| {
            warn!(%status, "Price page responded with error status");
            e
        })?;

        let body = response.text().await?;
        debug!(%status, body_bytes = body.len(), "Received price page");

        let records = parse_today_price(&body, &self.marker).map_err(|e| {
            warn!(error = %e, "Price page did not have the expected structure");
            e
        })?;

        info!(record_count = records.len(), "Parsed today's prices");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_html(cells: &[&str]) -> String {
        let tds: String = cells.iter().map(|c| format!("<td>{}</td>", c)).collect();
        format!("<tr>{}</tr>", tds)
    }

    fn full_row(symbol: &str, market_cap: &str) -> Vec<String> {
        (0..REQUIRED_CELLS)
            .map(|i| match i {
                SYMBOL => symbol.to_string(),
                MARKET_CAPITALIZATION => market_cap.to_string(),
                _ => format!("c{}", i),
            })
            .collect()
    }

    fn page(rows: &[Vec<String>]) -> String {
        let header = row_html(&["#", "Date", "x", "Symbol"]).replace("td>", "th>");
        let body: String = rows
            .iter()
            .map(|r| row_html(&r.iter().map(String::as_str).collect::<Vec<_>>()))
            .collect();
        format!(
            "<html><body><table class=\"table my-table\"><thead>{}</thead><tbody>{}</tbody></table></body></html>",
            header, body
        )
    }

    #[test]
    fn test_parse_example_row() {
        let html = page(&[full_row(" ABC ", "1,234,567")]);
        let records = parse_today_price(&html, &TableMarker::default()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].symbol, "ABC");
        assert_eq!(records[0].market_capitalization, "1,234,567");
        assert_eq!(records[0].business_date, "c1");
        assert_eq!(records[0].open_price, "c5");
        assert_eq!(records[0].high_price, "c6");
        assert_eq!(records[0].low_price, "c7");
        assert_eq!(records[0].close_price, "c8");
        assert_eq!(records[0].previous_day_close_price, "c11");
        assert_eq!(records[0].total_trades, "c16");
        assert_eq!(records[0].average_traded_price, "c17");
    }

    #[test]
    fn test_parse_preserves_row_order() {
        let rows: Vec<_> = ["NABIL", "NICA", "ADBL"].iter().map(|s| full_row(s, "1")).collect();
        let records = parse_today_price(&page(&rows), &TableMarker::default()).unwrap();
        let symbols: Vec<_> = records.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["NABIL", "NICA", "ADBL"]);
    }

    #[test]
    fn test_parse_header_only_is_empty_success() {
        let records = parse_today_price(&page(&[]), &TableMarker::default()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_trim_keeps_interior_whitespace() {
        let html = page(&[full_row("\n   Nabil  Bank \t", "1")]);
        let records = parse_today_price(&html, &TableMarker::default()).unwrap();
        assert_eq!(records[0].symbol, "Nabil  Bank");
    }

    #[test]
    fn test_cells_decode_character_references() {
        let mut row = full_row("A&ndash;B", "1&comma;000");
        row[BUSINESS_DATE] = "x&amp y".to_string();
        let records = parse_today_price(&page(&[row]), &TableMarker::default()).unwrap();
        assert_eq!(records[0].symbol, "A\u{2013}B");
        assert_eq!(records[0].market_capitalization, "1,000");
        assert_eq!(records[0].business_date, "x& y");
    }

    #[test]
    fn test_missing_table() {
        let html = "<table class=\"table\"><tr><td>1</td></tr></table>";
        let err = parse_today_price(html, &TableMarker::default()).unwrap_err();
        assert_eq!(
            err,
            ParseError::TableNotFound {
                classes: vec!["table".to_string(), "my-table".to_string()]
            }
        );
    }

    #[test]
    fn test_short_row_fails_whole_snapshot() {
        let mut short = full_row("BAD", "1");
        short.truncate(REQUIRED_CELLS - 1);
        let html = page(&[full_row("OK", "1"), short, full_row("ALSO", "1")]);
        let err = parse_today_price(&html, &TableMarker::default()).unwrap_err();
        assert_eq!(
            err,
            ParseError::MissingCells {
                row: 1,
                found: REQUIRED_CELLS - 1,
                required: REQUIRED_CELLS
            }
        );
    }

    #[test]
    fn test_custom_marker() {
        let html = page(&[full_row("X", "1")]).replace("table my-table", "prices");
        assert!(parse_today_price(&html, &TableMarker::default()).is_err());
        let records = parse_today_price(&html, &TableMarker::parse("prices")).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_values_follow_field_names() {
        let html = page(&[full_row("ABC", "99")]);
        let record = &parse_today_price(&html, &TableMarker::default()).unwrap()[0];
        let values = record.values();
        assert_eq!(values[1], "ABC");
        assert_eq!(values[9], "99");
        assert_eq!(StockRecord::FIELD_NAMES[1], "symbol");
    }

    #[tokio::test]
    async fn test_client_creation() {
        let client = StockPriceClient::new(DEFAULT_SOURCE_URL, TableMarker::default(), Duration::from_secs(5));
        assert!(client.is_ok());
        assert_eq!(client.unwrap().url(), DEFAULT_SOURCE_URL);
    }
}
