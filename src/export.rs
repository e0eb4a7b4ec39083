use crate::stock::StockRecord;

/// Renders records as CSV with a header row of field names.
/// The header is written even when there are no records.
pub fn to_csv(records: &[StockRecord]) -> Result<Vec<u8>, csv::Error> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(StockRecord::FIELD_NAMES)?;
    for record in records {
        wtr.write_record(record.values())?;
    }
    wtr.into_inner().map_err(|e| e.into_error().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(symbol: &str, market_cap: &str) -> StockRecord {
        StockRecord {
            business_date: "2024-06-02".into(),
            symbol: symbol.into(),
            open_price: "500".into(),
            high_price: "510".into(),
            low_price: "495".into(),
            close_price: "505".into(),
            previous_day_close_price: "499".into(),
            total_trades: "87".into(),
            average_traded_price: "503.2".into(),
            market_capitalization: market_cap.into(),
        }
    }

    #[test]
    fn test_header_only_when_empty() {
        let out = String::from_utf8(to_csv(&[]).unwrap()).unwrap();
        assert_eq!(
            out,
            "business_date,symbol,open_price,high_price,low_price,close_price,previous_day_close_price,total_trades,average_traded_price,market_capitalization\n"
        );
    }

    #[test]
    fn test_values_with_commas_are_quoted() {
        let out = String::from_utf8(to_csv(&[record("NABIL", "1,234,567")]).unwrap()).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "2024-06-02,NABIL,500,510,495,505,499,87,503.2,\"1,234,567\"");
    }
}
