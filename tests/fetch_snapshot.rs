use nepse_today::stock::{ParseError, ScrapeError, StockPriceClient, TableMarker};
use std::time::Duration;

mod common;

fn client_for(addr: std::net::SocketAddr, path: &str) -> StockPriceClient {
    StockPriceClient::new(
        format!("http://{}{}", addr, path),
        TableMarker::default(),
        Duration::from_secs(5),
    )
    .expect("client")
}

#[tokio::test]
async fn returns_one_record_per_data_row_in_order() {
    let rows = vec![
        common::listing_row("NABIL", "250,000,000"),
        common::listing_row("NICA", "120,500,000"),
        common::listing_row("ADBL", "98,000,000"),
    ];
    let addr = common::spawn_price_server(&rows).await;

    let records = client_for(addr, "/today-price").fetch_snapshot().await.unwrap();

    let symbols: Vec<_> = records.iter().map(|r| r.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["NABIL", "NICA", "ADBL"]);
    assert_eq!(records[0].market_capitalization, "250,000,000");
    assert_eq!(records[0].business_date, "c1");
    assert_eq!(records[2].previous_day_close_price, "c11");
}

#[tokio::test]
async fn trims_cell_whitespace_but_keeps_interior_spaces() {
    let addr = common::spawn_price_server(&[common::listing_row(" ABC ", "1,234,567")]).await;

    let records = client_for(addr, "/today-price").fetch_snapshot().await.unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].symbol, "ABC");
    assert_eq!(records[0].market_capitalization, "1,234,567");
}

#[tokio::test]
async fn header_only_table_is_an_empty_success() {
    let addr = common::spawn_price_server(&[]).await;
    let records = client_for(addr, "/today-price").fetch_snapshot().await.unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn http_500_is_a_transport_failure() {
    let addr = common::spawn_price_server(&[]).await;

    let err = client_for(addr, "/broken").fetch_snapshot().await.unwrap_err();

    match err {
        ScrapeError::Transport(e) => assert_eq!(e.status().map(|s| s.as_u16()), Some(500)),
        other => panic!("expected transport failure, got {:?}", other),
    }
}

#[tokio::test]
async fn unreachable_host_is_a_transport_failure() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client_for(addr, "/today-price").fetch_snapshot().await.unwrap_err();
    assert!(matches!(err, ScrapeError::Transport(_)));
}

#[tokio::test]
async fn missing_table_is_a_parse_failure() {
    let addr = common::spawn_price_server(&[]).await;

    let err = client_for(addr, "/no-table").fetch_snapshot().await.unwrap_err();

    assert!(matches!(
        err,
        ScrapeError::Parse(ParseError::TableNotFound { .. })
    ));
}

#[tokio::test]
async fn short_row_fails_the_whole_snapshot() {
    let addr = common::spawn_price_server(&[]).await;

    let err = client_for(addr, "/short").fetch_snapshot().await.unwrap_err();

    match err {
        ScrapeError::Parse(ParseError::MissingCells { row, found, required }) => {
            assert_eq!(row, 0);
            assert_eq!(found, 10);
            assert_eq!(required, 19);
        }
        other => panic!("expected missing cells, got {:?}", other),
    }
}
