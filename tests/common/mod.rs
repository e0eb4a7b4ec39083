#![allow(dead_code)]

use axum::{Router, http::StatusCode, response::Html, routing::get};
use nepse_today::config::AppConfig;
use nepse_today::db::{connection, migrate};
use nepse_today::state::AppState;
use std::net::SocketAddr;
use tempfile::TempDir;

/// Number of <td> cells in a listing row on the live page.
pub const CELLS_PER_ROW: usize = 21;

pub struct TestDb {
    _dir: TempDir, // keep alive for the life of the test
    pub path: String,
}

pub fn setup_db() -> (TestDb, connection::DbPool) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("test.db").to_string_lossy().to_string();
    migrate::run(&path).expect("migrations");
    let pool = connection::build_pool(&path).expect("pool");
    (TestDb { _dir: dir, path }, pool)
}

/// A listing row: offset 3 holds the symbol, offset 18 the market cap, the
/// other offsets hold `c<offset>`.
pub fn listing_row(symbol: &str, market_cap: &str) -> Vec<String> {
    (0..CELLS_PER_ROW)
        .map(|i| match i {
            3 => symbol.to_string(),
            18 => market_cap.to_string(),
            _ => format!("c{}", i),
        })
        .collect()
}

pub fn listing_page(rows: &[Vec<String>]) -> String {
    let mut html = String::from(
        "<!DOCTYPE html><html><head><title>Today's Price</title></head><body>\
         <table class=\"table my-table\"><thead><tr><th>S.N.</th><th>Business Date</th><th>Symbol</th></tr></thead><tbody>",
    );
    for row in rows {
        html.push_str("<tr>");
        for cell in row {
            html.push_str(&format!("<td>\n    {}\n  </td>", cell));
        }
        html.push_str("</tr>");
    }
    html.push_str("</tbody></table></body></html>");
    html
}

/// Serves `/today-price` with `page`, `/broken` with a 500, `/no-table`
/// without the listing table, and `/short` with a truncated row.
pub fn price_router(page: String) -> Router {
    let short = listing_page(&[{
        let mut row = listing_row("SHORT", "1");
        row.truncate(10);
        row
    }]);
    Router::new()
        .route("/today-price", get(move || async move { Html(page) }))
        .route(
            "/broken",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded") }),
        )
        .route(
            "/no-table",
            get(|| async { Html("<html><body><p>Market closed</p></body></html>") }),
        )
        .route("/short", get(move || async move { Html(short) }))
}

pub async fn spawn_server(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });
    addr
}

pub async fn spawn_price_server(rows: &[Vec<String>]) -> SocketAddr {
    spawn_server(price_router(listing_page(rows))).await
}

/// Application state wired to a local price server path and a fresh database.
pub fn test_state(source_url: String, pool: connection::DbPool) -> AppState {
    let config = AppConfig::from_lookup(|key| match key {
        "SOURCE_URL" => Some(source_url.clone()),
        "REQUEST_TIMEOUT" => Some("5".to_string()),
        "DISPLAY_TIMEZONE" => Some("UTC".to_string()),
        _ => None,
    })
    .expect("config");
    AppState::new(config, pool).expect("state")
}
