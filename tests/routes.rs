use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use nepse_today::api;
use nepse_today::state::AppState;
use tower::ServiceExt;

mod common;

async fn send(state: &AppState, request: Request<Body>) -> Response {
    api::router(state.clone()).oneshot(request).await.unwrap()
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn post_form(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn flash_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("flash="))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

async fn state_for(path: &str) -> (common::TestDb, AppState) {
    let addr = common::spawn_price_server(&[
        common::listing_row("NABIL", "250,000,000"),
        common::listing_row("ADBL", "98,000,000"),
    ])
    .await;
    let (db, pool) = common::setup_db();
    (db, common::test_state(format!("http://{}{}", addr, path), pool))
}

#[tokio::test]
async fn home_renders_records() {
    let (_db, state) = state_for("/today-price").await;

    let response = send(&state, get("/", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;

    assert!(html.contains("<td>NABIL</td>"));
    assert!(html.contains("<td>250,000,000</td>"));
    assert!(html.find("<td>NABIL</td>").unwrap() < html.find("<td>ADBL</td>").unwrap());
}

#[tokio::test]
async fn home_renders_error_page_when_upstream_fails() {
    let (_db, state) = state_for("/broken").await;

    let response = send(&state, get("/", None)).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let html = body_text(response).await;

    assert!(html.contains("Failed to retrieve stock data"));
    assert!(!html.contains("<td>"));
}

#[tokio::test]
async fn home_renders_error_page_when_table_missing() {
    let (_db, state) = state_for("/no-table").await;
    let response = send(&state, get("/", None)).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn json_snapshot() {
    let (_db, state) = state_for("/today-price").await;

    let response = send(&state, get("/api/today-price", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();

    assert_eq!(json["count"], 2);
    assert_eq!(json["records"][0]["symbol"], "NABIL");
    assert_eq!(json["records"][1]["market_capitalization"], "98,000,000");
    assert!(json["fetched_at"].is_string());
}

#[tokio::test]
async fn json_snapshot_failure_is_generic() {
    let (_db, state) = state_for("/short").await;

    let response = send(&state, get("/api/today-price", None)).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["error"], "Failed to retrieve stock data");
}

#[tokio::test]
async fn csv_export() {
    let (_db, state) = state_for("/today-price").await;

    let response = send(&state, get("/today-price.csv", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/csv; charset=utf-8"
    );
    let csv = body_text(response).await;
    let lines: Vec<_> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("business_date,symbol,"));
    assert!(lines[1].contains(",NABIL,"));
}

#[tokio::test]
async fn register_redirects_to_login_with_flash() {
    let (_db, state) = state_for("/today-price").await;

    let response = send(&state, post_form("/register", "username=sita&password=pokhara")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/login");
    let cookie = flash_cookie(&response).expect("flash cookie");

    let login_page = body_text(send(&state, get("/login", Some(&cookie))).await).await;
    assert!(login_page.contains("Your account has been created!"));

    let without_cookie = body_text(send(&state, get("/login", None)).await).await;
    assert!(!without_cookie.contains("Your account has been created!"));
}

#[tokio::test]
async fn tampered_flash_cookie_is_ignored() {
    let (_db, state) = state_for("/today-price").await;

    let page = body_text(send(&state, get("/login", Some("flash=account-created"))).await).await;
    assert!(!page.contains("Your account has been created!"));
}

#[tokio::test]
async fn register_validation_errors_rerender_form() {
    let (_db, state) = state_for("/today-price").await;

    let response = send(&state, post_form("/register", "username=a&password=")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Field must be between 2 and 20 characters long."));
    assert!(html.contains("This field is required."));
}

#[tokio::test]
async fn register_duplicate_username() {
    let (_db, state) = state_for("/today-price").await;

    let first = send(&state, post_form("/register", "username=hari&password=one")).await;
    assert_eq!(first.status(), StatusCode::SEE_OTHER);

    let second = send(&state, post_form("/register", "username=hari&password=two")).await;
    assert_eq!(second.status(), StatusCode::OK);
    assert!(body_text(second).await.contains("That username is already taken."));
}

#[tokio::test]
async fn login_success_redirects_home() {
    let (_db, state) = state_for("/today-price").await;
    send(&state, post_form("/register", "username=gita&password=secret")).await;

    let response = send(&state, post_form("/login", "username=gita&password=secret")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");
    let cookie = flash_cookie(&response).expect("flash cookie");

    let home = body_text(send(&state, get("/", Some(&cookie))).await).await;
    assert!(home.contains("Login successful!"));
    assert!(home.contains("<td>NABIL</td>"));
}

#[tokio::test]
async fn login_failure_stays_on_form() {
    let (_db, state) = state_for("/today-price").await;
    send(&state, post_form("/register", "username=gita&password=secret")).await;

    let response = send(&state, post_form("/login", "username=gita&password=wrong")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Login unsuccessful. Please check your username and password."));
    assert!(html.contains("alert-danger"));
}

#[tokio::test]
async fn flash_survives_failed_home_page() {
    let (_db, state) = state_for("/broken").await;
    send(&state, post_form("/register", "username=gita&password=secret")).await;

    let login = send(&state, post_form("/login", "username=gita&password=secret")).await;
    let cookie = flash_cookie(&login).expect("flash cookie");

    let home = send(&state, get("/", Some(&cookie))).await;
    assert_eq!(home.status(), StatusCode::BAD_GATEWAY);
    assert!(flash_cookie(&home).is_none(), "flash cookie must not be cleared");
    assert!(!body_text(home).await.contains("Login successful!"));

    let next = body_text(send(&state, get("/login", Some(&cookie))).await).await;
    assert!(next.contains("Login successful!"));
}
