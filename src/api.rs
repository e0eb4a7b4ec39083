use crate::config::AppConfig;
use crate::error::AppError;
use crate::export;
use crate::flash::{self, Flash};
use crate::forms::{FieldErrors, LoginForm, RegistrationForm, Validate};
use crate::state::AppState;
use crate::stock::{Snapshot, StockPriceClient};
use crate::users::{UserError, UserStore};
use crate::views;
use axum::{
    Form, Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::cookie::SignedCookieJar;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, instrument, warn};

pub const SNAPSHOT_FAILED: &str = "Failed to retrieve stock data";
pub const USERNAME_TAKEN: &str = "That username is already taken.";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home_handler))
        .route("/register", get(register_form_handler).post(register_handler))
        .route("/login", get(login_form_handler).post(login_handler))
        .route("/api/today-price", get(snapshot_json_handler))
        .route("/today-price.csv", get(snapshot_csv_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[instrument(skip_all)]
pub async fn home_handler(
    State(prices): State<StockPriceClient>,
    State(config): State<Arc<AppConfig>>,
    jar: SignedCookieJar,
) -> Response {
    debug!("Received request for today's prices");

    match prices.fetch_snapshot().await {
        Ok(records) => {
            let (jar, message) = flash::take(jar);
            let fetched_at = Utc::now()
                .with_timezone(&config.display_timezone)
                .format("%Y-%m-%d %H:%M %Z")
                .to_string();
            info!(record_count = records.len(), "Rendering today's prices");
            (jar, Html(views::home_page(&records, &fetched_at, message.as_ref()))).into_response()
        }
        Err(e) => {
            // The error page has no flash slot, so a pending message waits for the next page.
            error!(error = %e, "Failed to retrieve stock data");
            AppError::bad_gateway(SNAPSHOT_FAILED).into_response()
        }
    }
}

#[instrument(skip_all)]
pub async fn snapshot_json_handler(State(prices): State<StockPriceClient>) -> Response {
    match prices.fetch_snapshot().await {
        Ok(records) => {
            info!(record_count = records.len(), "Returning snapshot as JSON");
            (StatusCode::OK, Json(Snapshot::new(records, Utc::now()))).into_response()
        }
        Err(e) => {
            error!(error = %e, "Failed to retrieve stock data");
            (StatusCode::BAD_GATEWAY, Json(json!({ "error": SNAPSHOT_FAILED }))).into_response()
        }
    }
}

#[instrument(skip_all)]
pub async fn snapshot_csv_handler(State(prices): State<StockPriceClient>) -> Result<Response, AppError> {
    let records = prices.fetch_snapshot().await.map_err(|e| {
        error!(error = %e, "Failed to retrieve stock data");
        AppError::bad_gateway(SNAPSHOT_FAILED)
    })?;

    let body = export::to_csv(&records).map_err(|e| {
        error!(error = %e, "Failed to write CSV");
        AppError::internal("Failed to export stock data")
    })?;

    info!(record_count = records.len(), bytes = body.len(), "Returning snapshot as CSV");
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"today-price.csv\""),
        ],
        body,
    )
        .into_response())
}

pub async fn register_form_handler(jar: SignedCookieJar) -> impl IntoResponse {
    let (jar, message) = flash::take(jar);
    let page = views::register_page(&RegistrationForm::default(), &FieldErrors::default(), message.as_ref());
    (jar, Html(page))
}

#[instrument(skip_all, fields(username = %form.username))]
pub async fn register_handler(
    State(users): State<UserStore>,
    jar: SignedCookieJar,
    Form(form): Form<RegistrationForm>,
) -> Result<Response, AppError> {
    let mut errors = form.validate();

    if errors.is_empty() {
        match users.register(form.username.clone(), form.password.clone()).await {
            Ok(user) => {
                info!(user_id = user.id, "Registered new user");
                let jar = flash::push(jar, Flash::AccountCreated);
                return Ok((jar, Redirect::to("/login")).into_response());
            }
            Err(UserError::UsernameTaken(_)) => {
                warn!("Registration rejected: username taken");
                errors.add("username", USERNAME_TAKEN);
            }
            Err(e) => return Err(e.into()),
        }
    } else {
        debug!(?errors, "Registration form invalid");
    }

    Ok(Html(views::register_page(&form, &errors, None)).into_response())
}

pub async fn login_form_handler(jar: SignedCookieJar) -> impl IntoResponse {
    let (jar, message) = flash::take(jar);
    let page = views::login_page(&LoginForm::default(), &FieldErrors::default(), message.as_ref());
    (jar, Html(page))
}

#[instrument(skip_all, fields(username = %form.username))]
pub async fn login_handler(
    State(users): State<UserStore>,
    jar: SignedCookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let errors = form.validate();
    if !errors.is_empty() {
        debug!(?errors, "Login form invalid");
        return Ok(Html(views::login_page(&form, &errors, None)).into_response());
    }

    match users.authenticate(form.username.clone(), form.password.clone()).await? {
        Some(user) => {
            info!(user_id = user.id, "Login successful");
            let jar = flash::push(jar, Flash::LoginSucceeded);
            Ok((jar, Redirect::to("/")).into_response())
        }
        None => {
            warn!("Login unsuccessful");
            let message = Flash::LoginFailed.message();
            Ok(Html(views::login_page(&form, &errors, Some(&message))).into_response())
        }
    }
}
