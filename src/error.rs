use crate::users::UserError;
use crate::views;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};

/// Handler error rendered as the HTML error page with its status code.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn bad_gateway(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Html(views::error_page(&self.message))).into_response()
    }
}

impl From<UserError> for AppError {
    fn from(e: UserError) -> Self {
        tracing::error!(error = %e, "User store failure");
        AppError::internal("Something went wrong. Please try again.")
    }
}
