//! Default landing pages for the success and error redirects.

use axum::{
    Json,
    extract::Query,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SuccessQuery {
    #[serde(default)]
    pub token: Option<String>,
}

/// `GET /success?token=...`
pub async fn success_page_handler(Query(query): Query<SuccessQuery>) -> Response {
    Json(serde_json::json!({
        "success": "success",
        "token": query.token,
    }))
    .into_response()
}

/// `GET /error`
pub async fn error_page_handler() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": "error" })),
    )
        .into_response()
}
