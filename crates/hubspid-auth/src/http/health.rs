//! Health check.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::GatewayState;

/// `GET /healthcheck`
///
/// Pings the session cache, then the Attribute Authority when enabled.
pub async fn healthcheck_handler(State(state): State<GatewayState>) -> Response {
    match state.cache.ping().await {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!(cache = state.cache.kind(), "Cache ping not acknowledged");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Cache ping failed").into_response();
        }
        Err(e) => {
            tracing::warn!(cache = state.cache.kind(), error = %e, "Cache unreachable");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Cache unreachable").into_response();
        }
    }

    if let Some(authority) = &state.attribute_authority {
        if let Err(e) = authority.ping().await {
            tracing::warn!(error = %e, "Attribute Authority unreachable");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Attribute Authority unreachable",
            )
                .into_response();
        }
    }

    (StatusCode::OK, "OK").into_response()
}
