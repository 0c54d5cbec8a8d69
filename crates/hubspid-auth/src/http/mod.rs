//! HTTP surface of the gateway.
//!
//! # Endpoints
//!
//! - `POST /acs`: consume a decoded SPID identity, redirect with a token
//! - `GET /logout`: redirect after single logout
//! - `POST /introspect`, `POST /invalidate`, `POST /upgradeToken`
//! - `GET /success`, `GET /error`: landing pages
//! - `GET /healthcheck`
//!
//! Failures are rendered as `{"error": <tag>, "detail": <message>}` with the
//! status from [`AuthError::status_code`].

pub mod health;
pub mod login;
pub mod pages;
pub mod token;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use hubspid_cache::SharedCache;

use crate::acs::AssertionConsumer;
use crate::clients::AttributeAuthority;
use crate::error::AuthError;
use crate::token::TokenService;

pub use health::healthcheck_handler;
pub use login::{acs_handler, logout_handler};
pub use pages::{error_page_handler, success_page_handler};
pub use token::{introspect_handler, invalidate_handler, upgrade_handler};

// =============================================================================
// State
// =============================================================================

/// Shared state of every gateway handler.
#[derive(Clone)]
pub struct GatewayState {
    pub token_service: Arc<TokenService>,
    pub assertion_consumer: Arc<AssertionConsumer>,
    pub cache: SharedCache,
    /// Present only when the Attribute Authority is enabled.
    pub attribute_authority: Option<Arc<dyn AttributeAuthority>>,
    /// Header carrying the L1 token on upgrade requests.
    pub l1_token_header_name: String,
}

/// Builds the gateway router.
pub fn gateway_router(state: GatewayState) -> Router {
    Router::new()
        .route("/acs", post(acs_handler))
        .route("/logout", get(logout_handler))
        .route("/introspect", post(introspect_handler))
        .route("/invalidate", post(invalidate_handler))
        .route("/upgradeToken", post(upgrade_handler))
        .route("/success", get(success_page_handler))
        .route("/error", get(error_page_handler))
        .route("/healthcheck", get(healthcheck_handler))
        .with_state(state)
}

// =============================================================================
// Error rendering
// =============================================================================

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(category = %self.category(), error = %self, "Request failed");
        } else {
            tracing::debug!(category = %self.category(), error = %self, "Request rejected");
        }

        (
            status,
            Json(serde_json::json!({
                "error": self.error_tag(),
                "detail": self.detail(),
            })),
        )
            .into_response()
    }
}

/// Renders a malformed JSON body as a validation error.
pub(crate) fn rejection_response(rejection: JsonRejection) -> Response {
    let status = rejection.status();
    let error = AuthError::validation(rejection.body_text());
    let mut response = error.into_response();
    if status == StatusCode::UNSUPPORTED_MEDIA_TYPE {
        *response.status_mut() = status;
    }
    response
}
