//! Token endpoints: introspection, invalidation and L1 to L2 upgrade.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use super::{GatewayState, rejection_response};
use crate::config::TokenMode;
use crate::error::{AuthError, AuthResult};

const MIN_ORGANIZATION_CODE_LEN: usize = 8;
const MAX_ORGANIZATION_CODE_LEN: usize = 16;

// =============================================================================
// Request Types
// =============================================================================

/// Body of `/introspect` and `/invalidate`.
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub token: String,
}

impl TokenRequest {
    fn token(&self) -> AuthResult<&str> {
        let token = self.token.trim();
        if token.is_empty() {
            return Err(AuthError::validation("Missing required 'token' field"));
        }
        Ok(token)
    }
}

/// Body of `/upgradeToken`.
#[derive(Debug, Deserialize)]
pub struct UpgradeRequest {
    pub organization_fiscal_code: String,

    /// L1 token, accepted in the body for opaque tokens only.
    #[serde(default)]
    pub token: Option<String>,
}

impl UpgradeRequest {
    fn organization_fiscal_code(&self) -> AuthResult<&str> {
        let code = self.organization_fiscal_code.trim();
        if !(MIN_ORGANIZATION_CODE_LEN..=MAX_ORGANIZATION_CODE_LEN).contains(&code.len()) {
            return Err(AuthError::validation(format!(
                "organization_fiscal_code must be {MIN_ORGANIZATION_CODE_LEN} to {MAX_ORGANIZATION_CODE_LEN} characters"
            )));
        }
        Ok(code)
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// `POST /introspect`
///
/// - 200 `{"active": true, ...}` for live tokens
/// - 403 `{"active": false}` for invalidated or unverifiable tokens
/// - 404 for unknown opaque tokens
pub async fn introspect_handler(
    State(state): State<GatewayState>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejection_response(rejection),
    };
    let token = match request.token() {
        Ok(token) => token,
        Err(e) => return e.into_response(),
    };

    match state.token_service.introspect(token).await {
        Ok(response) if response.active => (StatusCode::OK, Json(response)).into_response(),
        Ok(response) => (StatusCode::FORBIDDEN, Json(response)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// `POST /invalidate`
///
/// Responds with the cache acknowledgement as a bare JSON boolean.
pub async fn invalidate_handler(
    State(state): State<GatewayState>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejection_response(rejection),
    };
    let token = match request.token() {
        Ok(token) => token,
        Err(e) => return e.into_response(),
    };

    match state.token_service.invalidate(token).await {
        Ok(invalidated) => (StatusCode::OK, Json(invalidated)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// `POST /upgradeToken`
///
/// The L1 token is read from the configured header. Opaque tokens may also
/// be passed as a `token` body field.
pub async fn upgrade_handler(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    payload: Result<Json<UpgradeRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejection_response(rejection),
    };

    match upgrade(&state, &headers, &request).await {
        Ok(token) => (StatusCode::OK, Json(serde_json::json!({ "token": token }))).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn upgrade(
    state: &GatewayState,
    headers: &HeaderMap,
    request: &UpgradeRequest,
) -> AuthResult<String> {
    let organization_fiscal_code = request.organization_fiscal_code()?;

    let from_header = headers
        .get(state.l1_token_header_name.as_str())
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    let from_body = match state.token_service.mode() {
        TokenMode::Opaque => request.token.as_deref().map(str::trim).filter(|t| !t.is_empty()),
        TokenMode::Jwt => None,
    };
    let l1_token = from_header.or(from_body).ok_or_else(|| {
        AuthError::validation(format!(
            "Missing L1 token in '{}' header",
            state.l1_token_header_name
        ))
    })?;

    let issued = state
        .token_service
        .upgrade(l1_token, organization_fiscal_code)
        .await?;
    Ok(issued.token)
}
