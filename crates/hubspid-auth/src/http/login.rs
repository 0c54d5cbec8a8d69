//! Login and logout redirects.
//!
//! The SAML middleware validates the assertion and posts the decoded
//! identity here as JSON.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::{IntoResponse, Redirect, Response},
};

use super::{GatewayState, rejection_response};
use crate::identity::SpidIdentity;

/// `POST /acs`
///
/// Redirects to the success endpoint with the issued token, or to the error
/// endpoint when the login cannot complete.
pub async fn acs_handler(
    State(state): State<GatewayState>,
    payload: Result<Json<SpidIdentity>, JsonRejection>,
) -> Response {
    let Json(identity) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejection_response(rejection),
    };

    match state.assertion_consumer.consume(&identity).await {
        Ok(outcome) => Redirect::to(&outcome.redirect_url).into_response(),
        Err(e) => {
            tracing::warn!(category = %e.category(), error = %e, "Login failed");
            Redirect::to(state.assertion_consumer.error_redirect()).into_response()
        }
    }
}

/// `GET /logout`
pub async fn logout_handler(State(state): State<GatewayState>) -> Response {
    match state.assertion_consumer.logout_redirect() {
        Ok(url) => Redirect::to(&url).into_response(),
        Err(e) => e.into_response(),
    }
}
