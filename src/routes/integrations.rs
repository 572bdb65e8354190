//! Integration routes: Stripe webhook intake and Gmail sending.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use time::OffsetDateTime;

use super::auth::AuthUser;
use crate::frame::{ErrorCode, FRAME_CODE, FRAME_MESSAGE};
use crate::services::billing::{self, BillingError, WebhookOutcome};
use crate::services::email::{EmailError, OutgoingEmail, SentMessage};
use crate::state::AppState;

const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

pub(crate) fn billing_error_to_status(err: &BillingError) -> StatusCode {
    match err {
        BillingError::BadSignatureHeader
        | BillingError::SignatureMismatch
        | BillingError::Stale
        | BillingError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
        BillingError::InvalidSecret | BillingError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn email_error_to_status(err: &EmailError) -> StatusCode {
    match err {
        EmailError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EmailError::HttpClientBuild(_) => StatusCode::INTERNAL_SERVER_ERROR,
        EmailError::Request(_) | EmailError::Response { .. } => StatusCode::BAD_GATEWAY,
    }
}

fn error_response(status: StatusCode, err: &impl ErrorCode) -> Response {
    let body = serde_json::json!({ FRAME_CODE: err.error_code(), FRAME_MESSAGE: err.to_string() });
    (status, Json(body)).into_response()
}

// =============================================================================
// STRIPE
// =============================================================================

/// `POST /api/webhooks/stripe`
pub async fn stripe_webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let verified = match &state.stripe_webhook_secret {
        Some(secret) => {
            let signature = headers
                .get(STRIPE_SIGNATURE_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            let now = OffsetDateTime::now_utc().unix_timestamp();
            if let Err(e) = billing::verify_signature(secret, signature, &body, now) {
                tracing::warn!(error = %e, "stripe webhook rejected");
                return error_response(billing_error_to_status(&e), &e);
            }
            true
        }
        None => false,
    };

    let event = match billing::parse_event(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "stripe webhook payload invalid");
            return error_response(billing_error_to_status(&e), &e);
        }
    };

    match billing::handle_event(&state.pool, &event, verified).await {
        Ok(outcome) => {
            let outcome = match outcome {
                WebhookOutcome::Applied => "applied",
                WebhookOutcome::Acknowledged => "acknowledged",
                WebhookOutcome::Duplicate => "duplicate",
            };
            Json(serde_json::json!({ "received": true, "outcome": outcome })).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, event_id = %event.id, "stripe webhook handling failed");
            error_response(billing_error_to_status(&e), &e)
        }
    }
}

// =============================================================================
// GMAIL
// =============================================================================

/// `GET /api/integrations/gmail`
pub async fn gmail_status(State(state): State<AppState>, _auth: AuthUser) -> Json<serde_json::Value> {
    let sender = state.mailer.as_ref().map(|m| m.sender().to_owned());
    Json(serde_json::json!({ "configured": sender.is_some(), "sender": sender }))
}

/// `POST /api/integrations/gmail/send`
pub async fn gmail_send(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(email): Json<OutgoingEmail>,
) -> Result<Json<SentMessage>, Response> {
    let Some(mailer) = &state.mailer else {
        return Err((StatusCode::SERVICE_UNAVAILABLE, "Gmail not configured").into_response());
    };

    match mailer.send(&email).await {
        Ok(sent) => {
            tracing::info!(message_id = %sent.id, user_id = %auth.user_id(), "gmail: sent");
            Ok(Json(sent))
        }
        Err(e) => {
            tracing::warn!(error = %e, user_id = %auth.user_id(), "gmail: send failed");
            Err(error_response(email_error_to_status(&e), &e))
        }
    }
}

#[cfg(test)]
#[path = "integrations_test.rs"]
mod tests;
