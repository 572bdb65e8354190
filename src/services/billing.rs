//! Stripe webhook intake.
//!
//! DESIGN
//! ======
//! Deliveries are verified (when a secret is configured), parsed into a
//! `StripeEvent`, classified, and recorded in `stripe_events` keyed by the
//! Stripe event id so redeliveries are acknowledged without reapplying.
//! Recording and applying share one transaction: a failed apply leaves no
//! record, so Stripe's redelivery is applied rather than seen as a duplicate.
//!
//! Only verified subscription events update the organization plan. Without
//! a webhook secret, deliveries are recorded and acknowledged only.
//!
//! The `Stripe-Signature` header carries `t=<unix>,v1=<hex>[,v1=<hex>]`.
//! The expected signature is HMAC-SHA256 over `"{t}.{body}"`.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use sqlx::PgPool;
use tracing::{info, warn};

use super::organization::{self, OrganizationError};

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted age of a signed delivery, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: u64 = 300;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    #[error("missing or malformed Stripe-Signature header")]
    BadSignatureHeader,
    #[error("signature mismatch")]
    SignatureMismatch,
    #[error("signature timestamp outside tolerance")]
    Stale,
    #[error("webhook secret unusable as an HMAC key")]
    InvalidSecret,
    #[error("invalid event payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl crate::frame::ErrorCode for BillingError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::BadSignatureHeader | Self::SignatureMismatch | Self::Stale => "E_BAD_SIGNATURE",
            Self::InvalidSecret => "E_WEBHOOK_SECRET",
            Self::InvalidPayload(_) => "E_INVALID_PAYLOAD",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StripeEventData {
    #[serde(default)]
    pub object: serde_json::Value,
}

/// What a delivery means for this system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingAction {
    /// Set the plan of the organization owning this Stripe customer.
    SetPlan { customer: String, plan: &'static str },
    /// Nothing to apply.
    Acknowledge,
}

/// Outcome of `handle_event`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Applied,
    Acknowledged,
    Duplicate,
}

// =============================================================================
// SIGNATURE
// =============================================================================

fn hex_to_bytes(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
        .collect()
}

/// Split a `Stripe-Signature` header into its timestamp and `v1` signatures.
///
/// # Errors
///
/// Returns `BadSignatureHeader` if the timestamp or every `v1` entry is missing.
pub fn parse_signature_header(header: &str) -> Result<(i64, Vec<&str>), BillingError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) if !value.is_empty() => signatures.push(value),
            _ => {}
        }
    }
    match timestamp {
        Some(t) if !signatures.is_empty() => Ok((t, signatures)),
        _ => Err(BillingError::BadSignatureHeader),
    }
}

/// Verify a delivery against the webhook secret at time `now` (unix seconds).
///
/// # Errors
///
/// Returns `BadSignatureHeader`, `Stale`, `InvalidSecret`, or `SignatureMismatch`.
pub fn verify_signature(secret: &str, header: &str, body: &[u8], now: i64) -> Result<(), BillingError> {
    let (timestamp, signatures) = parse_signature_header(header)?;
    if now.abs_diff(timestamp) > SIGNATURE_TOLERANCE_SECS {
        return Err(BillingError::Stale);
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| BillingError::InvalidSecret)?;
    mac.update(format!("{timestamp}.").as_bytes());
    mac.update(body);

    // verify_slice compares in constant time.
    if signatures
        .iter()
        .filter_map(|sig| hex_to_bytes(sig))
        .any(|sig| mac.clone().verify_slice(&sig).is_ok())
    {
        Ok(())
    } else {
        Err(BillingError::SignatureMismatch)
    }
}

// =============================================================================
// CLASSIFICATION
// =============================================================================

/// Parse a delivery body.
///
/// # Errors
///
/// Returns `InvalidPayload` if the body is not a Stripe event.
pub fn parse_event(body: &[u8]) -> Result<StripeEvent, BillingError> {
    Ok(serde_json::from_slice(body)?)
}

/// Map an event onto a billing action.
#[must_use]
pub fn classify(event: &StripeEvent) -> BillingAction {
    let object = &event.data.object;
    let customer = object
        .get("customer")
        .and_then(serde_json::Value::as_str)
        .map(str::to_owned);

    match (event.event_type.as_str(), customer) {
        ("customer.subscription.created" | "customer.subscription.updated", Some(customer)) => {
            let status = object
                .get("status")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("");
            let plan = if matches!(status, "active" | "trialing") { "pro" } else { "free" };
            BillingAction::SetPlan { customer, plan }
        }
        ("customer.subscription.deleted", Some(customer)) => BillingAction::SetPlan { customer, plan: "free" },
        _ => BillingAction::Acknowledge,
    }
}

/// The action to take for a delivery. Plan changes need a verified signature.
#[must_use]
pub fn authorized_action(event: &StripeEvent, verified: bool) -> BillingAction {
    match classify(event) {
        BillingAction::SetPlan { .. } if !verified => BillingAction::Acknowledge,
        action => action,
    }
}

// =============================================================================
// APPLY
// =============================================================================

/// Record and apply one event. `verified` says whether its signature was
/// checked against the webhook secret.
///
/// # Errors
///
/// Returns a database error if recording or applying fails; nothing is
/// recorded in that case. An unknown customer is logged and acknowledged.
pub async fn handle_event(pool: &PgPool, event: &StripeEvent, verified: bool) -> Result<WebhookOutcome, BillingError> {
    let mut tx = pool.begin().await?;

    let inserted = sqlx::query("INSERT INTO stripe_events (id, event_type) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING")
        .bind(&event.id)
        .bind(&event.event_type)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    if inserted == 0 {
        info!(event_id = %event.id, "stripe: duplicate delivery");
        return Ok(WebhookOutcome::Duplicate);
    }

    let outcome = match authorized_action(event, verified) {
        BillingAction::Acknowledge => {
            if verified {
                info!(event_id = %event.id, event_type = %event.event_type, "stripe: acknowledged");
            } else {
                warn!(event_id = %event.id, event_type = %event.event_type, "stripe: unverified delivery acknowledged only");
            }
            WebhookOutcome::Acknowledged
        }
        BillingAction::SetPlan { customer, plan } => match apply_plan(&mut tx, &customer, plan).await? {
            Some(organization_id) => {
                info!(event_id = %event.id, %organization_id, plan, "stripe: plan updated");
                WebhookOutcome::Applied
            }
            None => {
                warn!(event_id = %event.id, %customer, "stripe: no organization for customer");
                WebhookOutcome::Acknowledged
            }
        },
    };

    tx.commit().await?;
    Ok(outcome)
}

/// Set the plan of the customer's organization. `None` if no organization
/// has that customer.
async fn apply_plan(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    customer: &str,
    plan: &str,
) -> Result<Option<uuid::Uuid>, BillingError> {
    let organization_id = match organization::find_by_stripe_customer(&mut **tx, customer).await {
        Ok(id) => id,
        Err(OrganizationError::Database(e)) => return Err(e.into()),
        Err(_) => return Ok(None),
    };
    match organization::set_plan(&mut **tx, organization_id, plan).await {
        Ok(()) => Ok(Some(organization_id)),
        Err(OrganizationError::Database(e)) => Err(e.into()),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
#[path = "billing_test.rs"]
mod tests;
