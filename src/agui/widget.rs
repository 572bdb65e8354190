//! Typed widget payloads, one per registered component.
//!
//! Every payload tolerates missing fields (`#[serde(default)]`) so a partial
//! event still renders; a field with the wrong JSON type is a payload error.
//! Every payload carries the common optional `message`.

use serde::{Deserialize, Serialize};

use super::event::Props;

/// Payload decode failure for a known component.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct WidgetError(#[from] serde_json::Error);

/// Decode a payload struct from props.
///
/// # Errors
///
/// Returns `WidgetError` if a present field has the wrong shape.
pub fn decode<T: serde::de::DeserializeOwned>(props: &Props) -> Result<T, WidgetError> {
    Ok(serde_json::from_value(serde_json::Value::Object(props.clone()))?)
}

// =============================================================================
// PAYLOADS
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThinkingLoader {
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryItem {
    pub name: String,
    pub requested: u32,
    pub available: u32,
}

impl InventoryItem {
    #[must_use]
    pub fn in_stock(&self) -> bool {
        self.available >= self.requested
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryCheck {
    pub message: Option<String>,
    pub items: Vec<InventoryItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuoteFetcher {
    pub message: Option<String>,
    pub vendors: Vec<String>,
    pub received: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineItem {
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuoteApproval {
    pub message: Option<String>,
    pub quote_id: Option<String>,
    pub vendor: Option<String>,
    pub total_amount: Option<f64>,
    pub currency: Option<String>,
    pub line_items: Vec<LineItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentProcessor {
    pub message: Option<String>,
    pub vendor: Option<String>,
    pub amount: Option<f64>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentSuccess {
    pub message: Option<String>,
    pub transaction_id: Option<String>,
    pub vendor: Option<String>,
    pub amount: Option<f64>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorCard {
    pub message: Option<String>,
    pub code: Option<String>,
    pub retryable: bool,
}

/// Fallback payload: only the common status message, whatever the props hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusMessage {
    pub message: String,
}

impl StatusMessage {
    /// Read `message` if it is a string, ignore everything else.
    #[must_use]
    pub fn from_props(props: &Props) -> Self {
        let message = props
            .get("message")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_owned();
        Self { message }
    }
}

// =============================================================================
// WIDGET
// =============================================================================

/// A resolved, fully typed widget.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "props", rename_all = "snake_case")]
pub enum Widget {
    ThinkingLoader(ThinkingLoader),
    InventoryCheck(InventoryCheck),
    QuoteFetcher(QuoteFetcher),
    QuoteApprovalCard(QuoteApproval),
    PaymentProcessor(PaymentProcessor),
    PaymentSuccess(PaymentSuccess),
    ErrorCard(ErrorCard),
    Fallback(StatusMessage),
}

impl Widget {
    /// Stable widget kind, matching the serialized tag.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ThinkingLoader(_) => "thinking_loader",
            Self::InventoryCheck(_) => "inventory_check",
            Self::QuoteFetcher(_) => "quote_fetcher",
            Self::QuoteApprovalCard(_) => "quote_approval_card",
            Self::PaymentProcessor(_) => "payment_processor",
            Self::PaymentSuccess(_) => "payment_success",
            Self::ErrorCard(_) => "error_card",
            Self::Fallback(_) => "fallback",
        }
    }

    /// The common status message, if the payload has one.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::ThinkingLoader(w) => w.message.as_deref(),
            Self::InventoryCheck(w) => w.message.as_deref(),
            Self::QuoteFetcher(w) => w.message.as_deref(),
            Self::QuoteApprovalCard(w) => w.message.as_deref(),
            Self::PaymentProcessor(w) => w.message.as_deref(),
            Self::PaymentSuccess(w) => w.message.as_deref(),
            Self::ErrorCard(w) => w.message.as_deref(),
            Self::Fallback(w) => Some(&w.message),
        }
    }
}
