//! Gmail REST client: send-only.
//!
//! Thin HTTP wrapper for `users/me/messages/send`. The message is built as a
//! plain-text RFC 822 document and sent base64url-encoded in the `raw`
//! field. Pure message building in `build_message` for testability.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};

use crate::config::GmailConfig;

const API_BASE: &str = "https://gmail.googleapis.com";
const SEND_PATH: &str = "/gmail/v1/users/me/messages/send";
const REQUEST_TIMEOUT_SECS: u64 = 30;
const CONNECT_TIMEOUT_SECS: u64 = 10;
/// Source bytes per RFC 2047 encoded-word; keeps each word under 76 chars.
const ENCODED_WORD_BYTES: usize = 45;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("invalid email: {0}")]
    Invalid(String),
    #[error("http client build failed: {0}")]
    HttpClientBuild(String),
    #[error("gmail request failed: {0}")]
    Request(String),
    #[error("gmail returned {status}: {body}")]
    Response { status: u16, body: String },
}

impl crate::frame::ErrorCode for EmailError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Invalid(_) => "E_INVALID_EMAIL",
            Self::HttpClientBuild(_) => "E_EMAIL_CLIENT",
            Self::Request(_) => "E_EMAIL_REQUEST",
            Self::Response { .. } => "E_EMAIL_RESPONSE",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Request(_) => true,
            Self::Response { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// One outgoing plain-text message.
#[derive(Debug, Clone, Deserialize)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl OutgoingEmail {
    /// # Errors
    ///
    /// Returns `Invalid` for an empty or header-breaking recipient/subject.
    pub fn validate(&self) -> Result<(), EmailError> {
        let to = self.to.trim();
        if to.is_empty() || !to.contains('@') {
            return Err(EmailError::Invalid("recipient must be an email address".into()));
        }
        if has_line_break(&self.to) || has_line_break(&self.subject) {
            return Err(EmailError::Invalid("headers must not contain line breaks".into()));
        }
        Ok(())
    }
}

/// Gmail's reply to a send.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SentMessage {
    pub id: String,
    #[serde(rename = "threadId", default)]
    pub thread_id: Option<String>,
}

fn has_line_break(value: &str) -> bool {
    value.contains('\r') || value.contains('\n')
}

/// Header text as-is when ASCII, otherwise RFC 2047 `B` encoded-words
/// folded onto continuation lines. Words never split a UTF-8 character.
#[must_use]
pub fn encode_header(value: &str) -> String {
    if value.is_ascii() {
        return value.to_owned();
    }

    let mut words = Vec::new();
    let mut chunk = String::new();
    for c in value.chars() {
        if chunk.len() + c.len_utf8() > ENCODED_WORD_BYTES {
            words.push(format!("=?UTF-8?B?{}?=", STANDARD.encode(&chunk)));
            chunk.clear();
        }
        chunk.push(c);
    }
    if !chunk.is_empty() {
        words.push(format!("=?UTF-8?B?{}?=", STANDARD.encode(&chunk)));
    }
    words.join("\r\n ")
}

/// Build the RFC 822 text of a message.
#[must_use]
pub fn build_message(from: &str, email: &OutgoingEmail) -> String {
    format!(
        "From: {from}\r\nTo: {}\r\nSubject: {}\r\nMIME-Version: 1.0\r\nContent-Type: text/plain; charset=\"UTF-8\"\r\n\r\n{}",
        email.to.trim(),
        encode_header(&email.subject),
        email.body,
    )
}

/// Encode a message for the `raw` field.
#[must_use]
pub fn encode_raw(message: &str) -> String {
    URL_SAFE_NO_PAD.encode(message.as_bytes())
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct GmailClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
    sender: String,
}

impl GmailClient {
    /// # Errors
    ///
    /// Returns `HttpClientBuild` if the HTTP client fails to build.
    pub fn new(config: GmailConfig) -> Result<Self, EmailError> {
        Self::with_base_url(config, API_BASE)
    }

    /// Client against a custom API host. Used by tests.
    ///
    /// # Errors
    ///
    /// Returns `HttpClientBuild` if the HTTP client fails to build.
    pub fn with_base_url(config: GmailConfig, base_url: impl Into<String>) -> Result<Self, EmailError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| EmailError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: base_url.into(), access_token: config.access_token, sender: config.sender })
    }

    #[must_use]
    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Send one message.
    ///
    /// # Errors
    ///
    /// Returns `Invalid` before any request is made, or the request/response error.
    pub async fn send(&self, email: &OutgoingEmail) -> Result<SentMessage, EmailError> {
        email.validate()?;
        let raw = encode_raw(&build_message(&self.sender, email));

        let response = self
            .http
            .post(format!("{}{SEND_PATH}", self.base_url))
            .bearer_auth(&self.access_token)
            .json(&serde_json::json!({ "raw": raw }))
            .send()
            .await
            .map_err(|e| EmailError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| EmailError::Request(e.to_string()))?;

        if !(200..300).contains(&status) {
            return Err(EmailError::Response { status, body: text });
        }

        serde_json::from_str(&text).map_err(|e| EmailError::Request(format!("invalid gmail response: {e}")))
    }
}

#[cfg(test)]
#[path = "email_test.rs"]
mod tests;
