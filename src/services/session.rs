//! Session lookup and WS-ticket management.
//!
//! ARCHITECTURE
//! ============
//! Sessions are created by the external login flow; this service only looks
//! them up. `get_session` resolves a token into the
//! `{user, organizations, current_organization}` triple used by every route.
//! Websocket upgrades use one-time short-lived tickets instead of cookies.
//!
//! TRADE-OFFS
//! ==========
//! Ticket consumption is destructive (`DELETE ... RETURNING`) to guarantee
//! single use; this favors replay safety over reconnect convenience.

use std::fmt::Write;

use rand::Rng;
use serde::Serialize;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::organization::{self, OrganizationError, OrganizationSummary};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("not a member of organization {0}")]
    NotMember(Uuid),
    #[error("session not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<OrganizationError> for SessionError {
    fn from(err: OrganizationError) -> Self {
        match err {
            OrganizationError::NotFound(id) | OrganizationError::Forbidden(id) => Self::NotMember(id),
            OrganizationError::Database(e) => Self::Database(e),
        }
    }
}

impl crate::frame::ErrorCode for SessionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotMember(_) => "E_FORBIDDEN",
            Self::NotFound => "E_SESSION_NOT_FOUND",
            Self::Database(_) => "E_DATABASE",
        }
    }
}

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Generate a cryptographically random 32-byte hex token.
#[cfg(test)]
pub(crate) fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes_to_hex(&bytes)
}

/// Generate a short-lived 16-byte hex WS ticket.
#[must_use]
pub(crate) fn generate_ws_ticket() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes_to_hex(&bytes)
}

/// User row returned from session validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,
}

/// The resolved session triple.
#[derive(Debug, Clone, Serialize)]
pub struct SessionContext {
    pub user: SessionUser,
    pub organizations: Vec<OrganizationSummary>,
    pub current_organization: Option<OrganizationSummary>,
}

/// Validate a session token and return the user plus the session's stored
/// organization choice.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn validate_session(pool: &PgPool, token: &str) -> Result<Option<(SessionUser, Option<Uuid>)>, sqlx::Error> {
    let row = sqlx::query(
        r"SELECT u.id, u.name, u.email, u.avatar_url, s.current_organization_id
          FROM sessions s
          JOIN users u ON u.id = s.user_id
          WHERE s.token = $1 AND s.expires_at > now()",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| {
        let user = SessionUser {
            id: r.get("id"),
            name: r.get("name"),
            email: r.get("email"),
            avatar_url: r.get("avatar_url"),
        };
        (user, r.get("current_organization_id"))
    }))
}

/// Resolve a token into the full session context, or `None` if the token is
/// unknown or expired.
///
/// # Errors
///
/// Returns a database error if a query fails.
pub async fn get_session(pool: &PgPool, token: &str) -> Result<Option<SessionContext>, SessionError> {
    let Some((user, preferred)) = validate_session(pool, token).await? else {
        return Ok(None);
    };

    let organizations = organization::list_for_user(pool, user.id).await?;
    let current_organization = organization::pick_current(&organizations, preferred);
    Ok(Some(SessionContext { user, organizations, current_organization }))
}

/// Switch the session's current organization.
///
/// # Errors
///
/// Returns `NotMember` if the user does not belong to the organization.
pub async fn set_current_organization(
    pool: &PgPool,
    token: &str,
    user_id: Uuid,
    organization_id: Uuid,
) -> Result<(), SessionError> {
    organization::require_member(pool, organization_id, user_id).await?;

    let result = sqlx::query("UPDATE sessions SET current_organization_id = $2 WHERE token = $1")
        .bind(token)
        .bind(organization_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(SessionError::NotFound);
    }
    Ok(())
}

/// Delete a session by token.
///
/// # Errors
///
/// Returns a database error if the delete fails.
pub async fn delete_session(pool: &PgPool, token: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM sessions WHERE token = $1")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(())
}

/// Create a short-lived WS ticket bound to a session.
///
/// # Errors
///
/// Returns a database error if the insert fails.
pub async fn create_ws_ticket(pool: &PgPool, user_id: Uuid, session_token: &str) -> Result<String, sqlx::Error> {
    let ticket = generate_ws_ticket();
    sqlx::query("INSERT INTO ws_tickets (ticket, user_id, session_token) VALUES ($1, $2, $3)")
        .bind(&ticket)
        .bind(user_id)
        .bind(session_token)
        .execute(pool)
        .await?;
    Ok(ticket)
}

/// Consume a WS ticket atomically, returning the bound session token if valid.
///
/// # Errors
///
/// Returns a database error if the delete fails.
pub async fn consume_ws_ticket(pool: &PgPool, ticket: &str) -> Result<Option<String>, sqlx::Error> {
    let row = sqlx::query("DELETE FROM ws_tickets WHERE ticket = $1 AND expires_at > now() RETURNING session_token")
        .bind(ticket)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| r.get("session_token")))
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
