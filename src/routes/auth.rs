//! Auth routes: session triple, logout, organization switch, WS tickets.
//!
//! Sessions are created by the external login flow; these routes only read,
//! switch, or end them.

use axum::extract::{FromRef, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use time::Duration;
use uuid::Uuid;

use crate::config::env_bool;
use crate::services::organization::OrganizationSummary;
use crate::services::session::{self, SessionContext, SessionError};
use crate::state::AppState;

pub(crate) const COOKIE_NAME: &str = "session_token";

pub(crate) fn cookie_secure() -> bool {
    env_bool("COOKIE_SECURE").unwrap_or(false)
}

pub(crate) fn session_error_to_status(err: &SessionError) -> StatusCode {
    match err {
        SessionError::NotMember(_) => StatusCode::FORBIDDEN,
        SessionError::NotFound => StatusCode::UNAUTHORIZED,
        SessionError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// =============================================================================
// AUTH EXTRACTOR
// =============================================================================

/// Authenticated session extracted from the session cookie.
/// Use as a handler parameter to require authentication.
pub struct AuthUser {
    pub context: SessionContext,
    pub token: String,
}

impl AuthUser {
    #[must_use]
    pub fn user_id(&self) -> Uuid {
        self.context.user.id
    }

    /// The organization routes act on.
    ///
    /// # Errors
    ///
    /// `FORBIDDEN` when the user belongs to no organization.
    pub fn organization(&self) -> Result<&OrganizationSummary, StatusCode> {
        self.context
            .current_organization
            .as_ref()
            .ok_or(StatusCode::FORBIDDEN)
    }
}

impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar.get(COOKIE_NAME).map(Cookie::value).unwrap_or_default();
        if token.is_empty() {
            return Err(StatusCode::UNAUTHORIZED);
        }

        let app_state = AppState::from_ref(state);
        let context = session::get_session(&app_state.pool, token)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "session lookup failed");
                StatusCode::INTERNAL_SERVER_ERROR
            })?
            .ok_or(StatusCode::UNAUTHORIZED)?;

        Ok(Self { context, token: token.to_owned() })
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

/// `GET /api/auth/me`: user, organizations, current organization.
pub async fn me(auth: AuthUser) -> Json<SessionContext> {
    Json(auth.context)
}

/// `POST /api/auth/logout`: delete session, clear cookie.
pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    if let Err(e) = session::delete_session(&state.pool, &auth.token).await {
        tracing::warn!(error = %e, "session delete failed");
    }

    let cookie = Cookie::build((COOKIE_NAME, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(cookie_secure())
        .max_age(Duration::ZERO);

    let jar = CookieJar::new().add(cookie);
    (jar, StatusCode::NO_CONTENT)
}

/// `POST /api/auth/ws-ticket`: create a one-time WS ticket bound to this session.
pub async fn ws_ticket(State(state): State<AppState>, auth: AuthUser) -> Result<Json<serde_json::Value>, StatusCode> {
    let ticket = session::create_ws_ticket(&state.pool, auth.user_id(), &auth.token)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(serde_json::json!({ "ticket": ticket })))
}

#[derive(Debug, Deserialize)]
pub struct SwitchOrganization {
    pub organization_id: Uuid,
}

/// `POST /api/auth/organization`: switch the current organization.
pub async fn switch_organization(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<SwitchOrganization>,
) -> Result<Json<SessionContext>, StatusCode> {
    session::set_current_organization(&state.pool, &auth.token, auth.user_id(), body.organization_id)
        .await
        .map_err(|e| session_error_to_status(&e))?;

    let context = session::get_session(&state.pool, &auth.token)
        .await
        .map_err(|e| session_error_to_status(&e))?
        .ok_or(StatusCode::UNAUTHORIZED)?;
    Ok(Json(context))
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
