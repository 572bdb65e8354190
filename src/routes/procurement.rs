//! Procurement REST routes: organizations, requests, vendors, quotes.
//!
//! Every route acts on the session's current organization except the
//! member listing, which takes the organization from the path and checks
//! membership.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use uuid::Uuid;

use super::auth::AuthUser;
use crate::services::organization::{self, Member, OrganizationError, OrganizationSummary};
use crate::services::procurement::{self, NewRequest, ProcurementError, ProcurementRequest, Quote, Vendor};
use crate::state::AppState;

pub(crate) fn organization_error_to_status(err: &OrganizationError) -> StatusCode {
    match err {
        OrganizationError::NotFound(_) => StatusCode::NOT_FOUND,
        OrganizationError::Forbidden(_) => StatusCode::FORBIDDEN,
        OrganizationError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn procurement_error_to_status(err: &ProcurementError) -> StatusCode {
    match err {
        ProcurementError::RequestNotFound(_) | ProcurementError::QuoteNotFound(_) => StatusCode::NOT_FOUND,
        ProcurementError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ProcurementError::QuoteNotPending(_) => StatusCode::CONFLICT,
        ProcurementError::Database(e) => {
            tracing::error!(error = %e, "procurement query failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

// =============================================================================
// ORGANIZATIONS
// =============================================================================

/// `GET /api/organizations`
pub async fn list_organizations(auth: AuthUser) -> Json<Vec<OrganizationSummary>> {
    Json(auth.context.organizations)
}

/// `GET /api/organizations/{id}/members`
pub async fn list_members(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(organization_id): Path<Uuid>,
) -> Result<Json<Vec<Member>>, StatusCode> {
    organization::list_members(&state.pool, organization_id, auth.user_id())
        .await
        .map(Json)
        .map_err(|e| organization_error_to_status(&e))
}

// =============================================================================
// REQUESTS
// =============================================================================

/// `GET /api/requests`
pub async fn list_requests(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<ProcurementRequest>>, StatusCode> {
    let org = auth.organization()?;
    procurement::list_requests(&state.pool, org.id)
        .await
        .map(Json)
        .map_err(|e| procurement_error_to_status(&e))
}

/// `POST /api/requests`
pub async fn create_request(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<NewRequest>,
) -> Result<(StatusCode, Json<ProcurementRequest>), StatusCode> {
    let org = auth.organization()?;
    let row = procurement::create_request(&state.pool, org.id, auth.user_id(), body)
        .await
        .map_err(|e| procurement_error_to_status(&e))?;
    tracing::info!(request_id = %row.id, organization_id = %org.id, "procurement request created");
    Ok((StatusCode::CREATED, Json(row)))
}

/// `GET /api/requests/{id}`
pub async fn get_request(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(request_id): Path<Uuid>,
) -> Result<Json<ProcurementRequest>, StatusCode> {
    let org = auth.organization()?;
    procurement::get_request(&state.pool, org.id, request_id)
        .await
        .map(Json)
        .map_err(|e| procurement_error_to_status(&e))
}

/// `GET /api/requests/{id}/quotes`
pub async fn list_quotes(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(request_id): Path<Uuid>,
) -> Result<Json<Vec<Quote>>, StatusCode> {
    let org = auth.organization()?;
    procurement::list_quotes(&state.pool, org.id, request_id)
        .await
        .map(Json)
        .map_err(|e| procurement_error_to_status(&e))
}

// =============================================================================
// QUOTES & VENDORS
// =============================================================================

/// `POST /api/quotes/{id}/approve`: owners and admins only.
pub async fn approve_quote(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(quote_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let org = auth.organization()?;
    if !org.role.can_approve() {
        tracing::warn!(%quote_id, role = org.role.as_str(), user_id = %auth.user_id(), "quote approval forbidden");
        return Err(StatusCode::FORBIDDEN);
    }
    let request_id = procurement::approve_quote(&state.pool, org.id, quote_id)
        .await
        .map_err(|e| procurement_error_to_status(&e))?;
    tracing::info!(%quote_id, %request_id, user_id = %auth.user_id(), "quote approved");
    Ok(Json(serde_json::json!({ "quote_id": quote_id, "request_id": request_id, "status": "approved" })))
}

/// `GET /api/vendors`
pub async fn list_vendors(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Vec<Vendor>>, StatusCode> {
    let org = auth.organization()?;
    procurement::list_vendors(&state.pool, org.id)
        .await
        .map(Json)
        .map_err(|e| procurement_error_to_status(&e))
}

#[cfg(test)]
#[path = "procurement_test.rs"]
mod tests;
