//! Procurement service: requests, vendors, and quotes.
//!
//! DESIGN
//! ======
//! Every query is scoped by organization id; a row from another
//! organization is reported as `NotFound`, never `Forbidden`, so ids do not
//! leak across tenants. Quote approval runs in one transaction: the chosen
//! quote is approved, its siblings rejected, and the request marked approved.

use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ProcurementError {
    #[error("procurement request not found: {0}")]
    RequestNotFound(Uuid),
    #[error("quote not found: {0}")]
    QuoteNotFound(Uuid),
    #[error("invalid request: {0}")]
    Invalid(String),
    #[error("quote {0} is no longer pending")]
    QuoteNotPending(Uuid),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl crate::frame::ErrorCode for ProcurementError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::RequestNotFound(_) => "E_REQUEST_NOT_FOUND",
            Self::QuoteNotFound(_) => "E_QUOTE_NOT_FOUND",
            Self::Invalid(_) => "E_INVALID_REQUEST",
            Self::QuoteNotPending(_) => "E_QUOTE_NOT_PENDING",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Draft,
    Pending,
    Approved,
    Rejected,
    Ordered,
}

impl RequestStatus {
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "draft" => Some(Self::Draft),
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "ordered" => Some(Self::Ordered),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Ordered => "ordered",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcurementRequest {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub created_by: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub budget: Option<f64>,
    pub status: RequestStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Input for `create_request`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub budget: Option<f64>,
}

impl NewRequest {
    /// Trim and check the input.
    ///
    /// # Errors
    ///
    /// Returns `Invalid` for a blank title or a negative / non-finite budget.
    pub fn validate(mut self) -> Result<Self, ProcurementError> {
        self.title = self.title.trim().to_owned();
        self.description = self.description.trim().to_owned();
        if self.title.is_empty() {
            return Err(ProcurementError::Invalid("title required".into()));
        }
        if let Some(budget) = self.budget {
            if !budget.is_finite() || budget < 0.0 {
                return Err(ProcurementError::Invalid("budget must be a non-negative number".into()));
            }
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Vendor {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Quote {
    pub id: Uuid,
    pub request_id: Uuid,
    pub vendor_id: Uuid,
    pub vendor_name: String,
    pub total_amount: f64,
    pub currency: String,
    pub status: String,
}

// =============================================================================
// REQUESTS
// =============================================================================

fn request_from_row(r: &sqlx::postgres::PgRow) -> ProcurementRequest {
    let status: String = r.get("status");
    ProcurementRequest {
        id: r.get("id"),
        organization_id: r.get("organization_id"),
        created_by: r.get("created_by"),
        title: r.get("title"),
        description: r.get("description"),
        budget: r.get("budget"),
        status: RequestStatus::parse(&status).unwrap_or(RequestStatus::Pending),
        created_at: r.get("created_at"),
    }
}

/// Requests of an organization, newest first.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_requests(pool: &PgPool, organization_id: Uuid) -> Result<Vec<ProcurementRequest>, ProcurementError> {
    let rows = sqlx::query(
        r"SELECT id, organization_id, created_by, title, description, budget, status, created_at
          FROM procurement_requests
          WHERE organization_id = $1
          ORDER BY created_at DESC",
    )
    .bind(organization_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(request_from_row).collect())
}

/// One request within an organization.
///
/// # Errors
///
/// Returns `RequestNotFound` if it does not exist in this organization.
pub async fn get_request(pool: &PgPool, organization_id: Uuid, request_id: Uuid) -> Result<ProcurementRequest, ProcurementError> {
    let row = sqlx::query(
        r"SELECT id, organization_id, created_by, title, description, budget, status, created_at
          FROM procurement_requests
          WHERE id = $1 AND organization_id = $2",
    )
    .bind(request_id)
    .bind(organization_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref()
        .map(request_from_row)
        .ok_or(ProcurementError::RequestNotFound(request_id))
}

/// Create a pending request.
///
/// # Errors
///
/// Returns `Invalid` for bad input, or a database error.
pub async fn create_request(
    pool: &PgPool,
    organization_id: Uuid,
    created_by: Uuid,
    input: NewRequest,
) -> Result<ProcurementRequest, ProcurementError> {
    let input = input.validate()?;
    let row = sqlx::query(
        r"INSERT INTO procurement_requests (organization_id, created_by, title, description, budget)
          VALUES ($1, $2, $3, $4, $5)
          RETURNING id, organization_id, created_by, title, description, budget, status, created_at",
    )
    .bind(organization_id)
    .bind(created_by)
    .bind(&input.title)
    .bind(&input.description)
    .bind(input.budget)
    .fetch_one(pool)
    .await?;

    Ok(request_from_row(&row))
}

// =============================================================================
// VENDORS & QUOTES
// =============================================================================

/// Vendors of an organization, by name.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_vendors(pool: &PgPool, organization_id: Uuid) -> Result<Vec<Vendor>, ProcurementError> {
    let rows = sqlx::query_as::<_, (Uuid, String, Option<String>)>(
        "SELECT id, name, email FROM vendors WHERE organization_id = $1 ORDER BY name ASC",
    )
    .bind(organization_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, name, email)| Vendor { id, name, email })
        .collect())
}

/// Quotes for a request, cheapest first.
///
/// # Errors
///
/// Returns `RequestNotFound` if the request is not in this organization.
pub async fn list_quotes(pool: &PgPool, organization_id: Uuid, request_id: Uuid) -> Result<Vec<Quote>, ProcurementError> {
    get_request(pool, organization_id, request_id).await?;

    let rows = sqlx::query(
        r"SELECT q.id, q.request_id, q.vendor_id, v.name AS vendor_name, q.total_amount, q.currency, q.status
          FROM quotes q
          JOIN vendors v ON v.id = q.vendor_id
          WHERE q.request_id = $1
          ORDER BY q.total_amount ASC",
    )
    .bind(request_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| Quote {
            id: r.get("id"),
            request_id: r.get("request_id"),
            vendor_id: r.get("vendor_id"),
            vendor_name: r.get("vendor_name"),
            total_amount: r.get("total_amount"),
            currency: r.get("currency"),
            status: r.get("status"),
        })
        .collect())
}

/// Approve a quote: approve it, reject its siblings, approve the request.
///
/// # Errors
///
/// Returns `QuoteNotFound` if the quote is not in this organization and
/// `QuoteNotPending` if it was already decided.
pub async fn approve_quote(pool: &PgPool, organization_id: Uuid, quote_id: Uuid) -> Result<Uuid, ProcurementError> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query(
        r"SELECT q.request_id, q.status
          FROM quotes q
          JOIN procurement_requests r ON r.id = q.request_id
          WHERE q.id = $1 AND r.organization_id = $2
          FOR UPDATE OF q",
    )
    .bind(quote_id)
    .bind(organization_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(ProcurementError::QuoteNotFound(quote_id))?;

    let request_id: Uuid = row.get("request_id");
    let status: String = row.get("status");
    if status != "pending" {
        return Err(ProcurementError::QuoteNotPending(quote_id));
    }

    sqlx::query("UPDATE quotes SET status = CASE WHEN id = $1 THEN 'approved' ELSE 'rejected' END WHERE request_id = $2")
        .bind(quote_id)
        .bind(request_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("UPDATE procurement_requests SET status = $2, updated_at = now() WHERE id = $1")
        .bind(request_id)
        .bind(RequestStatus::Approved.as_str())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(request_id)
}

#[cfg(test)]
#[path = "procurement_test.rs"]
mod tests;
