//! Organization service: memberships and roles.

use serde::Serialize;
use sqlx::{PgPool, Row};
use uuid::Uuid;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrganizationError {
    #[error("organization not found: {0}")]
    NotFound(Uuid),
    #[error("not a member of organization {0}")]
    Forbidden(Uuid),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl crate::frame::ErrorCode for OrganizationError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_ORGANIZATION_NOT_FOUND",
            Self::Forbidden(_) => "E_FORBIDDEN",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Admin,
    Member,
}

impl Role {
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "owner" => Some(Self::Owner),
            "admin" => Some(Self::Admin),
            "member" => Some(Self::Member),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }

    /// Owners and admins may approve quotes.
    #[must_use]
    pub fn can_approve(self) -> bool {
        matches!(self, Self::Owner | Self::Admin)
    }
}

/// An organization as seen by one member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrganizationSummary {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub plan: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
pub struct Member {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

// =============================================================================
// QUERIES
// =============================================================================

/// Organizations the user belongs to, oldest membership first.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<OrganizationSummary>, OrganizationError> {
    let rows = sqlx::query(
        r"SELECT o.id, o.name, o.slug, o.plan, m.role
          FROM memberships m
          JOIN organizations o ON o.id = m.organization_id
          WHERE m.user_id = $1
          ORDER BY m.created_at ASC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| {
            let role: String = r.get("role");
            OrganizationSummary {
                id: r.get("id"),
                name: r.get("name"),
                slug: r.get("slug"),
                plan: r.get("plan"),
                role: Role::parse(&role).unwrap_or(Role::Member),
            }
        })
        .collect())
}

/// The user's role in an organization, or `None` if not a member.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn membership_role(pool: &PgPool, organization_id: Uuid, user_id: Uuid) -> Result<Option<Role>, OrganizationError> {
    let row = sqlx::query("SELECT role FROM memberships WHERE organization_id = $1 AND user_id = $2")
        .bind(organization_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.and_then(|r| Role::parse(r.get::<String, _>("role").as_str())))
}

/// Require membership, returning the role.
///
/// # Errors
///
/// Returns `Forbidden` if the user is not a member.
pub async fn require_member(pool: &PgPool, organization_id: Uuid, user_id: Uuid) -> Result<Role, OrganizationError> {
    membership_role(pool, organization_id, user_id)
        .await?
        .ok_or(OrganizationError::Forbidden(organization_id))
}

/// Members of an organization. Caller must be a member.
///
/// # Errors
///
/// Returns `Forbidden` if the caller is not a member.
pub async fn list_members(pool: &PgPool, organization_id: Uuid, caller_id: Uuid) -> Result<Vec<Member>, OrganizationError> {
    require_member(pool, organization_id, caller_id).await?;

    let rows = sqlx::query(
        r"SELECT u.id, u.name, u.email, m.role
          FROM memberships m
          JOIN users u ON u.id = m.user_id
          WHERE m.organization_id = $1
          ORDER BY u.name ASC",
    )
    .bind(organization_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| {
            let role: String = r.get("role");
            Member {
                user_id: r.get("id"),
                name: r.get("name"),
                email: r.get("email"),
                role: Role::parse(&role).unwrap_or(Role::Member),
            }
        })
        .collect())
}

/// Look up an organization by its Stripe customer id.
///
/// # Errors
///
/// Returns `NotFound` (with a nil id) if no organization has that customer.
pub async fn find_by_stripe_customer<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    customer_id: &str,
) -> Result<Uuid, OrganizationError> {
    let row = sqlx::query("SELECT id FROM organizations WHERE stripe_customer_id = $1")
        .bind(customer_id)
        .fetch_optional(executor)
        .await?;
    row.map(|r| r.get("id"))
        .ok_or(OrganizationError::NotFound(Uuid::nil()))
}

/// Set the billing plan for an organization.
///
/// # Errors
///
/// Returns `NotFound` if the organization does not exist.
pub async fn set_plan<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    organization_id: Uuid,
    plan: &str,
) -> Result<(), OrganizationError> {
    let result = sqlx::query("UPDATE organizations SET plan = $2 WHERE id = $1")
        .bind(organization_id)
        .bind(plan)
        .execute(executor)
        .await?;
    if result.rows_affected() == 0 {
        return Err(OrganizationError::NotFound(organization_id));
    }
    Ok(())
}

/// Pick the active organization: the session's choice if still a member,
/// otherwise the first membership.
#[must_use]
pub fn pick_current(organizations: &[OrganizationSummary], preferred: Option<Uuid>) -> Option<OrganizationSummary> {
    preferred
        .and_then(|id| organizations.iter().find(|o| o.id == id))
        .or_else(|| organizations.first())
        .cloned()
}

#[cfg(test)]
#[path = "organization_test.rs"]
mod tests;
