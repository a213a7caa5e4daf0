use axum::{extract::Request, middleware::Next, response::Response};
use sqlx::PgPool;
use uuid::Uuid;

use super::auth::AuthUser;
use crate::database::manager::DatabaseManager;
use crate::database::models::organization::Organization;
use crate::error::ApiError;

/// Shared pool handed to handlers once the caller's organization is known to be live
#[derive(Clone)]
pub struct DbPool(pub PgPool);

/// Organization named in the JWT, confirmed active and not deleted
#[derive(Clone, Debug)]
pub struct ValidatedOrganization {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub default_currency: String,
}

impl From<Organization> for ValidatedOrganization {
    fn from(org: Organization) -> Self {
        Self {
            id: org.id,
            name: org.name,
            slug: org.slug,
            default_currency: org.default_currency,
        }
    }
}

/// Runs after `jwt_auth_middleware`; rejects tokens for unknown or deactivated organizations
pub async fn validate_organization_middleware(mut request: Request, next: Next) -> Result<Response, ApiError> {
    let auth_user = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| ApiError::unauthorized("JWT authentication required before organization validation"))?;

    let pool = DatabaseManager::pool().await?;

    let organization = sqlx::query_as::<_, Organization>(
        "SELECT id, name, slug, default_currency, is_active, created_at, updated_at, deleted_at \
         FROM organizations WHERE id = $1 AND is_active = true AND deleted_at IS NULL",
    )
    .bind(auth_user.organization_id)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Database error validating organization: {}", e);
        ApiError::internal_server_error("Failed to validate organization")
    })?
    .ok_or_else(|| {
        tracing::warn!(
            organization_id = %auth_user.organization_id,
            "Organization validation failed: not found or inactive"
        );
        ApiError::forbidden("Organization is not active or does not exist")
    })?;

    tracing::debug!("Organization validated: {} ({})", organization.name, organization.id);

    request.extensions_mut().insert(ValidatedOrganization::from(organization));
    request.extensions_mut().insert(DbPool(pool));

    Ok(next.run(request).await)
}
