use serde::Deserialize;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{ServiceError, ServiceResult};
use crate::database::models::organization::Organization;
use crate::database::record::is_currency_code;

const COLUMNS: &str = "id, name, slug, default_currency, is_active, created_at, updated_at, deleted_at";

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrganization {
    pub name: String,
    pub slug: String,
    #[serde(default = "default_currency")]
    pub default_currency: String,
}

fn default_currency() -> String {
    "USD".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateOrganization {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub default_currency: Option<String>,
    pub is_active: Option<bool>,
}

/// Root-level management of the organizations every tenant row hangs off
pub struct OrganizationService {
    pool: PgPool,
}

impl OrganizationService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, input: CreateOrganization) -> ServiceResult<Organization> {
        validate_name(&input.name)?;
        validate_slug(&input.slug)?;
        validate_currency(&input.default_currency)?;

        if self.slug_taken(&input.slug, None).await? {
            return Err(ServiceError::Conflict(format!("Organization slug '{}' already exists", input.slug)));
        }

        let org = sqlx::query_as::<_, Organization>(&format!(
            "INSERT INTO organizations (name, slug, default_currency) VALUES ($1, $2, $3) RETURNING {}",
            COLUMNS
        ))
        .bind(input.name.trim())
        .bind(&input.slug)
        .bind(&input.default_currency)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(organization_id = %org.id, slug = %org.slug, "Created organization");
        Ok(org)
    }

    pub async fn list(&self, include_deleted: bool) -> ServiceResult<Vec<Organization>> {
        let filter = if include_deleted { "" } else { "WHERE deleted_at IS NULL" };
        let orgs = sqlx::query_as::<_, Organization>(&format!(
            "SELECT {} FROM organizations {} ORDER BY name",
            COLUMNS, filter
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(orgs)
    }

    pub async fn show(&self, id: Uuid) -> ServiceResult<Organization> {
        sqlx::query_as::<_, Organization>(&format!("SELECT {} FROM organizations WHERE id = $1", COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Organization {} not found", id)))
    }

    pub async fn update(&self, id: Uuid, input: UpdateOrganization) -> ServiceResult<Organization> {
        if let Some(name) = &input.name { validate_name(name)?; }
        if let Some(slug) = &input.slug {
            validate_slug(slug)?;
            if self.slug_taken(slug, Some(id)).await? {
                return Err(ServiceError::Conflict(format!("Organization slug '{}' already exists", slug)));
            }
        }
        if let Some(currency) = &input.default_currency { validate_currency(currency)?; }

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE organizations SET updated_at = now()");
        if let Some(name) = input.name {
            qb.push(", name = ").push_bind(name.trim().to_string());
        }
        if let Some(slug) = input.slug {
            qb.push(", slug = ").push_bind(slug);
        }
        if let Some(currency) = input.default_currency {
            qb.push(", default_currency = ").push_bind(currency);
        }
        if let Some(active) = input.is_active {
            qb.push(", is_active = ").push_bind(active);
        }
        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" AND deleted_at IS NULL RETURNING ").push(COLUMNS);

        let org = qb
            .build_query_as::<Organization>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Organization {} not found", id)))?;

        tracing::info!(organization_id = %org.id, "Updated organization");
        Ok(org)
    }

    pub async fn delete(&self, id: Uuid) -> ServiceResult<Organization> {
        let org = sqlx::query_as::<_, Organization>(&format!(
            "UPDATE organizations SET deleted_at = now(), updated_at = now() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {}",
            COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Organization {} not found", id)))?;

        tracing::info!(organization_id = %org.id, "Soft-deleted organization");
        Ok(org)
    }

    pub async fn restore(&self, id: Uuid) -> ServiceResult<Organization> {
        let existing = self.show(id).await?;
        if existing.deleted_at.is_none() {
            return Err(ServiceError::InvalidState(format!("Organization {} is not deleted", id)));
        }
        if self.slug_taken(&existing.slug, Some(id)).await? {
            return Err(ServiceError::Conflict(format!(
                "Organization slug '{}' is now used by another organization",
                existing.slug
            )));
        }

        let org = sqlx::query_as::<_, Organization>(&format!(
            "UPDATE organizations SET deleted_at = NULL, updated_at = now() WHERE id = $1 RETURNING {}",
            COLUMNS
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(organization_id = %org.id, "Restored organization");
        Ok(org)
    }

    async fn slug_taken(&self, slug: &str, exclude: Option<Uuid>) -> ServiceResult<bool> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM organizations WHERE slug = $1 AND deleted_at IS NULL \
             AND ($2::uuid IS NULL OR id <> $2))",
        )
        .bind(slug)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }
}

fn validate_name(name: &str) -> Result<(), ServiceError> {
    if name.trim().is_empty() {
        return Err(ServiceError::unprocessable("name", "Organization name must not be empty"));
    }
    Ok(())
}

/// 2-100 characters of lowercase letters, digits, hyphens and underscores
pub fn validate_slug(slug: &str) -> Result<(), ServiceError> {
    if slug.len() < 2 {
        return Err(ServiceError::unprocessable("slug", "Slug must be at least 2 characters"));
    }
    if slug.len() > 100 {
        return Err(ServiceError::unprocessable("slug", "Slug must be at most 100 characters"));
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        return Err(ServiceError::unprocessable(
            "slug",
            "Slug can only contain lowercase letters, numbers, hyphens, and underscores",
        ));
    }
    Ok(())
}

fn validate_currency(code: &str) -> Result<(), ServiceError> {
    if !is_currency_code(code) {
        return Err(ServiceError::unprocessable("default_currency", format!("Invalid currency code: {}", code)));
    }
    Ok(())
}
