// handlers/elevated/root/organization.rs - /api/root/organizations[/:id[/restore]]
//
// Organizations are not tenant rows, so these handlers take the process-wide
// pool directly rather than the per-request `DbPool` extension.

use axum::{
    extract::{rejection::JsonRejection, Path, Query},
    Extension, Json,
};
use serde::Deserialize;

use crate::database::models::organization::Organization;
use crate::database::DatabaseManager;
use crate::handlers::protected::{json_body, parse_id};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::organization_service::{CreateOrganization, OrganizationService, UpdateOrganization};

async fn service() -> Result<OrganizationService, crate::error::ApiError> {
    Ok(OrganizationService::new(DatabaseManager::pool().await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub include_deleted: bool,
}

pub async fn list(Query(query): Query<ListQuery>) -> ApiResult<Vec<Organization>> {
    let orgs = service().await?.list(query.include_deleted).await?;
    Ok(ApiResponse::success(orgs))
}

pub async fn create(
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<CreateOrganization>, JsonRejection>,
) -> ApiResult<Organization> {
    let input = json_body(payload)?;
    let org = service().await?.create(input).await?;
    tracing::info!(organization_id = %org.id, root_user = %user.user_id, "Organization created by root");
    Ok(ApiResponse::created(org))
}

pub async fn show(Path(id): Path<String>) -> ApiResult<Organization> {
    let id = parse_id(&id)?;
    Ok(ApiResponse::success(service().await?.show(id).await?))
}

pub async fn update(
    Path(id): Path<String>,
    payload: Result<Json<UpdateOrganization>, JsonRejection>,
) -> ApiResult<Organization> {
    let id = parse_id(&id)?;
    let input = json_body(payload)?;
    Ok(ApiResponse::success(service().await?.update(id, input).await?))
}

pub async fn delete(Path(id): Path<String>) -> ApiResult<Organization> {
    let id = parse_id(&id)?;
    Ok(ApiResponse::success(service().await?.delete(id).await?))
}

pub async fn restore(Path(id): Path<String>) -> ApiResult<Organization> {
    let id = parse_id(&id)?;
    Ok(ApiResponse::success(service().await?.restore(id).await?))
}
