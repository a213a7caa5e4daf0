// handlers/protected/find.rs - POST /api/find/:product/:resource

use axum::{
    extract::{rejection::JsonRejection, Path},
    Extension, Json,
};
use serde_json::Value;

use crate::error::ApiError;
use crate::filter::FilterData;
use crate::handlers::protected::json_body;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, DbPool};
use crate::resources;
use crate::services::resource_service::ResourceService;
use crate::types::Action;

/// Body: `{select, where, order, limit, offset, include_deleted}`
pub async fn find_post(
    Extension(user): Extension<AuthUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path((product, resource)): Path<(String, String)>,
    payload: Result<Json<FilterData>, JsonRejection>,
) -> ApiResult<Vec<Value>> {
    let def = resources::lookup(&product, &resource)
        .ok_or_else(|| ApiError::not_found(format!("Unknown resource {}/{}", product, resource)))?;
    user.require(&def.permission(Action::Read))?;

    let filter_data = json_body(payload)?;
    tracing::debug!(table = def.table, ?filter_data, "Find request");

    let page = ResourceService::new(def, pool, &user).find(filter_data).await?;
    let meta = page.meta();
    Ok(ApiResponse::success(page.rows).with_meta(meta))
}
