// handlers/protected/data/record.rs - /api/:product/:resource/:id

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::handlers::protected::{json_body, parse_id};
use crate::middleware::{ApiResponse, ApiResult, AuthUser, DbPool};
use crate::resources::ResourceDef;
use crate::services::resource_service::ResourceService;

#[derive(Debug, Default, Deserialize)]
pub struct RecordQuery {
    #[serde(default)]
    pub include_deleted: bool,
}

pub async fn get(
    State(def): State<&'static ResourceDef>,
    Extension(user): Extension<AuthUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<String>,
    Query(query): Query<RecordQuery>,
) -> ApiResult<Value> {
    let id = parse_id(&id)?;
    let row = ResourceService::new(def, pool, &user).get(id, query.include_deleted).await?;
    Ok(ApiResponse::success(row))
}

/// PATCH and PUT both apply a partial update
pub async fn update(
    State(def): State<&'static ResourceDef>,
    Extension(user): Extension<AuthUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    let id = parse_id(&id)?;
    let body = json_body(payload)?;
    let row = ResourceService::new(def, pool, &user).update(id, body).await?;
    tracing::info!(table = def.table, %id, user_id = %user.user_id, "Updated record");
    Ok(ApiResponse::success(row))
}

pub async fn delete(
    State(def): State<&'static ResourceDef>,
    Extension(user): Extension<AuthUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let id = parse_id(&id)?;
    let row = ResourceService::new(def, pool, &user).delete(id).await?;
    tracing::info!(table = def.table, %id, user_id = %user.user_id, "Soft-deleted record");
    Ok(ApiResponse::success(row))
}

pub async fn restore(
    State(def): State<&'static ResourceDef>,
    Extension(user): Extension<AuthUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let id = parse_id(&id)?;
    let row = ResourceService::new(def, pool, &user).restore(id).await?;
    tracing::info!(table = def.table, %id, user_id = %user.user_id, "Restored record");
    Ok(ApiResponse::success(row))
}
