// handlers/protected/vip.rs - VIP marking, grants, access checks and the audit log
//
// Marking and grant management need `hris:vip:manage`; access checks, the
// audit log and the VIP listing need `hris:vip:read`.

use axum::{
    extract::{rejection::JsonRejection, Path, Query},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::database::models::vip::{VipAccessGrant, VipAccessLog};
use crate::handlers::protected::{json_body, parse_id};
use crate::middleware::{ApiResponse, ApiResult, AuthUser, DbPool};
use crate::services::vip_service::{AccessDecision, CheckAccessRequest, GrantRequest, MarkVipRequest, VipService};

pub const MANAGE: &str = "hris:vip:manage";
pub const READ: &str = "hris:vip:read";

fn service(pool: sqlx::PgPool, user: &AuthUser) -> VipService {
    VipService::new(pool, user.organization_id)
}

/// POST /api/hris/employees/:id/vip
pub async fn mark(
    Extension(user): Extension<AuthUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<String>,
    payload: Result<Json<MarkVipRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let id = parse_id(&id)?;
    let request = json_body(payload)?;
    let employee = service(pool, &user).mark(id, &user, request).await?;
    Ok(ApiResponse::success(employee))
}

/// DELETE /api/hris/employees/:id/vip
pub async fn unmark(
    Extension(user): Extension<AuthUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let id = parse_id(&id)?;
    let employee = service(pool, &user).unmark(id, &user).await?;
    Ok(ApiResponse::success(employee))
}

/// GET /api/hris/vip-employees
pub async fn list_vip(
    Extension(user): Extension<AuthUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
) -> ApiResult<Vec<Value>> {
    let rows = service(pool, &user).list_vip_employees().await?;
    Ok(ApiResponse::success(rows))
}

#[derive(Debug, Default, Deserialize)]
pub struct GrantListQuery {
    #[serde(default)]
    pub include_revoked: bool,
}

/// GET /api/hris/employees/:id/vip/grants
pub async fn list_grants(
    Extension(user): Extension<AuthUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<String>,
    Query(query): Query<GrantListQuery>,
) -> ApiResult<Vec<VipAccessGrant>> {
    let id = parse_id(&id)?;
    let grants = service(pool, &user).list_grants(id, query.include_revoked).await?;
    Ok(ApiResponse::success(grants))
}

/// POST /api/hris/employees/:id/vip/grants
pub async fn grant(
    Extension(user): Extension<AuthUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<String>,
    payload: Result<Json<GrantRequest>, JsonRejection>,
) -> ApiResult<VipAccessGrant> {
    let id = parse_id(&id)?;
    let request = json_body(payload)?;
    let grant = service(pool, &user).grant(id, user.user_id, request).await?;
    Ok(ApiResponse::created(grant))
}

/// DELETE /api/hris/employees/:id/vip/grants/:grant_id
pub async fn revoke(
    Extension(user): Extension<AuthUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path((id, grant_id)): Path<(String, String)>,
) -> ApiResult<VipAccessGrant> {
    let id = parse_id(&id)?;
    let grant_id = parse_id(&grant_id)?;
    let grant = service(pool, &user).revoke(id, grant_id, user.user_id).await?;
    Ok(ApiResponse::success(grant))
}

/// POST /api/hris/employees/:id/vip/check-access
pub async fn check_access(
    Extension(user): Extension<AuthUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<String>,
    payload: Result<Json<CheckAccessRequest>, JsonRejection>,
) -> ApiResult<AccessDecision> {
    let id = parse_id(&id)?;
    let request = json_body(payload)?;
    let decision = service(pool, &user)
        .check_access(&user, id, request.user_id, &request.action)
        .await?;
    Ok(ApiResponse::success(decision))
}

#[derive(Debug, Default, Deserialize)]
pub struct AccessLogQuery {
    pub limit: Option<i64>,
}

/// GET /api/hris/employees/:id/vip/access-log
pub async fn access_log(
    Extension(user): Extension<AuthUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<String>,
    Query(query): Query<AccessLogQuery>,
) -> ApiResult<Vec<VipAccessLog>> {
    let id = parse_id(&id)?;
    let limit = query.limit.unwrap_or(crate::config::config().filter.default_limit);
    let entries = service(pool, &user).access_log(id, limit).await?;
    Ok(ApiResponse::success(entries))
}
