// handlers/protected/employment.rs - Employment history, termination and rehire

use axum::{
    extract::{rejection::JsonRejection, Path},
    Extension, Json,
};

use serde_json::Value;
use sqlx::PgPool;

use crate::database::models::employee::Employee;
use crate::database::models::employment_history::EmploymentHistory;
use crate::error::ApiError;
use crate::handlers::protected::{json_body, parse_id};
use crate::middleware::{ApiResponse, ApiResult, AuthUser, DbPool};
use crate::resources::hris;
use crate::services::employment_history_service::{EmploymentHistoryService, RehireRequest, TerminateRequest};
use crate::services::vip_service::VipService;

pub const READ: &str = "hris:employment-history:read";
pub const MANAGE: &str = "hris:employment-history:manage";

/// GET /api/hris/employees/:id/history
pub async fn history(
    Extension(user): Extension<AuthUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<String>,
) -> ApiResult<Vec<EmploymentHistory>> {
    let id = parse_id(&id)?;
    let periods = EmploymentHistoryService::new(pool, user.organization_id).history(id).await?;
    Ok(ApiResponse::success(periods))
}

/// POST /api/hris/employees/:id/terminate
pub async fn terminate(
    Extension(user): Extension<AuthUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<String>,
    payload: Result<Json<TerminateRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let id = parse_id(&id)?;
    let request = json_body(payload)?;
    let employee = EmploymentHistoryService::new(pool.clone(), user.organization_id)
        .terminate(id, user.user_id, request)
        .await?;
    Ok(ApiResponse::success(restricted_view(pool, &user, employee).await?))
}

/// POST /api/hris/employees/:id/rehire
pub async fn rehire(
    Extension(user): Extension<AuthUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<String>,
    payload: Result<Json<RehireRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let id = parse_id(&id)?;
    let request = json_body(payload)?;
    let employee = EmploymentHistoryService::new(pool.clone(), user.organization_id)
        .rehire(id, user.user_id, request)
        .await?;
    Ok(ApiResponse::success(restricted_view(pool, &user, employee).await?))
}

/// The lifecycle routes answer with the same VIP view as the generic employee routes
async fn restricted_view(pool: PgPool, user: &AuthUser, employee: Employee) -> Result<Value, ApiError> {
    let mut row = serde_json::to_value(employee).map_err(|e| ApiError::internal_server_error(e.to_string()))?;
    if let Some(guard) = hris::EMPLOYEES.vip_guard {
        VipService::new(pool, user.organization_id)
            .apply_read_restrictions(user, std::slice::from_mut(&mut row), guard.restricted_fields)
            .await?;
    }
    Ok(row)
}
