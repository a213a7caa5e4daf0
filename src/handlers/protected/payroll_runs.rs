// handlers/protected/payroll_runs.rs - Payroll run lifecycle transitions

use axum::{extract::Path, Extension};

use crate::database::models::payroll::PayrollRun;
use crate::handlers::protected::parse_id;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, DbPool};
use crate::services::payroll_run_service::PayrollRunService;

pub const PROCESS: &str = "payroll:payroll-runs:process";
pub const APPROVE: &str = "payroll:payroll-runs:approve";
pub const PAY: &str = "payroll:payroll-runs:pay";
pub const CANCEL: &str = "payroll:payroll-runs:cancel";

/// POST /api/payroll/payroll-runs/:id/process
pub async fn process(
    Extension(user): Extension<AuthUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<String>,
) -> ApiResult<PayrollRun> {
    let id = parse_id(&id)?;
    let run = PayrollRunService::new(pool, user.organization_id).process(id, user.user_id).await?;
    Ok(ApiResponse::success(run))
}

/// POST /api/payroll/payroll-runs/:id/approve
pub async fn approve(
    Extension(user): Extension<AuthUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<String>,
) -> ApiResult<PayrollRun> {
    let id = parse_id(&id)?;
    let run = PayrollRunService::new(pool, user.organization_id).approve(id, user.user_id).await?;
    Ok(ApiResponse::success(run))
}

/// POST /api/payroll/payroll-runs/:id/pay
pub async fn pay(
    Extension(user): Extension<AuthUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<String>,
) -> ApiResult<PayrollRun> {
    let id = parse_id(&id)?;
    let run = PayrollRunService::new(pool, user.organization_id).pay(id, user.user_id).await?;
    Ok(ApiResponse::success(run))
}

/// POST /api/payroll/payroll-runs/:id/cancel
pub async fn cancel(
    Extension(user): Extension<AuthUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<String>,
) -> ApiResult<PayrollRun> {
    let id = parse_id(&id)?;
    let run = PayrollRunService::new(pool, user.organization_id).cancel(id, user.user_id).await?;
    Ok(ApiResponse::success(run))
}
