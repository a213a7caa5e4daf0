// handlers/protected/tax.rs - POST /api/payroll/tax/calculate

use axum::{extract::rejection::JsonRejection, Extension, Json};

use crate::handlers::protected::json_body;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, DbPool};
use crate::services::tax_service::{TaxCalculation, TaxRequest, TaxService};

pub const CALCULATE: &str = "payroll:tax:calculate";

pub async fn calculate(
    Extension(user): Extension<AuthUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    payload: Result<Json<TaxRequest>, JsonRejection>,
) -> ApiResult<TaxCalculation> {
    let request = json_body(payload)?;
    let calculation = TaxService::new(pool, user.organization_id).calculate(request).await?;
    Ok(ApiResponse::success(calculation))
}
