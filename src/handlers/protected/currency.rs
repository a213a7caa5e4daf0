// handlers/protected/currency.rs - Exchange rate lookup and conversion

use axum::{
    extract::{rejection::JsonRejection, Query},
    Extension, Json,
};

use crate::handlers::protected::json_body;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, DbPool};
use crate::services::currency_service::{Conversion, ConvertRequest, CurrencyService, RateQuery, ResolvedRate};

pub const CONVERT: &str = "payroll:currency:read";

fn today() -> chrono::NaiveDate {
    chrono::Utc::now().date_naive()
}

/// POST /api/payroll/currency/convert
pub async fn convert(
    Extension(user): Extension<AuthUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    payload: Result<Json<ConvertRequest>, JsonRejection>,
) -> ApiResult<Conversion> {
    let request = json_body(payload)?;
    let on = request.date.unwrap_or_else(today);
    let conversion = CurrencyService::for_organization(pool, user.organization_id)
        .convert(request.amount, &request.from, &request.to, on)
        .await?;
    Ok(ApiResponse::success(conversion))
}

/// GET /api/payroll/currency/rate?from=&to=&date=
pub async fn rate(
    Extension(user): Extension<AuthUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Query(query): Query<RateQuery>,
) -> ApiResult<ResolvedRate> {
    let on = query.date.unwrap_or_else(today);
    let rate = CurrencyService::for_organization(pool, user.organization_id)
        .rate(&query.from, &query.to, on)
        .await?;
    Ok(ApiResponse::success(rate))
}
