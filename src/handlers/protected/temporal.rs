// handlers/protected/temporal.rs - Temporal pattern evaluation

use axum::{
    extract::{rejection::JsonRejection, Path, Query},
    Extension, Json,
};

use crate::handlers::protected::{json_body, parse_id};
use crate::middleware::{ApiResponse, ApiResult, AuthUser, DbPool};
use crate::services::temporal_pattern_service::{
    EvaluateRequest, Evaluation, Occurrences, OccurrencesQuery, TemporalPatternService,
};

pub const READ: &str = "hris:temporal-patterns:read";

/// POST /api/hris/temporal-patterns/:id/evaluate
pub async fn evaluate(
    Extension(user): Extension<AuthUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<String>,
    payload: Result<Json<EvaluateRequest>, JsonRejection>,
) -> ApiResult<Evaluation> {
    let id = parse_id(&id)?;
    let request = json_body(payload)?;
    let evaluation = TemporalPatternService::new(pool, user.organization_id).evaluate(id, request).await?;
    Ok(ApiResponse::success(evaluation))
}

/// GET /api/hris/temporal-patterns/:id/occurrences?from=&to=&limit=
pub async fn occurrences(
    Extension(user): Extension<AuthUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<String>,
    Query(query): Query<OccurrencesQuery>,
) -> ApiResult<Occurrences> {
    let id = parse_id(&id)?;
    let occurrences = TemporalPatternService::new(pool, user.organization_id).occurrences(id, query).await?;
    Ok(ApiResponse::success(occurrences))
}
