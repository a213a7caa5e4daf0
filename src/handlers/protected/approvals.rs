// handlers/protected/approvals.rs - Approve, reject or cancel a pending request

use axum::{body::Bytes, extract::Path, Extension};

use crate::database::models::approval::ApprovalRequest;
use crate::error::ApiError;
use crate::handlers::protected::parse_id;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, DbPool};
use crate::services::approval_service::{ApprovalService, Decision, DecisionRequest};

/// Approve and reject
pub const DECIDE: &str = "hris:approval-requests:decide";
/// Cancel is checked against the requester, so plain update permission suffices
pub const CANCEL: &str = "hris:approval-requests:update";

/// The `{"comment": ...}` body is optional
fn parse_decision(body: &[u8]) -> Result<DecisionRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(DecisionRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::invalid_json(format!("Invalid decision body: {}", e)))
}

async fn decide(
    user: AuthUser,
    pool: sqlx::PgPool,
    id: String,
    decision: Decision,
    body: Bytes,
) -> ApiResult<ApprovalRequest> {
    let id = parse_id(&id)?;
    let input = parse_decision(&body)?;
    let request = ApprovalService::new(pool, user.organization_id)
        .decide(id, user.user_id, decision, input)
        .await?;
    Ok(ApiResponse::success(request))
}

/// POST /api/hris/approval-requests/:id/approve
pub async fn approve(
    Extension(user): Extension<AuthUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<ApprovalRequest> {
    decide(user, pool, id, Decision::Approve, body).await
}

/// POST /api/hris/approval-requests/:id/reject
pub async fn reject(
    Extension(user): Extension<AuthUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<ApprovalRequest> {
    decide(user, pool, id, Decision::Reject, body).await
}

/// POST /api/hris/approval-requests/:id/cancel
pub async fn cancel(
    Extension(user): Extension<AuthUser>,
    Extension(DbPool(pool)): Extension<DbPool>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<ApprovalRequest> {
    decide(user, pool, id, Decision::Cancel, body).await
}
