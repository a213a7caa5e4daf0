// handlers/protected/mod.rs - JWT + organization protected endpoints
//
// Every handler here runs behind `jwt_auth_middleware` and
// `validate_organization_middleware`, so `AuthUser`, `ValidatedOrganization`
// and `DbPool` are always present in the request extensions.

pub mod approvals;
pub mod auth;
pub mod currency;
pub mod data;
pub mod employment;
pub mod find;
pub mod payroll_runs;
pub mod tax;
pub mod temporal;
pub mod vip;

use axum::extract::rejection::JsonRejection;
use axum::Json;
use uuid::Uuid;

use crate::error::ApiError;

/// Parse a path id, answering 400 in the JSON error shape instead of axum's plain-text rejection
pub fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::bad_request(format!("Invalid id '{}'", raw)))
}

/// Unwrap a JSON body extractor, mapping rejections to `INVALID_JSON`
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(body)| body).map_err(ApiError::from)
}
