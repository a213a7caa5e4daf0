// handlers/protected/auth.rs - GET /api/auth/whoami

use axum::Extension;
use serde_json::{json, Value};

use crate::middleware::{ApiResponse, ApiResult, AuthUser, ValidatedOrganization};

pub async fn whoami(
    Extension(user): Extension<AuthUser>,
    Extension(org): Extension<ValidatedOrganization>,
) -> ApiResult<Value> {
    Ok(ApiResponse::success(json!({
        "user_id": user.user_id,
        "employee_id": user.employee_id,
        "role": user.role.as_str(),
        "permissions": user.permissions,
        "organization": {
            "id": org.id,
            "name": org.name,
            "slug": org.slug,
            "default_currency": org.default_currency,
        }
    })))
}
