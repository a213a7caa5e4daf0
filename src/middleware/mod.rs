pub mod auth;
pub mod permission;
pub mod response;
pub mod validate_organization;

pub use auth::{jwt_auth_middleware, AuthUser};
pub use permission::{require_permission, require_resource_permission, require_restore_permission, require_root, RequiredPermission};
pub use response::{ApiResponse, ApiResult};
pub use validate_organization::{validate_organization_middleware, DbPool, ValidatedOrganization};
