//! VIP / restricted employees.
//!
//! Restricted fields of a VIP employee are only visible or editable to the
//! employee themselves, admins, and users holding an active allow-list grant.
//! Every evaluation is recorded in `vip_access_log`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::PgPool;
use std::collections::HashSet;
use uuid::Uuid;

use super::{ServiceError, ServiceResult};
use crate::config;
use crate::database::models::employee::Employee;
use crate::database::models::vip::{VipAccessGrant, VipAccessLog};
use crate::middleware::AuthUser;

/// Why access was allowed or denied, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessReason {
    NotRestricted,
    SelfAccess,
    AdminOverride,
    ExplicitGrant,
    NotAuthorized,
    /// Administrative change by a non-admin holding the VIP management permission
    ManagePermission,
}

impl AccessReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessReason::NotRestricted => "not_restricted",
            AccessReason::SelfAccess => "self_access",
            AccessReason::AdminOverride => "admin_override",
            AccessReason::ExplicitGrant => "explicit_grant",
            AccessReason::NotAuthorized => "not_authorized",
            AccessReason::ManagePermission => "manage_permission",
        }
    }

    pub fn allowed(&self) -> bool {
        !matches!(self, AccessReason::NotAuthorized)
    }
}

/// Facts the decision is made from
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessContext {
    pub is_vip: bool,
    pub is_self: bool,
    pub is_admin: bool,
    pub has_active_grant: bool,
}

pub fn evaluate_vip_access(ctx: &AccessContext) -> AccessReason {
    if !ctx.is_vip {
        AccessReason::NotRestricted
    } else if ctx.is_self {
        AccessReason::SelfAccess
    } else if ctx.is_admin {
        AccessReason::AdminOverride
    } else if ctx.has_active_grant {
        AccessReason::ExplicitGrant
    } else {
        AccessReason::NotAuthorized
    }
}

/// Reason recorded for marking and unmarking, which are permission-gated rather than evaluated
pub fn management_reason(is_admin: bool) -> AccessReason {
    if is_admin {
        AccessReason::AdminOverride
    } else {
        AccessReason::ManagePermission
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessDecision {
    pub employee_id: Uuid,
    pub user_id: Uuid,
    pub action: String,
    pub allowed: bool,
    pub reason: AccessReason,
}

/// Null out restricted fields and list what was hidden under `redacted_fields`
pub fn redact(row: &mut Value, restricted: &[&str]) {
    let Some(obj) = row.as_object_mut() else { return };
    let mut redacted = Vec::new();
    for field in restricted {
        if let Some(value) = obj.get_mut(*field) {
            if !value.is_null() {
                *value = Value::Null;
            }
            redacted.push(*field);
        }
    }
    obj.insert("redacted_fields".to_string(), json!(redacted));
}

pub fn row_is_vip(row: &Value) -> bool {
    row.get("is_vip").and_then(Value::as_bool).unwrap_or(false)
}

pub fn row_id(row: &Value) -> Option<Uuid> {
    row.get("id").and_then(Value::as_str).and_then(|s| Uuid::parse_str(s).ok())
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarkVipRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GrantRequest {
    pub user_id: Uuid,
    pub reason: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckAccessRequest {
    /// Defaults to the caller
    pub user_id: Option<Uuid>,
    #[serde(default = "default_action")]
    pub action: String,
}

fn default_action() -> String {
    "read".to_string()
}

const GRANT_COLUMNS: &str =
    "id, organization_id, employee_id, user_id, reason, expires_at, created_at, created_by, deleted_at, deleted_by";

pub struct VipService {
    pool: PgPool,
    organization_id: Uuid,
}

impl VipService {
    pub fn new(pool: PgPool, organization_id: Uuid) -> Self {
        Self { pool, organization_id }
    }

    async fn employee(&self, employee_id: Uuid) -> ServiceResult<Employee> {
        sqlx::query_as::<_, Employee>(&format!(
            "SELECT {} FROM employees WHERE organization_id = $1 AND id = $2 AND deleted_at IS NULL",
            Employee::COLUMNS
        ))
        .bind(self.organization_id)
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Employee {} not found", employee_id)))
    }

    pub async fn mark(&self, employee_id: Uuid, user: &AuthUser, request: MarkVipRequest) -> ServiceResult<Value> {
        let by = user.user_id;
        let employee = self.employee(employee_id).await?;
        if employee.is_vip {
            return Err(ServiceError::Conflict(format!("Employee {} is already marked as VIP", employee_id)));
        }

        let row: Value = sqlx::query_scalar(
            "WITH x AS (UPDATE employees SET is_vip = true, vip_reason = $3, vip_marked_by = $4, \
             vip_marked_at = now(), updated_at = now(), updated_by = $4 \
             WHERE organization_id = $1 AND id = $2 AND deleted_at IS NULL RETURNING *) \
             SELECT row_to_json(x) FROM x",
        )
        .bind(self.organization_id)
        .bind(employee_id)
        .bind(request.reason)
        .bind(by)
        .fetch_one(&self.pool)
        .await?;

        self.audit(employee_id, by, "mark_vip", management_reason(user.is_admin())).await?;
        tracing::info!(%employee_id, marked_by = %by, "Marked employee as VIP");
        Ok(row)
    }

    pub async fn unmark(&self, employee_id: Uuid, user: &AuthUser) -> ServiceResult<Value> {
        let by = user.user_id;
        let employee = self.employee(employee_id).await?;
        if !employee.is_vip {
            return Err(ServiceError::Conflict(format!("Employee {} is not marked as VIP", employee_id)));
        }

        let mut tx = self.pool.begin().await?;
        let row: Value = sqlx::query_scalar(
            "WITH x AS (UPDATE employees SET is_vip = false, vip_reason = NULL, vip_marked_by = NULL, \
             vip_marked_at = NULL, updated_at = now(), updated_by = $3 \
             WHERE organization_id = $1 AND id = $2 AND deleted_at IS NULL RETURNING *) \
             SELECT row_to_json(x) FROM x",
        )
        .bind(self.organization_id)
        .bind(employee_id)
        .bind(by)
        .fetch_one(&mut *tx)
        .await?;

        // Grants only mean something while the employee is restricted
        sqlx::query(
            "UPDATE vip_access_grants SET deleted_at = now(), deleted_by = $3 \
             WHERE organization_id = $1 AND employee_id = $2 AND deleted_at IS NULL",
        )
        .bind(self.organization_id)
        .bind(employee_id)
        .bind(by)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        self.audit(employee_id, by, "unmark_vip", management_reason(user.is_admin())).await?;
        tracing::info!(%employee_id, unmarked_by = %by, "Removed VIP mark from employee");
        Ok(row)
    }

    pub async fn list_vip_employees(&self) -> ServiceResult<Vec<Value>> {
        let rows: Vec<Value> = sqlx::query_scalar(
            "SELECT json_build_object('id', id, 'employee_number', employee_number, 'first_name', first_name, \
             'last_name', last_name, 'vip_reason', vip_reason, 'vip_marked_by', vip_marked_by, \
             'vip_marked_at', vip_marked_at) \
             FROM employees WHERE organization_id = $1 AND is_vip = true AND deleted_at IS NULL \
             ORDER BY last_name, first_name",
        )
        .bind(self.organization_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn list_grants(&self, employee_id: Uuid, include_revoked: bool) -> ServiceResult<Vec<VipAccessGrant>> {
        self.employee(employee_id).await?;
        let revoked = if include_revoked { "" } else { "AND deleted_at IS NULL" };
        let grants = sqlx::query_as::<_, VipAccessGrant>(&format!(
            "SELECT {} FROM vip_access_grants WHERE organization_id = $1 AND employee_id = $2 {} \
             ORDER BY created_at DESC",
            GRANT_COLUMNS, revoked
        ))
        .bind(self.organization_id)
        .bind(employee_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(grants)
    }

    pub async fn grant(&self, employee_id: Uuid, by: Uuid, request: GrantRequest) -> ServiceResult<VipAccessGrant> {
        let employee = self.employee(employee_id).await?;
        if !employee.is_vip {
            return Err(ServiceError::InvalidState(format!(
                "Employee {} is not marked as VIP",
                employee_id
            )));
        }
        if let Some(expires_at) = request.expires_at {
            if expires_at <= Utc::now() {
                return Err(ServiceError::unprocessable("expires_at", "Expiry must be in the future"));
            }
        }

        let existing: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM vip_access_grants WHERE organization_id = $1 AND employee_id = $2 \
             AND user_id = $3 AND deleted_at IS NULL)",
        )
        .bind(self.organization_id)
        .bind(employee_id)
        .bind(request.user_id)
        .fetch_one(&self.pool)
        .await?;
        if existing {
            return Err(ServiceError::Conflict(format!(
                "User {} already has access to employee {}",
                request.user_id, employee_id
            )));
        }

        let grant = sqlx::query_as::<_, VipAccessGrant>(&format!(
            "INSERT INTO vip_access_grants (organization_id, employee_id, user_id, reason, expires_at, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            GRANT_COLUMNS
        ))
        .bind(self.organization_id)
        .bind(employee_id)
        .bind(request.user_id)
        .bind(request.reason)
        .bind(request.expires_at)
        .bind(by)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(%employee_id, grantee = %grant.user_id, granted_by = %by, "Granted VIP access");
        Ok(grant)
    }

    pub async fn revoke(&self, employee_id: Uuid, grant_id: Uuid, by: Uuid) -> ServiceResult<VipAccessGrant> {
        let grant = sqlx::query_as::<_, VipAccessGrant>(&format!(
            "UPDATE vip_access_grants SET deleted_at = now(), deleted_by = $4 \
             WHERE organization_id = $1 AND employee_id = $2 AND id = $3 AND deleted_at IS NULL RETURNING {}",
            GRANT_COLUMNS
        ))
        .bind(self.organization_id)
        .bind(employee_id)
        .bind(grant_id)
        .bind(by)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Grant {} not found", grant_id)))?;

        tracing::info!(%employee_id, grantee = %grant.user_id, revoked_by = %by, "Revoked VIP access");
        Ok(grant)
    }

    /// Evaluate and record access of `user_id` (acting with `requester`'s role when it is the caller)
    pub async fn check_access(
        &self,
        requester: &AuthUser,
        employee_id: Uuid,
        subject_user: Option<Uuid>,
        action: &str,
    ) -> ServiceResult<AccessDecision> {
        let employee = self.employee(employee_id).await?;
        let user_id = subject_user.unwrap_or(requester.user_id);
        let asking_for_self = user_id == requester.user_id;

        let has_active_grant = if employee.is_vip {
            self.active_grant_employee_ids(user_id).await?.contains(&employee_id)
        } else {
            false
        };
        let ctx = AccessContext {
            is_vip: employee.is_vip,
            // identity and role are only known for the caller
            is_self: asking_for_self && requester.employee_id == Some(employee_id),
            is_admin: asking_for_self && requester.is_admin(),
            has_active_grant,
        };
        let reason = evaluate_vip_access(&ctx);

        self.audit(employee_id, user_id, action, reason).await?;
        Ok(AccessDecision {
            employee_id,
            user_id,
            action: action.to_string(),
            allowed: reason.allowed(),
            reason,
        })
    }

    pub async fn access_log(&self, employee_id: Uuid, limit: i64) -> ServiceResult<Vec<VipAccessLog>> {
        self.employee(employee_id).await?;
        let limit = limit.clamp(1, config::config().filter.max_limit);
        let entries = sqlx::query_as::<_, VipAccessLog>(
            "SELECT id, organization_id, employee_id, user_id, action, allowed, reason, created_at \
             FROM vip_access_log WHERE organization_id = $1 AND employee_id = $2 \
             ORDER BY created_at DESC LIMIT $3",
        )
        .bind(self.organization_id)
        .bind(employee_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    /// Redact restricted fields on every VIP row the caller may not see, logging each decision
    pub async fn apply_read_restrictions(
        &self,
        user: &AuthUser,
        rows: &mut [Value],
        restricted: &[&str],
    ) -> ServiceResult<()> {
        if !rows.iter().any(row_is_vip) {
            return Ok(());
        }
        let granted = self.active_grant_employee_ids(user.user_id).await?;

        for row in rows.iter_mut().filter(|r| row_is_vip(r)) {
            let Some(employee_id) = row_id(row) else { continue };
            let ctx = AccessContext {
                is_vip: true,
                is_self: user.employee_id == Some(employee_id),
                is_admin: user.is_admin(),
                has_active_grant: granted.contains(&employee_id),
            };
            let reason = evaluate_vip_access(&ctx);
            self.audit(employee_id, user.user_id, "read", reason).await?;
            if !reason.allowed() {
                redact(row, restricted);
            }
        }
        Ok(())
    }

    /// Employees the user currently holds an unexpired, unrevoked grant for
    pub async fn active_grant_employee_ids(&self, user_id: Uuid) -> ServiceResult<HashSet<Uuid>> {
        let grants = sqlx::query_as::<_, VipAccessGrant>(&format!(
            "SELECT {} FROM vip_access_grants WHERE organization_id = $1 AND user_id = $2 AND deleted_at IS NULL",
            GRANT_COLUMNS
        ))
        .bind(self.organization_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        let now = Utc::now();
        Ok(grants
            .into_iter()
            .filter(|g| g.is_active_at(now))
            .map(|g| g.employee_id)
            .collect())
    }

    async fn audit(&self, employee_id: Uuid, user_id: Uuid, action: &str, reason: AccessReason) -> ServiceResult<()> {
        sqlx::query(
            "INSERT INTO vip_access_log (organization_id, employee_id, user_id, action, allowed, reason) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(self.organization_id)
        .bind(employee_id)
        .bind(user_id)
        .bind(action)
        .bind(reason.allowed())
        .bind(reason.as_str())
        .execute(&self.pool)
        .await?;

        if !reason.allowed() {
            tracing::warn!(%employee_id, %user_id, action, "VIP access denied");
        } else if config::config().security.enable_audit_logging {
            tracing::info!(%employee_id, %user_id, action, reason = reason.as_str(), "VIP access granted");
        }
        Ok(())
    }
}
