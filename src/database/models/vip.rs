use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct VipAccessGrant {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub employee_id: Uuid,
    pub user_id: Uuid,
    pub reason: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<Uuid>,
}

impl VipAccessGrant {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.deleted_at.is_none() && self.expires_at.map_or(true, |exp| exp > now)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct VipAccessLog {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub employee_id: Uuid,
    pub user_id: Uuid,
    pub action: String,
    pub allowed: bool,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}
