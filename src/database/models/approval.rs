use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApprovalRequest {
    pub id: Uuid,
    pub request_type: String,
    pub subject_table: Option<String>,
    pub subject_id: Option<Uuid>,
    pub summary: Option<String>,
    pub status: String,
    pub decided_by: Option<Uuid>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decision_comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
}

impl ApprovalRequest {
    pub const COLUMNS: &'static str = "id, request_type, subject_table, subject_id, summary, status, decided_by, \
        decided_at, decision_comment, created_at, created_by";
}
