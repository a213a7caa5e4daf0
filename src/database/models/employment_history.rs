use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One tenure period. `end_date` is NULL while the period is open.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EmploymentHistory {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub employee_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub job_title: Option<String>,
    pub department_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub termination_reason: Option<String>,
    pub termination_type: Option<String>,
    pub is_rehire: bool,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
}
