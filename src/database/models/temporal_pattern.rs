use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TemporalPattern {
    pub id: Uuid,
    pub name: String,
    pub frequency: String,
    pub interval: Option<i32>,
    pub days_of_week: Option<Value>,
    pub day_of_month: Option<i32>,
    pub month_of_year: Option<i32>,
    pub anchor_date: NaiveDate,
    pub until_date: Option<NaiveDate>,
}

impl TemporalPattern {
    pub const COLUMNS: &'static str = "id, name, frequency, \"interval\", days_of_week, day_of_month, \
        month_of_year, anchor_date, until_date";
}
