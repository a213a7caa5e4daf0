use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PayrollRun {
    pub id: Uuid,
    pub name: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub pay_date: NaiveDate,
    pub currency: String,
    pub status: String,
    pub employee_count: i32,
    pub total_gross: Decimal,
    pub total_deductions: Decimal,
    pub total_taxes: Decimal,
    pub total_net: Decimal,
    pub processed_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Deduction {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub name: String,
    pub amount: Option<Decimal>,
    pub percentage: Option<Decimal>,
    pub is_pre_tax: bool,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TaxRule {
    pub id: Uuid,
    pub jurisdiction: String,
    pub name: String,
    pub tax_type: String,
    pub rate: Option<Decimal>,
    pub brackets: Option<serde_json::Value>,
    pub effective_from: NaiveDate,
    pub effective_to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExchangeRate {
    pub base_currency: String,
    pub quote_currency: String,
    pub rate: Decimal,
    pub effective_date: NaiveDate,
}
