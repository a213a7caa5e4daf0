use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Employee columns the lifecycle and payroll services work with
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Employee {
    pub id: Uuid,
    pub employee_number: String,
    pub first_name: String,
    pub last_name: String,
    pub job_title: Option<String>,
    pub department_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub hire_date: NaiveDate,
    pub termination_date: Option<NaiveDate>,
    pub employment_status: String,
    pub rehire_count: i32,
    pub base_salary: Option<Decimal>,
    pub salary_currency: Option<String>,
    pub pay_frequency: Option<String>,
    pub tax_jurisdiction: Option<String>,
    pub is_vip: bool,
}

impl Employee {
    pub const COLUMNS: &'static str = "id, employee_number, first_name, last_name, job_title, department_id, \
        location_id, hire_date, termination_date, employment_status, rehire_count, base_salary, \
        salary_currency, pay_frequency, tax_jurisdiction, is_vip";
}
