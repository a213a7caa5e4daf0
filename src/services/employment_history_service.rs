use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{ServiceError, ServiceResult};
use crate::database::models::employee::Employee;
use crate::database::models::employment_history::EmploymentHistory;

const HISTORY_COLUMNS: &str = "id, organization_id, employee_id, start_date, end_date, job_title, department_id, \
    location_id, termination_reason, termination_type, is_rehire, created_at, created_by";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmploymentStatus {
    Active,
    OnLeave,
    Terminated,
}

impl EmploymentStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(EmploymentStatus::Active),
            "on_leave" => Some(EmploymentStatus::OnLeave),
            "terminated" => Some(EmploymentStatus::Terminated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TerminateRequest {
    pub termination_date: NaiveDate,
    pub reason: Option<String>,
    #[serde(default = "default_termination_type")]
    pub termination_type: String,
}

fn default_termination_type() -> String {
    "voluntary".to_string()
}

pub const TERMINATION_TYPES: &[&str] = &["voluntary", "involuntary", "retirement", "end_of_contract", "other"];

#[derive(Debug, Clone, Deserialize)]
pub struct RehireRequest {
    pub rehire_date: NaiveDate,
    pub job_title: Option<String>,
    pub department_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
}

/// Employee must be active or on leave and the date must not precede the hire date
pub fn validate_termination(employee: &Employee, request: &TerminateRequest) -> ServiceResult<()> {
    match EmploymentStatus::parse(&employee.employment_status) {
        Some(EmploymentStatus::Active) | Some(EmploymentStatus::OnLeave) => {}
        _ => {
            return Err(ServiceError::InvalidState(format!(
                "Employee {} is {} and cannot be terminated",
                employee.id, employee.employment_status
            )))
        }
    }
    if !TERMINATION_TYPES.contains(&request.termination_type.as_str()) {
        return Err(ServiceError::unprocessable(
            "termination_type",
            format!("Must be one of: {}", TERMINATION_TYPES.join(", ")),
        ));
    }
    if request.termination_date < employee.hire_date {
        return Err(ServiceError::unprocessable(
            "termination_date",
            "Termination date cannot be before the hire date",
        ));
    }
    Ok(())
}

/// Employee must be terminated and the rehire must come strictly after the termination
pub fn validate_rehire(employee: &Employee, request: &RehireRequest) -> ServiceResult<()> {
    if EmploymentStatus::parse(&employee.employment_status) != Some(EmploymentStatus::Terminated) {
        return Err(ServiceError::InvalidState(format!(
            "Employee {} is {}; only terminated employees can be rehired",
            employee.id, employee.employment_status
        )));
    }
    if let Some(terminated_on) = employee.termination_date {
        if request.rehire_date <= terminated_on {
            return Err(ServiceError::unprocessable(
                "rehire_date",
                "Rehire date must be after the termination date",
            ));
        }
    }
    Ok(())
}

pub struct EmploymentHistoryService {
    pool: PgPool,
    organization_id: Uuid,
}

impl EmploymentHistoryService {
    pub fn new(pool: PgPool, organization_id: Uuid) -> Self {
        Self { pool, organization_id }
    }

    pub async fn history(&self, employee_id: Uuid) -> ServiceResult<Vec<EmploymentHistory>> {
        // 404 for unknown employees rather than an empty list
        self.load_employee(&self.pool, employee_id, false).await?;
        let rows = sqlx::query_as::<_, EmploymentHistory>(&format!(
            "SELECT {} FROM employment_history WHERE organization_id = $1 AND employee_id = $2 \
             ORDER BY start_date DESC, created_at DESC",
            HISTORY_COLUMNS
        ))
        .bind(self.organization_id)
        .bind(employee_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn terminate(&self, employee_id: Uuid, by: Uuid, request: TerminateRequest) -> ServiceResult<Employee> {
        let mut tx = self.pool.begin().await?;
        let employee = self.lock_employee(&mut tx, employee_id).await?;
        validate_termination(&employee, &request)?;

        let closed = sqlx::query(
            "UPDATE employment_history SET end_date = $3, termination_reason = $4, termination_type = $5 \
             WHERE organization_id = $1 AND employee_id = $2 AND end_date IS NULL",
        )
        .bind(self.organization_id)
        .bind(employee_id)
        .bind(request.termination_date)
        .bind(&request.reason)
        .bind(&request.termination_type)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if closed == 0 {
            // No open period on file: record the whole tenure as closed
            sqlx::query(
                "INSERT INTO employment_history (organization_id, employee_id, start_date, end_date, job_title, \
                 department_id, location_id, termination_reason, termination_type, is_rehire, created_by) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            )
            .bind(self.organization_id)
            .bind(employee_id)
            .bind(employee.hire_date)
            .bind(request.termination_date)
            .bind(&employee.job_title)
            .bind(employee.department_id)
            .bind(employee.location_id)
            .bind(&request.reason)
            .bind(&request.termination_type)
            .bind(employee.rehire_count > 0)
            .bind(by)
            .execute(&mut *tx)
            .await?;
        }

        let updated = sqlx::query_as::<_, Employee>(&format!(
            "UPDATE employees SET employment_status = 'terminated', termination_date = $3, \
             updated_at = now(), updated_by = $4 \
             WHERE organization_id = $1 AND id = $2 RETURNING {}",
            Employee::COLUMNS
        ))
        .bind(self.organization_id)
        .bind(employee_id)
        .bind(request.termination_date)
        .bind(by)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(%employee_id, terminated_on = %request.termination_date, "Terminated employee");
        Ok(updated)
    }

    pub async fn rehire(&self, employee_id: Uuid, by: Uuid, request: RehireRequest) -> ServiceResult<Employee> {
        let mut tx = self.pool.begin().await?;
        let employee = self.lock_employee(&mut tx, employee_id).await?;
        validate_rehire(&employee, &request)?;

        for (column, table, value) in [
            ("department_id", "departments", request.department_id),
            ("location_id", "locations", request.location_id),
        ] {
            let Some(id) = value else { continue };
            let exists: bool = sqlx::query_scalar(&format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE organization_id = $1 AND id = $2 AND deleted_at IS NULL)",
                table
            ))
            .bind(self.organization_id)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
            if !exists {
                return Err(ServiceError::unprocessable(column, format!("Referenced {} record does not exist", table)));
            }
        }

        let job_title = request.job_title.clone().or_else(|| employee.job_title.clone());
        let department_id = request.department_id.or(employee.department_id);
        let location_id = request.location_id.or(employee.location_id);

        sqlx::query(
            "INSERT INTO employment_history (organization_id, employee_id, start_date, job_title, department_id, \
             location_id, is_rehire, created_by) VALUES ($1, $2, $3, $4, $5, $6, true, $7)",
        )
        .bind(self.organization_id)
        .bind(employee_id)
        .bind(request.rehire_date)
        .bind(&job_title)
        .bind(department_id)
        .bind(location_id)
        .bind(by)
        .execute(&mut *tx)
        .await?;

        let updated = sqlx::query_as::<_, Employee>(&format!(
            "UPDATE employees SET employment_status = 'active', hire_date = $3, termination_date = NULL, \
             rehire_count = rehire_count + 1, job_title = $4, department_id = $5, location_id = $6, \
             updated_at = now(), updated_by = $7 \
             WHERE organization_id = $1 AND id = $2 RETURNING {}",
            Employee::COLUMNS
        ))
        .bind(self.organization_id)
        .bind(employee_id)
        .bind(request.rehire_date)
        .bind(&job_title)
        .bind(department_id)
        .bind(location_id)
        .bind(by)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(%employee_id, rehired_on = %request.rehire_date, rehire_count = updated.rehire_count, "Rehired employee");
        Ok(updated)
    }

    async fn lock_employee(&self, tx: &mut Transaction<'_, Postgres>, employee_id: Uuid) -> ServiceResult<Employee> {
        self.load_employee(&mut **tx, employee_id, true).await
    }

    async fn load_employee<'c, E>(&self, executor: E, employee_id: Uuid, lock: bool) -> ServiceResult<Employee>
    where
        E: sqlx::PgExecutor<'c>,
    {
        let lock = if lock { " FOR UPDATE" } else { "" };
        sqlx::query_as::<_, Employee>(&format!(
            "SELECT {} FROM employees WHERE organization_id = $1 AND id = $2 AND deleted_at IS NULL{}",
            Employee::COLUMNS,
            lock
        ))
        .bind(self.organization_id)
        .bind(employee_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Employee {} not found", employee_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn employee(status: &str, hire: &str, terminated: Option<&str>) -> Employee {
        Employee {
            id: Uuid::new_v4(),
            employee_number: "E-100".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            job_title: Some("Engineer".into()),
            department_id: None,
            location_id: None,
            hire_date: hire.parse().unwrap(),
            termination_date: terminated.map(|d| d.parse().unwrap()),
            employment_status: status.into(),
            rehire_count: 0,
            base_salary: None,
            salary_currency: None,
            pay_frequency: None,
            tax_jurisdiction: None,
            is_vip: false,
        }
    }

    fn terminate_on(date: &str) -> TerminateRequest {
        TerminateRequest { termination_date: date.parse().unwrap(), reason: None, termination_type: "voluntary".into() }
    }

    fn rehire_on(date: &str) -> RehireRequest {
        RehireRequest { rehire_date: date.parse().unwrap(), job_title: None, department_id: None, location_id: None }
    }

    #[test]
    fn termination_rules() {
        let active = employee("active", "2020-01-01", None);
        assert!(validate_termination(&active, &terminate_on("2024-06-30")).is_ok());
        assert!(validate_termination(&active, &terminate_on("2020-01-01")).is_ok());
        assert!(matches!(
            validate_termination(&active, &terminate_on("2019-12-31")),
            Err(ServiceError::Unprocessable { .. })
        ));
        assert!(validate_termination(&employee("on_leave", "2020-01-01", None), &terminate_on("2024-01-01")).is_ok());

        let gone = employee("terminated", "2020-01-01", Some("2023-01-01"));
        assert!(matches!(
            validate_termination(&gone, &terminate_on("2024-01-01")),
            Err(ServiceError::InvalidState(_))
        ));

        let mut odd = terminate_on("2024-01-01");
        odd.termination_type = "sabbatical".into();
        assert!(validate_termination(&active, &odd).is_err());
    }

    #[test]
    fn rehire_rules() {
        let gone = employee("terminated", "2020-01-01", Some("2023-01-01"));
        assert!(validate_rehire(&gone, &rehire_on("2023-01-02")).is_ok());
        assert!(matches!(
            validate_rehire(&gone, &rehire_on("2023-01-01")),
            Err(ServiceError::Unprocessable { .. })
        ));
        assert!(matches!(
            validate_rehire(&employee("active", "2020-01-01", None), &rehire_on("2024-01-01")),
            Err(ServiceError::InvalidState(_))
        ));
    }

    #[test]
    fn terminate_request_defaults_type() {
        let req: TerminateRequest =
            serde_json::from_value(serde_json::json!({ "termination_date": "2024-03-31" })).unwrap();
        assert_eq!(req.termination_type, "voluntary");
    }
}
