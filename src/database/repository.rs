use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde_json::{Map, Value};
use sqlx::PgPool;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::query_builder::{self as qb, Assignment};
use crate::database::record::{parse_value, BoundValue, Record};
use crate::filter::{Filter, FilterData};
use crate::resources::{ColumnKind, ResourceDef};

/// Generic CRUD for one resource inside one organization
pub struct Repository {
    def: &'static ResourceDef,
    pool: PgPool,
    organization_id: Uuid,
}

impl Repository {
    pub fn new(def: &'static ResourceDef, pool: PgPool, organization_id: Uuid) -> Self {
        Self { def, pool, organization_id }
    }

    pub fn def(&self) -> &'static ResourceDef {
        self.def
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn find(&self, filter_data: FilterData) -> Result<Vec<Value>, DatabaseError> {
        let mut filter = Filter::new(self.def, self.organization_id);
        filter.assign(filter_data)?;
        let sql = filter.to_sql()?;
        qb::fetch_all_json(&self.pool, &sql).await
    }

    pub async fn count(&self, filter_data: FilterData) -> Result<i64, DatabaseError> {
        let mut filter = Filter::new(self.def, self.organization_id);
        filter.assign(filter_data)?;
        let sql = filter.to_count_sql()?;
        qb::fetch_scalar::<_, i64>(&self.pool, &sql).await
    }

    pub async fn get_optional(&self, id: Uuid, include_deleted: bool) -> Result<Option<Value>, DatabaseError> {
        let sql = qb::select_by_id(self.def.table, self.organization_id, id, include_deleted, false);
        qb::fetch_optional_json(&self.pool, &sql).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Value, DatabaseError> {
        self.get_optional(id, false)
            .await?
            .ok_or_else(|| self.not_found(id))
    }

    pub async fn create(&self, user_id: Uuid, record: &Record) -> Result<Value, DatabaseError> {
        self.check_require_one_of(record, None)?;
        self.check_date_ranges(record, None)?;
        self.check_unique(record, None).await?;
        self.check_references(record).await?;

        let sql = qb::insert(self.def.table, self.organization_id, user_id, &qb::assignments(record));
        let row = qb::fetch_one_json(&self.pool, &sql, self.def.table).await?;
        tracing::info!(table = self.def.table, id = ?row.get("id"), "Created record");
        Ok(row)
    }

    /// Dynamic update of the columns present in `record`
    pub async fn update(&self, id: Uuid, user_id: Uuid, record: &Record) -> Result<Value, DatabaseError> {
        if record.is_empty() {
            return Err(crate::database::record::RecordError::Empty.into());
        }
        let existing = self.get(id).await?;
        self.check_mutable_status(&existing)?;
        check_status_lock(self.def, record, &existing)?;
        self.check_require_one_of(record, Some(&existing))?;
        self.check_date_ranges(record, Some(&existing))?;
        self.check_unique(record, Some((id, &existing))).await?;
        self.check_references(record).await?;

        self.update_columns(id, user_id, &qb::assignments(record)).await
    }

    /// Set service-managed columns without the client-facing checks
    pub async fn update_columns(&self, id: Uuid, user_id: Uuid, values: &[Assignment]) -> Result<Value, DatabaseError> {
        let sql = qb::update(self.def.table, self.organization_id, id, user_id, values);
        let row = qb::fetch_optional_json(&self.pool, &sql)
            .await?
            .ok_or_else(|| self.not_found(id))?;
        tracing::info!(table = self.def.table, %id, "Updated record");
        Ok(row)
    }

    pub async fn soft_delete(&self, id: Uuid, user_id: Uuid) -> Result<Value, DatabaseError> {
        let existing = self.get(id).await?;
        self.check_mutable_status(&existing)?;

        let sql = qb::soft_delete(self.def.table, self.organization_id, id, user_id);
        let row = qb::fetch_optional_json(&self.pool, &sql)
            .await?
            .ok_or_else(|| self.not_found(id))?;
        tracing::info!(table = self.def.table, %id, "Soft-deleted record");
        Ok(row)
    }

    /// Bring back a soft-deleted row, unless a live row now holds its unique values
    pub async fn restore(&self, id: Uuid, user_id: Uuid) -> Result<Value, DatabaseError> {
        let existing = self
            .get_optional(id, true)
            .await?
            .ok_or_else(|| self.not_found(id))?;
        if existing.get("deleted_at").map_or(true, Value::is_null) {
            return Err(DatabaseError::InvalidState(format!("{} {} is not deleted", self.def.table, id)));
        }

        for set in self.def.unique {
            let values = self.values_from_row(&existing, set);
            if let Some(values) = values {
                let matches: Vec<(&str, &BoundValue)> = values.iter().map(|(n, v)| (*n, v)).collect();
                let sql = qb::exists(self.def.table, self.organization_id, &matches, Some(id));
                if qb::fetch_scalar::<_, bool>(&self.pool, &sql).await? {
                    return Err(self.conflict(set));
                }
            }
        }

        let sql = qb::restore(self.def.table, self.organization_id, id, user_id);
        let row = qb::fetch_optional_json(&self.pool, &sql)
            .await?
            .ok_or_else(|| self.not_found(id))?;
        tracing::info!(table = self.def.table, %id, "Restored record");
        Ok(row)
    }

    fn not_found(&self, id: Uuid) -> DatabaseError {
        DatabaseError::NotFound(format!("{} {} not found", self.def.table, id))
    }

    fn conflict(&self, columns: &[&str]) -> DatabaseError {
        DatabaseError::Conflict(format!(
            "A {} record with the same {} already exists",
            self.def.table,
            columns.join(", ")
        ))
    }

    fn check_mutable_status(&self, existing: &Value) -> Result<(), DatabaseError> {
        check_mutable_status(self.def, existing)
    }

    fn check_require_one_of(&self, record: &Record, existing: Option<&Value>) -> Result<(), DatabaseError> {
        check_require_one_of(self.def, record, existing)
    }

    fn check_date_ranges(&self, record: &Record, existing: Option<&Value>) -> Result<(), DatabaseError> {
        check_date_ranges(self.def, record, existing)
    }

    /// Each unique set touched by the input is checked against live rows, merged with the stored row on update
    async fn check_unique(&self, record: &Record, existing: Option<(Uuid, &Value)>) -> Result<(), DatabaseError> {
        for set in self.def.unique {
            if !set.iter().any(|c| record.contains(c)) {
                continue;
            }
            let mut values: Vec<(&str, BoundValue)> = Vec::with_capacity(set.len());
            for column in set.iter() {
                let value = match record.get(column) {
                    Some(v) => Some(v.clone()),
                    None => existing.and_then(|(_, row)| self.bound_from_row(row, column)),
                };
                match value {
                    Some(v) if !v.is_null() => values.push((*column, v)),
                    // NULLs never collide
                    _ => break,
                }
            }
            if values.len() != set.len() {
                continue;
            }

            let matches: Vec<(&str, &BoundValue)> = values.iter().map(|(n, v)| (*n, v)).collect();
            let sql = qb::exists(self.def.table, self.organization_id, &matches, existing.map(|(id, _)| id));
            if qb::fetch_scalar::<_, bool>(&self.pool, &sql).await? {
                return Err(self.conflict(set));
            }
        }
        Ok(())
    }

    /// Referenced rows must be live and belong to the same organization
    async fn check_references(&self, record: &Record) -> Result<(), DatabaseError> {
        let mut field_errors = BTreeMap::new();
        for reference in self.def.references {
            let Some(value) = record.get(reference.column).filter(|v| !v.is_null()) else { continue };
            let sql = qb::exists(reference.table, self.organization_id, &[("id", value)], None);
            if !qb::fetch_scalar::<_, bool>(&self.pool, &sql).await? {
                field_errors.insert(
                    reference.column.to_string(),
                    format!("Referenced {} record does not exist", reference.table),
                );
            }
        }
        if field_errors.is_empty() {
            Ok(())
        } else {
            Err(DatabaseError::Unprocessable {
                message: "Referenced records do not exist".to_string(),
                field_errors,
            })
        }
    }

    fn values_from_row(&self, row: &Value, columns: &[&'static str]) -> Option<Vec<(&'static str, BoundValue)>> {
        columns
            .iter()
            .map(|c| self.bound_from_row(row, c).filter(|v| !v.is_null()).map(|v| (*c, v)))
            .collect()
    }

    fn bound_from_row(&self, row: &Value, column: &str) -> Option<BoundValue> {
        let def = self.def.column(column)?;
        let raw = row.get(column).unwrap_or(&Value::Null);
        parse_value(def.kind, raw).ok()
    }
}

/// Generic update/delete are refused once a status-driven resource leaves its mutable states
pub fn check_mutable_status(def: &ResourceDef, existing: &Value) -> Result<(), DatabaseError> {
    let Some(allowed) = def.mutable_statuses else { return Ok(()) };
    let status = existing.get("status").and_then(Value::as_str).unwrap_or_default();
    if allowed.contains(&status) {
        Ok(())
    } else {
        Err(DatabaseError::InvalidState(format!(
            "{} in status '{}' can no longer be modified",
            def.table, status
        )))
    }
}

/// Generic update may not move a row out of a locked status; its dedicated action must
pub fn check_status_lock(def: &ResourceDef, record: &Record, existing: &Value) -> Result<(), DatabaseError> {
    let Some(lock) = def.status_lock else { return Ok(()) };
    if !record.contains(lock.column) {
        return Ok(());
    }
    let current = existing.get(lock.column).and_then(Value::as_str).unwrap_or_default();
    if lock.values.contains(&current) {
        Err(DatabaseError::InvalidState(format!(
            "{} with {} '{}' can only change {} through the {} action",
            def.table, lock.column, current, lock.column, lock.action
        )))
    } else {
        Ok(())
    }
}

/// At least one of `require_one_of` must be non-null after merging input with the stored row
pub fn check_require_one_of(def: &ResourceDef, record: &Record, existing: Option<&Value>) -> Result<(), DatabaseError> {
    if def.require_one_of.is_empty() {
        return Ok(());
    }
    let present = def.require_one_of.iter().any(|column| match record.get(column) {
        Some(v) => !v.is_null(),
        None => existing.and_then(|row| row.get(*column)).map_or(false, |v| !v.is_null()),
    });
    if present {
        return Ok(());
    }
    let message = format!("One of {} is required", def.require_one_of.join(", "));
    let field_errors = def
        .require_one_of
        .iter()
        .map(|c| (c.to_string(), message.clone()))
        .collect();
    Err(DatabaseError::Unprocessable { message, field_errors })
}

/// `start <= end` for every declared range, after merging input with the stored row
pub fn check_date_ranges(def: &ResourceDef, record: &Record, existing: Option<&Value>) -> Result<(), DatabaseError> {
    let merged = merged_values(record, existing);
    for range in def.date_ranges {
        let (Some(start_col), Some(end_col)) = (def.column(range.start), def.column(range.end)) else {
            continue;
        };
        let start = merged.get(range.start).and_then(|v| comparable(start_col.kind, v));
        let end = merged.get(range.end).and_then(|v| comparable(end_col.kind, v));
        if let (Some(start), Some(end)) = (start, end) {
            if start.compare(&end) == Some(Ordering::Greater) {
                return Err(DatabaseError::unprocessable(
                    range.end,
                    format!("{} must not be before {}", range.end, range.start),
                ));
            }
        }
    }
    Ok(())
}

fn merged_values(record: &Record, existing: Option<&Value>) -> Map<String, Value> {
    let mut merged = existing
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    for (column, value) in record.fields() {
        let v = value.text.clone().map(Value::String).unwrap_or(Value::Null);
        merged.insert(column.name.to_string(), v);
    }
    merged
}

/// Comparable form of a range endpoint. Mixed date/timestamp pairs compare on the date.
#[derive(Debug)]
enum Point {
    Date(NaiveDate),
    Instant(DateTime<Utc>),
    Time(NaiveTime),
}

fn comparable(kind: ColumnKind, value: &Value) -> Option<Point> {
    let s = value.as_str()?;
    match kind {
        ColumnKind::Date => NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().map(Point::Date),
        ColumnKind::Timestamp => crate::database::record::parse_timestamp(s).map(Point::Instant),
        ColumnKind::Time => NaiveTime::parse_from_str(s, "%H:%M:%S").ok().map(Point::Time),
        _ => None,
    }
}

impl Point {
    fn compare(&self, other: &Point) -> Option<Ordering> {
        match (self, other) {
            (Point::Date(a), Point::Date(b)) => a.partial_cmp(b),
            (Point::Instant(a), Point::Instant(b)) => a.partial_cmp(b),
            (Point::Time(a), Point::Time(b)) => a.partial_cmp(b),
            (Point::Date(a), Point::Instant(b)) => a.partial_cmp(&b.date_naive()),
            (Point::Instant(a), Point::Date(b)) => a.date_naive().partial_cmp(b),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::record::Operation;
    use crate::resources::{hris, payroll};
    use serde_json::json;

    #[test]
    fn terminated_employee_status_is_locked() {
        let record =
            Record::from_json(&hris::EMPLOYEES, json!({ "employment_status": "active" }), Operation::Update).unwrap();
        let terminated = json!({ "employment_status": "terminated" });
        let err = check_status_lock(&hris::EMPLOYEES, &record, &terminated).unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidState(msg) if msg.contains("rehire")));

        assert!(check_status_lock(&hris::EMPLOYEES, &record, &json!({ "employment_status": "on_leave" })).is_ok());

        // other fields of a terminated employee stay editable
        let record = Record::from_json(&hris::EMPLOYEES, json!({ "job_title": "Advisor" }), Operation::Update).unwrap();
        assert!(check_status_lock(&hris::EMPLOYEES, &record, &terminated).is_ok());
    }

    #[test]
    fn date_range_rejects_inverted_input() {
        let record = Record::from_json(
            &hris::CONTRACTS,
            json!({ "start_date": "2024-06-01", "end_date": "2024-05-31" }),
            Operation::Update,
        )
        .unwrap();
        let err = check_date_ranges(&hris::CONTRACTS, &record, None).unwrap_err();
        assert!(matches!(err, DatabaseError::Unprocessable { field_errors, .. } if field_errors.contains_key("end_date")));
    }

    #[test]
    fn date_range_merges_with_stored_row() {
        let existing = json!({ "start_date": "2024-06-01", "end_date": null });
        let record = Record::from_json(&hris::CONTRACTS, json!({ "end_date": "2024-01-01" }), Operation::Update).unwrap();
        assert!(check_date_ranges(&hris::CONTRACTS, &record, Some(&existing)).is_err());

        let record = Record::from_json(&hris::CONTRACTS, json!({ "end_date": "2024-06-01" }), Operation::Update).unwrap();
        assert!(check_date_ranges(&hris::CONTRACTS, &record, Some(&existing)).is_ok());
    }

    #[test]
    fn timestamp_ranges_compare_instants() {
        let record = Record::from_json(
            &hris::ATTENDANCE_RECORDS,
            json!({ "check_in": "2024-03-01T09:00:00Z", "check_out": "2024-03-01T10:00:00+02:00" }),
            Operation::Update,
        )
        .unwrap();
        assert!(check_date_ranges(&hris::ATTENDANCE_RECORDS, &record, None).is_err());
    }

    #[test]
    fn require_one_of_looks_at_stored_values() {
        let record = Record::from_json(&payroll::DEDUCTIONS, json!({ "name": "Pension" }), Operation::Update).unwrap();
        assert!(check_require_one_of(&payroll::DEDUCTIONS, &record, None).is_err());
        let existing = json!({ "amount": "50.00", "percentage": null });
        assert!(check_require_one_of(&payroll::DEDUCTIONS, &record, Some(&existing)).is_ok());

        let clearing = Record::from_json(&payroll::DEDUCTIONS, json!({ "amount": null }), Operation::Update).unwrap();
        assert!(check_require_one_of(&payroll::DEDUCTIONS, &clearing, Some(&existing)).is_err());
    }

    #[test]
    fn status_guard() {
        assert!(check_mutable_status(&payroll::PAYROLL_RUNS, &json!({ "status": "draft" })).is_ok());
        assert!(matches!(
            check_mutable_status(&payroll::PAYROLL_RUNS, &json!({ "status": "approved" })),
            Err(DatabaseError::InvalidState(_))
        ));
        assert!(check_mutable_status(&hris::DEPARTMENTS, &json!({})).is_ok());
    }
}
