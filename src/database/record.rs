use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::resources::{ColumnDef, ColumnKind, ResourceDef, SYSTEM_FIELDS};

/// Whether a payload creates a row (required columns enforced) or patches one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
}

/// Errors that can occur while turning API input into a Record
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("System field '{0}' cannot be set via API input")]
    SystemFieldNotAllowed(String),
    #[error("Unknown field '{0}'")]
    UnknownField(String),
    #[error("Invalid JSON format: {0}")]
    InvalidJson(String),
    #[error("Invalid field values")]
    InvalidFields(BTreeMap<String, String>),
    #[error("No fields to update")]
    Empty,
}

/// A validated value ready to bind: text rendering plus the cast to apply in SQL.
/// `None` binds a typed NULL.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundValue {
    pub kind: ColumnKind,
    pub text: Option<String>,
}

impl BoundValue {
    pub fn new(kind: ColumnKind, text: impl Into<String>) -> Self {
        Self { kind, text: Some(text.into()) }
    }

    pub fn null(kind: ColumnKind) -> Self {
        Self { kind, text: None }
    }

    pub fn uuid(id: uuid::Uuid) -> Self {
        Self::new(ColumnKind::Uuid, id.to_string())
    }

    pub fn is_null(&self) -> bool {
        self.text.is_none()
    }
}

/// Validated column values for one row, in payload order
#[derive(Debug, Clone)]
pub struct Record {
    fields: Vec<(&'static ColumnDef, BoundValue)>,
    operation: Operation,
}

impl Record {
    /// Validate API input against a resource definition
    pub fn from_json(def: &'static ResourceDef, json: Value, operation: Operation) -> Result<Self, RecordError> {
        let map = match json {
            Value::Object(map) => map,
            _ => return Err(RecordError::InvalidJson("Expected JSON object".to_string())),
        };
        Self::from_map(def, map, operation)
    }

    pub fn from_map(
        def: &'static ResourceDef,
        map: Map<String, Value>,
        operation: Operation,
    ) -> Result<Self, RecordError> {
        let mut fields = Vec::with_capacity(map.len());
        let mut errors = BTreeMap::new();

        for (key, value) in map {
            if SYSTEM_FIELDS.contains(&key.as_str()) {
                return Err(RecordError::SystemFieldNotAllowed(key));
            }
            let column = match def.columns.iter().find(|c| c.name == key) {
                Some(c) if c.writable => c,
                Some(_) => return Err(RecordError::SystemFieldNotAllowed(key)),
                None => return Err(RecordError::UnknownField(key)),
            };

            match parse_value(column.kind, &value) {
                Ok(bound) if bound.is_null() && column.required => {
                    errors.insert(key, "This field is required".to_string());
                }
                Ok(bound) => fields.push((column, bound)),
                Err(message) => {
                    errors.insert(key, message);
                }
            }
        }

        if operation == Operation::Create {
            for column in def.writable_columns().filter(|c| c.required) {
                if !fields.iter().any(|(c, _)| c.name == column.name) && !errors.contains_key(column.name) {
                    errors.insert(column.name.to_string(), "This field is required".to_string());
                }
            }
        }

        if !errors.is_empty() {
            return Err(RecordError::InvalidFields(errors));
        }

        Ok(Self { fields, operation })
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[(&'static ColumnDef, BoundValue)] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&BoundValue> {
        self.fields.iter().find(|(c, _)| c.name == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|(c, _)| c.name)
    }
}

/// Validate one JSON value and render it in the canonical text form PostgreSQL accepts for the cast
pub fn parse_value(kind: ColumnKind, value: &Value) -> Result<BoundValue, String> {
    if value.is_null() {
        return Ok(BoundValue::null(kind));
    }

    let text = match kind {
        ColumnKind::Text => {
            let s = value.as_str().ok_or("Expected a string")?;
            if s.trim().is_empty() {
                return Err("Must not be empty".to_string());
            }
            s.to_string()
        }
        ColumnKind::Uuid => {
            let s = value.as_str().ok_or("Expected a UUID string")?;
            uuid::Uuid::parse_str(s)
                .map_err(|_| format!("Invalid UUID format: {}", s))?
                .to_string()
        }
        ColumnKind::Date => {
            let s = value.as_str().ok_or("Expected a date string (YYYY-MM-DD)")?;
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|_| format!("Invalid date format: {}", s))?
                .format("%Y-%m-%d")
                .to_string()
        }
        ColumnKind::Time => {
            let s = value.as_str().ok_or("Expected a time string (HH:MM)")?;
            NaiveTime::parse_from_str(s, "%H:%M:%S")
                .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
                .map_err(|_| format!("Invalid time format: {}", s))?
                .format("%H:%M:%S")
                .to_string()
        }
        ColumnKind::Timestamp => {
            let s = value.as_str().ok_or("Expected an RFC 3339 timestamp")?;
            parse_timestamp(s)
                .ok_or_else(|| format!("Invalid timestamp format: {}", s))?
                .to_rfc3339_opts(SecondsFormat::Micros, true)
        }
        ColumnKind::Numeric => parse_decimal(value).ok_or("Expected a decimal number")?.to_string(),
        ColumnKind::Integer => match value {
            Value::Number(n) => n.as_i64().ok_or("Expected an integer")?.to_string(),
            Value::String(s) => s.trim().parse::<i64>().map_err(|_| "Expected an integer")?.to_string(),
            _ => return Err("Expected an integer".to_string()),
        },
        ColumnKind::Boolean => value.as_bool().ok_or("Expected true or false")?.to_string(),
        ColumnKind::Json => value.to_string(),
        ColumnKind::Choice(options) => {
            let s = value.as_str().ok_or("Expected a string")?;
            if !options.contains(&s) {
                return Err(format!("Must be one of: {}", options.join(", ")));
            }
            s.to_string()
        }
        ColumnKind::Currency => {
            let s = value.as_str().ok_or("Expected a currency code")?;
            if !is_currency_code(s) {
                return Err(format!("Invalid currency code: {}", s));
            }
            s.to_string()
        }
    };

    Ok(BoundValue::new(kind, text))
}

pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc))
}

/// Accepts JSON numbers and numeric strings, including exponent notation
pub fn parse_decimal(value: &Value) -> Option<Decimal> {
    let raw = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .ok()
}

/// Three uppercase ASCII letters
pub fn is_currency_code(s: &str) -> bool {
    s.len() == 3 && s.chars().all(|c| c.is_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{hris, payroll};
    use serde_json::json;

    #[test]
    fn create_requires_required_columns() {
        let err = Record::from_json(&hris::DEPARTMENTS, json!({ "code": "ENG" }), Operation::Create).unwrap_err();
        match err {
            RecordError::InvalidFields(errors) => {
                assert_eq!(errors.get("name").map(String::as_str), Some("This field is required"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn update_is_partial() {
        let record = Record::from_json(&hris::DEPARTMENTS, json!({ "code": "ENG" }), Operation::Update).unwrap();
        assert_eq!(record.field_names().collect::<Vec<_>>(), vec!["code"]);
    }

    #[test]
    fn rejects_system_and_managed_fields() {
        let err = Record::from_json(&hris::DEPARTMENTS, json!({ "id": "x" }), Operation::Update).unwrap_err();
        assert!(matches!(err, RecordError::SystemFieldNotAllowed(f) if f == "id"));

        let err = Record::from_json(&hris::EMPLOYEES, json!({ "is_vip": true }), Operation::Update).unwrap_err();
        assert!(matches!(err, RecordError::SystemFieldNotAllowed(f) if f == "is_vip"));

        let err = Record::from_json(&hris::DEPARTMENTS, json!({ "colour": "red" }), Operation::Update).unwrap_err();
        assert!(matches!(err, RecordError::UnknownField(f) if f == "colour"));
    }

    #[test]
    fn rejects_non_object_payload() {
        let err = Record::from_json(&hris::DEPARTMENTS, json!([1, 2]), Operation::Create).unwrap_err();
        assert!(matches!(err, RecordError::InvalidJson(_)));
    }

    #[test]
    fn collects_every_invalid_field() {
        let err = Record::from_json(
            &hris::EMPLOYEES,
            json!({
                "employee_number": "E-1",
                "first_name": "Ada",
                "last_name": "Lovelace",
                "email": "ada@example.com",
                "hire_date": "2024-02-30",
                "salary_currency": "usd",
                "department_id": "nope",
            }),
            Operation::Create,
        )
        .unwrap_err();
        let RecordError::InvalidFields(errors) = err else { panic!("expected field errors") };
        assert!(errors.contains_key("hire_date"));
        assert!(errors.contains_key("salary_currency"));
        assert!(errors.contains_key("department_id"));
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn terminated_status_is_not_client_settable() {
        let err = Record::from_json(
            &hris::EMPLOYEES,
            json!({ "employment_status": "terminated" }),
            Operation::Update,
        )
        .unwrap_err();
        assert!(matches!(err, RecordError::InvalidFields(e) if e.contains_key("employment_status")));
    }

    #[test]
    fn null_clears_optional_but_not_required_columns() {
        let record = Record::from_json(&hris::DEPARTMENTS, json!({ "code": null }), Operation::Update).unwrap();
        assert!(record.get("code").unwrap().is_null());

        let err = Record::from_json(&hris::DEPARTMENTS, json!({ "name": null }), Operation::Update).unwrap_err();
        assert!(matches!(err, RecordError::InvalidFields(e) if e.contains_key("name")));
    }

    #[test]
    fn values_are_normalized() {
        assert_eq!(
            parse_value(ColumnKind::Numeric, &json!("1.5e3")).unwrap().text.as_deref(),
            Some("1500")
        );
        assert_eq!(parse_value(ColumnKind::Numeric, &json!(12.25)).unwrap().text.as_deref(), Some("12.25"));
        assert_eq!(parse_value(ColumnKind::Time, &json!("09:30")).unwrap().text.as_deref(), Some("09:30:00"));
        assert_eq!(
            parse_value(ColumnKind::Timestamp, &json!("2024-03-01T10:00:00+02:00")).unwrap().text.as_deref(),
            Some("2024-03-01T08:00:00.000000Z")
        );
        assert_eq!(
            parse_value(ColumnKind::Json, &json!(["mon", "fri"])).unwrap().text.as_deref(),
            Some(r#"["mon","fri"]"#)
        );
        assert!(parse_value(ColumnKind::Text, &json!("   ")).is_err());
        assert!(parse_value(ColumnKind::Integer, &json!(1.5)).is_err());
    }

    #[test]
    fn exchange_rate_currency_codes_are_checked() {
        let record = Record::from_json(
            &payroll::EXCHANGE_RATES,
            json!({ "base_currency": "EUR", "quote_currency": "USD", "rate": "1.0842", "effective_date": "2024-05-01" }),
            Operation::Create,
        )
        .unwrap();
        assert_eq!(record.get("rate").unwrap().text.as_deref(), Some("1.0842"));
        assert!(is_currency_code("GBP"));
        assert!(!is_currency_code("GB"));
        assert!(!is_currency_code("gbp"));
    }
}
