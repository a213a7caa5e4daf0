use serde_json::Value;
use sqlx::{PgExecutor, Postgres};
use std::time::Instant;
use uuid::Uuid;

use crate::config;
use crate::database::manager::DatabaseError;
use crate::database::record::{BoundValue, Record};
use crate::filter::SqlResult;
use crate::resources::ColumnKind;

/// Column/value pair for INSERT and UPDATE rendering
pub type Assignment = (&'static str, BoundValue);

pub fn assignments(record: &Record) -> Vec<Assignment> {
    record.fields().iter().map(|(c, v)| (c.name, v.clone())).collect()
}

/// Wrap a data-modifying statement so the affected row comes back as JSON
fn returning_json(statement: String) -> String {
    format!("WITH x AS ({} RETURNING *) SELECT row_to_json(x) FROM x", statement)
}

fn placeholder(params: &mut Vec<Option<String>>, value: &BoundValue) -> String {
    params.push(value.text.clone());
    format!("${}::{}", params.len(), value.kind.pg_type())
}

/// `INSERT ... RETURNING *` with organization and audit columns filled from the caller
pub fn insert(table: &str, organization_id: Uuid, user_id: Uuid, values: &[Assignment]) -> SqlResult {
    let mut params = vec![Some(organization_id.to_string()), Some(user_id.to_string())];
    let mut columns = vec!["\"organization_id\"".to_string(), "\"created_by\"".to_string(), "\"updated_by\"".to_string()];
    let mut placeholders = vec!["$1::uuid".to_string(), "$2::uuid".to_string(), "$2::uuid".to_string()];

    for (name, value) in values {
        columns.push(format!("\"{}\"", name));
        placeholders.push(placeholder(&mut params, value));
    }

    let statement = format!(
        "INSERT INTO \"{}\" ({}) VALUES ({})",
        table,
        columns.join(", "),
        placeholders.join(", ")
    );
    SqlResult { query: returning_json(statement), params }
}

/// Dynamic UPDATE: only the given columns are set, plus `updated_at`/`updated_by`
pub fn update(table: &str, organization_id: Uuid, id: Uuid, user_id: Uuid, values: &[Assignment]) -> SqlResult {
    let mut params = vec![
        Some(organization_id.to_string()),
        Some(id.to_string()),
        Some(user_id.to_string()),
    ];
    let mut sets: Vec<String> = values
        .iter()
        .map(|(name, value)| format!("\"{}\" = {}", name, placeholder(&mut params, value)))
        .collect();
    sets.push("\"updated_at\" = now()".to_string());
    sets.push("\"updated_by\" = $3::uuid".to_string());

    let statement = format!(
        "UPDATE \"{}\" SET {} WHERE \"organization_id\" = $1::uuid AND \"id\" = $2::uuid AND \"deleted_at\" IS NULL",
        table,
        sets.join(", ")
    );
    SqlResult { query: returning_json(statement), params }
}

pub fn soft_delete(table: &str, organization_id: Uuid, id: Uuid, user_id: Uuid) -> SqlResult {
    let statement = format!(
        "UPDATE \"{}\" SET \"deleted_at\" = now(), \"deleted_by\" = $3::uuid, \"updated_at\" = now(), \"updated_by\" = $3::uuid \
         WHERE \"organization_id\" = $1::uuid AND \"id\" = $2::uuid AND \"deleted_at\" IS NULL",
        table
    );
    SqlResult {
        query: returning_json(statement),
        params: vec![Some(organization_id.to_string()), Some(id.to_string()), Some(user_id.to_string())],
    }
}

pub fn restore(table: &str, organization_id: Uuid, id: Uuid, user_id: Uuid) -> SqlResult {
    let statement = format!(
        "UPDATE \"{}\" SET \"deleted_at\" = NULL, \"deleted_by\" = NULL, \"updated_at\" = now(), \"updated_by\" = $3::uuid \
         WHERE \"organization_id\" = $1::uuid AND \"id\" = $2::uuid AND \"deleted_at\" IS NOT NULL",
        table
    );
    SqlResult {
        query: returning_json(statement),
        params: vec![Some(organization_id.to_string()), Some(id.to_string()), Some(user_id.to_string())],
    }
}

/// Single row by id. `lock` adds `FOR UPDATE` for use inside a transaction.
pub fn select_by_id(table: &str, organization_id: Uuid, id: Uuid, include_deleted: bool, lock: bool) -> SqlResult {
    let mut query = format!(
        "SELECT row_to_json(t) FROM \"{}\" t WHERE \"organization_id\" = $1::uuid AND \"id\" = $2::uuid",
        table
    );
    if !include_deleted {
        query.push_str(" AND \"deleted_at\" IS NULL");
    }
    if lock {
        query.push_str(" FOR UPDATE");
    }
    SqlResult { query, params: vec![Some(organization_id.to_string()), Some(id.to_string())] }
}

/// `SELECT EXISTS(...)` over live rows matching every `column = value`, optionally excluding one id
pub fn exists(table: &str, organization_id: Uuid, matches: &[(&str, &BoundValue)], exclude_id: Option<Uuid>) -> SqlResult {
    let mut params = vec![Some(organization_id.to_string())];
    let mut conditions = vec!["\"organization_id\" = $1::uuid".to_string(), "\"deleted_at\" IS NULL".to_string()];
    for (name, value) in matches {
        let p = placeholder(&mut params, value);
        conditions.push(format!("\"{}\" = {}", name, p));
    }
    if let Some(id) = exclude_id {
        let p = placeholder(&mut params, &BoundValue::new(ColumnKind::Uuid, id.to_string()));
        conditions.push(format!("\"id\" <> {}", p));
    }
    SqlResult {
        query: format!("SELECT EXISTS(SELECT 1 FROM \"{}\" WHERE {})", table, conditions.join(" AND ")),
        params,
    }
}

fn log_timing(sql: &SqlResult, started: Instant) {
    let settings = &config::config().database;
    let elapsed = started.elapsed();
    if settings.enable_query_logging {
        tracing::debug!(elapsed_ms = elapsed.as_millis() as u64, "SQL: {}", sql.query);
    }
    if settings.enable_slow_query_warning && elapsed.as_millis() as u64 > settings.slow_query_threshold_ms {
        tracing::warn!(elapsed_ms = elapsed.as_millis() as u64, "Slow query: {}", sql.query);
    }
}

fn json_query(sql: &SqlResult) -> sqlx::query::QueryScalar<'_, Postgres, Value, sqlx::postgres::PgArguments> {
    let mut q = sqlx::query_scalar::<_, Value>(&sql.query);
    for p in &sql.params {
        q = q.bind(p.as_deref());
    }
    q
}

pub async fn fetch_all_json<'c, E>(executor: E, sql: &SqlResult) -> Result<Vec<Value>, DatabaseError>
where
    E: PgExecutor<'c>,
{
    let started = Instant::now();
    let rows = json_query(sql).fetch_all(executor).await.map_err(DatabaseError::from_sqlx);
    log_timing(sql, started);
    rows
}

pub async fn fetch_optional_json<'c, E>(executor: E, sql: &SqlResult) -> Result<Option<Value>, DatabaseError>
where
    E: PgExecutor<'c>,
{
    let started = Instant::now();
    let row = json_query(sql).fetch_optional(executor).await.map_err(DatabaseError::from_sqlx);
    log_timing(sql, started);
    row
}

/// Like `fetch_optional_json` but a missing row is `NotFound`
pub async fn fetch_one_json<'c, E>(executor: E, sql: &SqlResult, what: &str) -> Result<Value, DatabaseError>
where
    E: PgExecutor<'c>,
{
    fetch_optional_json(executor, sql)
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("{} not found", what)))
}

pub async fn fetch_scalar<'c, E, T>(executor: E, sql: &SqlResult) -> Result<T, DatabaseError>
where
    E: PgExecutor<'c>,
    T: Send + Unpin,
    (T,): for<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow>,
{
    let started = Instant::now();
    let mut q = sqlx::query_scalar::<_, T>(&sql.query);
    for p in &sql.params {
        q = q.bind(p.as_deref());
    }
    let value = q.fetch_one(executor).await.map_err(DatabaseError::from_sqlx);
    log_timing(sql, started);
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (Uuid, Uuid, Uuid) {
        (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4())
    }

    #[test]
    fn insert_fills_scope_and_audit_columns() {
        let (org, user, _) = ids();
        let sql = insert(
            "departments",
            org,
            user,
            &[
                ("name", BoundValue::new(ColumnKind::Text, "Engineering")),
                ("code", BoundValue::null(ColumnKind::Text)),
            ],
        );
        assert_eq!(
            sql.query,
            "WITH x AS (INSERT INTO \"departments\" (\"organization_id\", \"created_by\", \"updated_by\", \"name\", \"code\") \
             VALUES ($1::uuid, $2::uuid, $2::uuid, $3::text, $4::text) RETURNING *) SELECT row_to_json(x) FROM x"
        );
        assert_eq!(sql.params, vec![Some(org.to_string()), Some(user.to_string()), Some("Engineering".into()), None]);
    }

    #[test]
    fn update_sets_only_present_columns() {
        let (org, id, user) = ids();
        let sql = update("employees", org, id, user, &[("job_title", BoundValue::new(ColumnKind::Text, "CTO"))]);
        assert_eq!(
            sql.query,
            "WITH x AS (UPDATE \"employees\" SET \"job_title\" = $4::text, \"updated_at\" = now(), \"updated_by\" = $3::uuid \
             WHERE \"organization_id\" = $1::uuid AND \"id\" = $2::uuid AND \"deleted_at\" IS NULL RETURNING *) \
             SELECT row_to_json(x) FROM x"
        );
        assert_eq!(sql.params.len(), 4);
    }

    #[test]
    fn soft_delete_and_restore_target_opposite_states() {
        let (org, id, user) = ids();
        assert!(soft_delete("contracts", org, id, user).query.contains("\"deleted_at\" IS NULL RETURNING"));
        assert!(restore("contracts", org, id, user).query.contains("\"deleted_at\" IS NOT NULL RETURNING"));
    }

    #[test]
    fn exists_excludes_self() {
        let (org, id, _) = ids();
        let email = BoundValue::new(ColumnKind::Text, "a@example.com");
        let sql = exists("employees", org, &[("email", &email)], Some(id));
        assert_eq!(
            sql.query,
            "SELECT EXISTS(SELECT 1 FROM \"employees\" WHERE \"organization_id\" = $1::uuid AND \"deleted_at\" IS NULL \
             AND \"email\" = $2::text AND \"id\" <> $3::uuid)"
        );
        assert_eq!(sql.params[2], Some(id.to_string()));
    }

    #[test]
    fn select_by_id_can_lock() {
        let (org, id, _) = ids();
        let sql = select_by_id("employees", org, id, false, true);
        assert!(sql.query.ends_with("AND \"deleted_at\" IS NULL FOR UPDATE"));
        let sql = select_by_id("employees", org, id, true, false);
        assert!(!sql.query.contains("deleted_at"));
    }
}
