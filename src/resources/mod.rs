//! Static descriptions of every table exposed through the generic CRUD routes.
//!
//! A `ResourceDef` is the single source of truth for which columns a client may
//! write, how each value is validated and cast, which column sets must be unique
//! inside an organization and which columns reference other tables.

pub mod hris;
pub mod payroll;

use crate::types::{Action, Product};

/// Column value type. Determines validation and the PostgreSQL cast of the bound parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Uuid,
    Date,
    Time,
    Timestamp,
    Numeric,
    Integer,
    Boolean,
    Json,
    /// Text restricted to a fixed set of values
    Choice(&'static [&'static str]),
    /// ISO 4217 alphabetic code
    Currency,
}

impl ColumnKind {
    pub fn pg_type(&self) -> &'static str {
        match self {
            ColumnKind::Text | ColumnKind::Choice(_) | ColumnKind::Currency => "text",
            ColumnKind::Uuid => "uuid",
            ColumnKind::Date => "date",
            ColumnKind::Time => "time",
            ColumnKind::Timestamp => "timestamptz",
            ColumnKind::Numeric => "numeric",
            ColumnKind::Integer => "bigint",
            ColumnKind::Boolean => "boolean",
            ColumnKind::Json => "jsonb",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnDef {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub required: bool,
    pub writable: bool,
}

/// Optional client-writable column
pub const fn column(name: &'static str, kind: ColumnKind) -> ColumnDef {
    ColumnDef { name, kind, required: false, writable: true }
}

/// Client-writable column that must be present on create
pub const fn required(name: &'static str, kind: ColumnKind) -> ColumnDef {
    ColumnDef { name, kind, required: true, writable: true }
}

/// Column maintained by the service; readable and filterable, never writable
pub const fn managed(name: &'static str, kind: ColumnKind) -> ColumnDef {
    ColumnDef { name, kind, required: false, writable: false }
}

/// Columns present on every tenant table
pub const SYSTEM_COLUMNS: &[ColumnDef] = &[
    managed("id", ColumnKind::Uuid),
    managed("created_at", ColumnKind::Timestamp),
    managed("updated_at", ColumnKind::Timestamp),
    managed("created_by", ColumnKind::Uuid),
    managed("updated_by", ColumnKind::Uuid),
    managed("deleted_at", ColumnKind::Timestamp),
    managed("deleted_by", ColumnKind::Uuid),
];

/// System field names clients may never send
pub const SYSTEM_FIELDS: &[&str] = &[
    "id",
    "organization_id",
    "created_at",
    "updated_at",
    "created_by",
    "updated_by",
    "deleted_at",
    "deleted_by",
];

#[derive(Debug, Clone, Copy)]
pub struct Reference {
    pub column: &'static str,
    pub table: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct DateRange {
    pub start: &'static str,
    pub end: &'static str,
}

/// Employee-style rows whose `restricted_fields` need VIP authorization
#[derive(Debug, Clone, Copy)]
pub struct VipGuard {
    pub restricted_fields: &'static [&'static str],
}

/// Rows whose `column` holds one of `values` only leave that state through `action`
#[derive(Debug, Clone, Copy)]
pub struct StatusLock {
    pub column: &'static str,
    pub values: &'static [&'static str],
    pub action: &'static str,
}

#[derive(Debug)]
pub struct ResourceDef {
    pub product: Product,
    /// URL segment, e.g. `performance-reviews`
    pub path: &'static str,
    pub table: &'static str,
    pub columns: &'static [ColumnDef],
    pub unique: &'static [&'static [&'static str]],
    pub references: &'static [Reference],
    pub date_ranges: &'static [DateRange],
    /// At least one of these must be non-null after create/update
    pub require_one_of: &'static [&'static str],
    /// Generic update/delete allowed only while `status` is one of these
    pub mutable_statuses: Option<&'static [&'static str]>,
    pub default_order: &'static str,
    pub read_only: bool,
    pub status_lock: Option<StatusLock>,
    pub vip_guard: Option<VipGuard>,
}

impl ResourceDef {
    /// Find a column declared on this resource or among the system columns
    pub fn column(&self, name: &str) -> Option<&'static ColumnDef> {
        self.columns
            .iter()
            .chain(SYSTEM_COLUMNS.iter())
            .find(|c| c.name == name)
    }

    pub fn writable_columns(&self) -> impl Iterator<Item = &'static ColumnDef> {
        self.columns.iter().filter(|c| c.writable)
    }

    /// Permission string `product:resource:action`
    pub fn permission(&self, action: Action) -> String {
        format!("{}:{}:{}", self.product.as_str(), self.path, action.as_str())
    }

    pub fn route_base(&self) -> String {
        format!("/api/{}/{}", self.product.as_str(), self.path)
    }
}

/// Every resource served by the generic routes
pub static RESOURCES: &[&ResourceDef] = &[
    &hris::DEPARTMENTS,
    &hris::LOCATIONS,
    &hris::WORKER_TYPES,
    &hris::EMPLOYEES,
    &hris::CONTRACTS,
    &hris::DOCUMENTS,
    &hris::PERFORMANCE_REVIEWS,
    &hris::BENEFIT_PLANS,
    &hris::BENEFIT_ENROLLMENTS,
    &hris::ATTENDANCE_RECORDS,
    &hris::TEMPORAL_PATTERNS,
    &hris::SCHEDULES,
    &hris::TIMESHEETS,
    &hris::APPROVAL_REQUESTS,
    &payroll::PAY_COMPONENTS,
    &payroll::DEDUCTIONS,
    &payroll::TAX_RULES,
    &payroll::EXCHANGE_RATES,
    &payroll::PAYROLL_RUNS,
    &payroll::PAYCHECKS,
];

pub fn lookup(product: &str, path: &str) -> Option<&'static ResourceDef> {
    let product = Product::parse(product)?;
    RESOURCES
        .iter()
        .copied()
        .find(|def| def.product == product && def.path == path)
}

pub fn lookup_table(table: &str) -> Option<&'static ResourceDef> {
    RESOURCES.iter().copied().find(|def| def.table == table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn paths_are_unique_per_product() {
        let mut seen = HashSet::new();
        for def in RESOURCES {
            assert!(seen.insert((def.product, def.path)), "duplicate path {}", def.path);
        }
    }

    #[test]
    fn declared_constraints_name_real_columns() {
        for def in RESOURCES {
            for set in def.unique {
                for col in *set {
                    assert!(def.column(col).is_some(), "{}: unique column {} missing", def.table, col);
                }
            }
            for reference in def.references {
                let col = def.column(reference.column).unwrap_or_else(|| {
                    panic!("{}: reference column {} missing", def.table, reference.column)
                });
                assert_eq!(col.kind, ColumnKind::Uuid, "{}.{} must be a uuid", def.table, col.name);
            }
            for range in def.date_ranges {
                assert!(def.column(range.start).is_some(), "{}: {}", def.table, range.start);
                assert!(def.column(range.end).is_some(), "{}: {}", def.table, range.end);
            }
            for col in def.require_one_of {
                assert!(def.column(col).is_some(), "{}: {}", def.table, col);
            }
            if let Some(guard) = def.vip_guard {
                for field in guard.restricted_fields {
                    assert!(def.column(field).is_some(), "{}: restricted {}", def.table, field);
                }
            }
            if let Some(lock) = def.status_lock {
                assert!(def.column(lock.column).is_some(), "{}: status lock {}", def.table, lock.column);
            }
            if def.mutable_statuses.is_some() {
                assert!(def.column("status").is_some(), "{} needs a status column", def.table);
            }
        }
    }

    #[test]
    fn system_fields_are_never_writable() {
        for def in RESOURCES {
            for col in def.writable_columns() {
                assert!(!SYSTEM_FIELDS.contains(&col.name), "{}.{}", def.table, col.name);
            }
        }
    }

    #[test]
    fn read_only_resources_have_no_writable_columns() {
        for def in RESOURCES.iter().filter(|d| d.read_only) {
            assert_eq!(def.writable_columns().count(), 0, "{}", def.table);
        }
    }

    #[test]
    fn lookup_resolves_paths_and_permissions() {
        let def = lookup("hris", "employees").expect("employees registered");
        assert_eq!(def.table, "employees");
        assert_eq!(def.permission(Action::Read), "hris:employees:read");
        assert_eq!(def.route_base(), "/api/hris/employees");
        assert!(lookup("payroll", "employees").is_none());
        assert!(lookup("crm", "employees").is_none());
        assert_eq!(lookup_table("tax_rules").map(|d| d.path), Some("tax-rules"));
    }
}
