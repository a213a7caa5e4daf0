use super::{column, managed, required, ColumnKind::*, DateRange, Reference, ResourceDef};
use crate::types::Product;

pub static PAY_COMPONENTS: ResourceDef = ResourceDef {
    product: Product::Payroll,
    path: "pay-components",
    table: "pay_components",
    columns: &[
        required("name", Text),
        required("code", Text),
        required("component_type", Choice(&["earning", "deduction", "benefit", "reimbursement"])),
        column("is_taxable", Boolean),
        column("default_amount", Numeric),
        column("currency", Currency),
    ],
    unique: &[&["code"]],
    references: &[],
    date_ranges: &[],
    require_one_of: &[],
    mutable_statuses: None,
    default_order: "code asc",
    read_only: false,
    status_lock: None,
    vip_guard: None,
};

pub static DEDUCTIONS: ResourceDef = ResourceDef {
    product: Product::Payroll,
    path: "deductions",
    table: "deductions",
    columns: &[
        required("employee_id", Uuid),
        column("pay_component_id", Uuid),
        required("name", Text),
        column("amount", Numeric),
        column("percentage", Numeric),
        column("is_pre_tax", Boolean),
        required("start_date", Date),
        column("end_date", Date),
    ],
    unique: &[],
    references: &[
        Reference { column: "employee_id", table: "employees" },
        Reference { column: "pay_component_id", table: "pay_components" },
    ],
    date_ranges: &[DateRange { start: "start_date", end: "end_date" }],
    require_one_of: &["amount", "percentage"],
    mutable_statuses: None,
    default_order: "start_date desc",
    read_only: false,
    status_lock: None,
    vip_guard: None,
};

pub static TAX_RULES: ResourceDef = ResourceDef {
    product: Product::Payroll,
    path: "tax-rules",
    table: "tax_rules",
    columns: &[
        required("jurisdiction", Text),
        required("name", Text),
        required("tax_type", Choice(&["flat", "percentage", "progressive"])),
        column("rate", Numeric),
        column("brackets", Json),
        required("effective_from", Date),
        column("effective_to", Date),
    ],
    unique: &[],
    references: &[],
    date_ranges: &[DateRange { start: "effective_from", end: "effective_to" }],
    require_one_of: &["rate", "brackets"],
    mutable_statuses: None,
    default_order: "jurisdiction asc, effective_from desc",
    read_only: false,
    status_lock: None,
    vip_guard: None,
};

pub static EXCHANGE_RATES: ResourceDef = ResourceDef {
    product: Product::Payroll,
    path: "exchange-rates",
    table: "exchange_rates",
    columns: &[
        required("base_currency", Currency),
        required("quote_currency", Currency),
        required("rate", Numeric),
        required("effective_date", Date),
    ],
    unique: &[&["base_currency", "quote_currency", "effective_date"]],
    references: &[],
    date_ranges: &[],
    require_one_of: &[],
    mutable_statuses: None,
    default_order: "effective_date desc",
    read_only: false,
    status_lock: None,
    vip_guard: None,
};

pub static PAYROLL_RUNS: ResourceDef = ResourceDef {
    product: Product::Payroll,
    path: "payroll-runs",
    table: "payroll_runs",
    columns: &[
        required("name", Text),
        required("period_start", Date),
        required("period_end", Date),
        required("pay_date", Date),
        required("currency", Currency),
        managed("status", Text),
        managed("employee_count", Integer),
        managed("total_gross", Numeric),
        managed("total_deductions", Numeric),
        managed("total_taxes", Numeric),
        managed("total_net", Numeric),
        managed("processed_at", Timestamp),
        managed("processed_by", Uuid),
        managed("approved_at", Timestamp),
        managed("approved_by", Uuid),
        managed("paid_at", Timestamp),
    ],
    unique: &[&["name"]],
    references: &[],
    date_ranges: &[
        DateRange { start: "period_start", end: "period_end" },
        DateRange { start: "period_start", end: "pay_date" },
    ],
    require_one_of: &[],
    mutable_statuses: Some(&["draft"]),
    default_order: "period_start desc",
    read_only: false,
    status_lock: None,
    vip_guard: None,
};

pub static PAYCHECKS: ResourceDef = ResourceDef {
    product: Product::Payroll,
    path: "paychecks",
    table: "paychecks",
    columns: &[
        managed("payroll_run_id", Uuid),
        managed("employee_id", Uuid),
        managed("currency", Currency),
        managed("gross_amount", Numeric),
        managed("pre_tax_deductions", Numeric),
        managed("taxes", Numeric),
        managed("post_tax_deductions", Numeric),
        managed("net_amount", Numeric),
        managed("breakdown", Json),
    ],
    unique: &[],
    references: &[],
    date_ranges: &[],
    require_one_of: &[],
    mutable_statuses: None,
    default_order: "created_at desc",
    read_only: true,
    status_lock: None,
    vip_guard: None,
};
