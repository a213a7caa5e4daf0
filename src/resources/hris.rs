use super::{column, managed, required, ColumnKind::*, DateRange, Reference, ResourceDef, StatusLock, VipGuard};
use crate::types::Product;

pub const PAY_FREQUENCIES: &[&str] = &["weekly", "biweekly", "semimonthly", "monthly", "annual"];

pub static DEPARTMENTS: ResourceDef = ResourceDef {
    product: Product::Hris,
    path: "departments",
    table: "departments",
    columns: &[
        required("name", Text),
        column("code", Text),
        column("parent_department_id", Uuid),
        column("manager_employee_id", Uuid),
        column("description", Text),
    ],
    unique: &[&["name"], &["code"]],
    references: &[
        Reference { column: "parent_department_id", table: "departments" },
        Reference { column: "manager_employee_id", table: "employees" },
    ],
    date_ranges: &[],
    require_one_of: &[],
    mutable_statuses: None,
    default_order: "name asc",
    read_only: false,
    status_lock: None,
    vip_guard: None,
};

pub static LOCATIONS: ResourceDef = ResourceDef {
    product: Product::Hris,
    path: "locations",
    table: "locations",
    columns: &[
        required("name", Text),
        column("address_line1", Text),
        column("address_line2", Text),
        column("city", Text),
        column("region", Text),
        column("postal_code", Text),
        column("country_code", Text),
        column("timezone", Text),
    ],
    unique: &[&["name"]],
    references: &[],
    date_ranges: &[],
    require_one_of: &[],
    mutable_statuses: None,
    default_order: "name asc",
    read_only: false,
    status_lock: None,
    vip_guard: None,
};

pub static WORKER_TYPES: ResourceDef = ResourceDef {
    product: Product::Hris,
    path: "worker-types",
    table: "worker_types",
    columns: &[
        required("name", Text),
        required("code", Text),
        column("description", Text),
        column("is_employee", Boolean),
    ],
    unique: &[&["code"]],
    references: &[],
    date_ranges: &[],
    require_one_of: &[],
    mutable_statuses: None,
    default_order: "name asc",
    read_only: false,
    status_lock: None,
    vip_guard: None,
};

pub static EMPLOYEES: ResourceDef = ResourceDef {
    product: Product::Hris,
    path: "employees",
    table: "employees",
    columns: &[
        required("employee_number", Text),
        required("first_name", Text),
        required("last_name", Text),
        required("email", Text),
        column("personal_email", Text),
        column("phone", Text),
        column("date_of_birth", Date),
        column("national_id", Text),
        column("home_address", Text),
        column("job_title", Text),
        column("department_id", Uuid),
        column("location_id", Uuid),
        column("manager_id", Uuid),
        column("worker_type_id", Uuid),
        required("hire_date", Date),
        // terminated is only reachable through the employment lifecycle routes
        column("employment_status", Choice(&["active", "on_leave"])),
        column("base_salary", Numeric),
        column("salary_currency", Currency),
        column("pay_frequency", Choice(PAY_FREQUENCIES)),
        column("tax_jurisdiction", Text),
        column("bank_account", Text),
        managed("termination_date", Date),
        managed("rehire_count", Integer),
        managed("is_vip", Boolean),
        managed("vip_reason", Text),
        managed("vip_marked_by", Uuid),
        managed("vip_marked_at", Timestamp),
    ],
    unique: &[&["email"], &["employee_number"]],
    references: &[
        Reference { column: "department_id", table: "departments" },
        Reference { column: "location_id", table: "locations" },
        Reference { column: "manager_id", table: "employees" },
        Reference { column: "worker_type_id", table: "worker_types" },
    ],
    date_ranges: &[],
    require_one_of: &[],
    mutable_statuses: None,
    default_order: "last_name asc, first_name asc",
    read_only: false,
    status_lock: Some(StatusLock {
        column: "employment_status",
        values: &["terminated"],
        action: "rehire",
    }),
    vip_guard: Some(VipGuard {
        restricted_fields: &[
            "personal_email",
            "phone",
            "date_of_birth",
            "national_id",
            "home_address",
            "base_salary",
            "bank_account",
        ],
    }),
};

pub static CONTRACTS: ResourceDef = ResourceDef {
    product: Product::Hris,
    path: "contracts",
    table: "contracts",
    columns: &[
        required("employee_id", Uuid),
        required("contract_type", Choice(&["permanent", "fixed_term", "contractor", "internship"])),
        required("start_date", Date),
        column("end_date", Date),
        column("salary", Numeric),
        column("currency", Currency),
        column("hours_per_week", Numeric),
        column("notes", Text),
    ],
    unique: &[],
    references: &[Reference { column: "employee_id", table: "employees" }],
    date_ranges: &[DateRange { start: "start_date", end: "end_date" }],
    require_one_of: &[],
    mutable_statuses: None,
    default_order: "start_date desc",
    read_only: false,
    status_lock: None,
    vip_guard: None,
};

pub static DOCUMENTS: ResourceDef = ResourceDef {
    product: Product::Hris,
    path: "documents",
    table: "documents",
    columns: &[
        required("employee_id", Uuid),
        required("title", Text),
        required("document_type", Text),
        required("file_url", Text),
        column("mime_type", Text),
        column("expires_on", Date),
    ],
    unique: &[],
    references: &[Reference { column: "employee_id", table: "employees" }],
    date_ranges: &[],
    require_one_of: &[],
    mutable_statuses: None,
    default_order: "created_at desc",
    read_only: false,
    status_lock: None,
    vip_guard: None,
};

pub static PERFORMANCE_REVIEWS: ResourceDef = ResourceDef {
    product: Product::Hris,
    path: "performance-reviews",
    table: "performance_reviews",
    columns: &[
        required("employee_id", Uuid),
        column("reviewer_id", Uuid),
        required("period_start", Date),
        required("period_end", Date),
        column("rating", Integer),
        column("summary", Text),
        column("status", Choice(&["draft", "submitted", "acknowledged"])),
    ],
    unique: &[],
    references: &[
        Reference { column: "employee_id", table: "employees" },
        Reference { column: "reviewer_id", table: "employees" },
    ],
    date_ranges: &[DateRange { start: "period_start", end: "period_end" }],
    require_one_of: &[],
    mutable_statuses: None,
    default_order: "period_end desc",
    read_only: false,
    status_lock: None,
    vip_guard: None,
};

pub static BENEFIT_PLANS: ResourceDef = ResourceDef {
    product: Product::Hris,
    path: "benefit-plans",
    table: "benefit_plans",
    columns: &[
        required("name", Text),
        column("provider", Text),
        required("plan_type", Choice(&["health", "dental", "vision", "retirement", "life", "other"])),
        column("employer_contribution", Numeric),
        column("employee_contribution", Numeric),
        column("currency", Currency),
    ],
    unique: &[&["name"]],
    references: &[],
    date_ranges: &[],
    require_one_of: &[],
    mutable_statuses: None,
    default_order: "name asc",
    read_only: false,
    status_lock: None,
    vip_guard: None,
};

pub static BENEFIT_ENROLLMENTS: ResourceDef = ResourceDef {
    product: Product::Hris,
    path: "benefit-enrollments",
    table: "benefit_enrollments",
    columns: &[
        required("employee_id", Uuid),
        required("benefit_plan_id", Uuid),
        required("coverage_start", Date),
        column("coverage_end", Date),
        column(
            "coverage_level",
            Choice(&["employee", "employee_spouse", "employee_children", "family"]),
        ),
    ],
    unique: &[],
    references: &[
        Reference { column: "employee_id", table: "employees" },
        Reference { column: "benefit_plan_id", table: "benefit_plans" },
    ],
    date_ranges: &[DateRange { start: "coverage_start", end: "coverage_end" }],
    require_one_of: &[],
    mutable_statuses: None,
    default_order: "coverage_start desc",
    read_only: false,
    status_lock: None,
    vip_guard: None,
};

pub static ATTENDANCE_RECORDS: ResourceDef = ResourceDef {
    product: Product::Hris,
    path: "attendance-records",
    table: "attendance_records",
    columns: &[
        required("employee_id", Uuid),
        required("work_date", Date),
        column("check_in", Timestamp),
        column("check_out", Timestamp),
        required("status", Choice(&["present", "absent", "leave", "remote", "holiday"])),
        column("notes", Text),
    ],
    unique: &[&["employee_id", "work_date"]],
    references: &[Reference { column: "employee_id", table: "employees" }],
    date_ranges: &[DateRange { start: "check_in", end: "check_out" }],
    require_one_of: &[],
    mutable_statuses: None,
    default_order: "work_date desc",
    read_only: false,
    status_lock: None,
    vip_guard: None,
};

pub static TEMPORAL_PATTERNS: ResourceDef = ResourceDef {
    product: Product::Hris,
    path: "temporal-patterns",
    table: "temporal_patterns",
    columns: &[
        required("name", Text),
        required("frequency", Choice(&["daily", "weekly", "monthly", "yearly"])),
        column("interval", Integer),
        column("days_of_week", Json),
        column("day_of_month", Integer),
        column("month_of_year", Integer),
        required("anchor_date", Date),
        column("until_date", Date),
    ],
    unique: &[&["name"]],
    references: &[],
    date_ranges: &[DateRange { start: "anchor_date", end: "until_date" }],
    require_one_of: &[],
    mutable_statuses: None,
    default_order: "name asc",
    read_only: false,
    status_lock: None,
    vip_guard: None,
};

pub static SCHEDULES: ResourceDef = ResourceDef {
    product: Product::Hris,
    path: "schedules",
    table: "schedules",
    columns: &[
        required("name", Text),
        column("employee_id", Uuid),
        column("location_id", Uuid),
        column("temporal_pattern_id", Uuid),
        column("start_time", Time),
        column("end_time", Time),
    ],
    unique: &[],
    references: &[
        Reference { column: "employee_id", table: "employees" },
        Reference { column: "location_id", table: "locations" },
        Reference { column: "temporal_pattern_id", table: "temporal_patterns" },
    ],
    date_ranges: &[],
    require_one_of: &[],
    mutable_statuses: None,
    default_order: "name asc",
    read_only: false,
    status_lock: None,
    vip_guard: None,
};

pub static TIMESHEETS: ResourceDef = ResourceDef {
    product: Product::Hris,
    path: "timesheets",
    table: "timesheets",
    columns: &[
        required("employee_id", Uuid),
        required("period_start", Date),
        required("period_end", Date),
        required("hours_worked", Numeric),
        column("overtime_hours", Numeric),
        column("status", Choice(&["draft", "submitted", "approved", "rejected"])),
    ],
    unique: &[&["employee_id", "period_start"]],
    references: &[Reference { column: "employee_id", table: "employees" }],
    date_ranges: &[DateRange { start: "period_start", end: "period_end" }],
    require_one_of: &[],
    mutable_statuses: None,
    default_order: "period_start desc",
    read_only: false,
    status_lock: None,
    vip_guard: None,
};

pub static APPROVAL_REQUESTS: ResourceDef = ResourceDef {
    product: Product::Hris,
    path: "approval-requests",
    table: "approval_requests",
    columns: &[
        required(
            "request_type",
            Choice(&["timesheet", "payroll_run", "contract", "leave", "expense", "other"]),
        ),
        column("subject_table", Text),
        column("subject_id", Uuid),
        column("summary", Text),
        managed("status", Text),
        managed("decided_by", Uuid),
        managed("decided_at", Timestamp),
        managed("decision_comment", Text),
    ],
    unique: &[],
    references: &[],
    date_ranges: &[],
    require_one_of: &[],
    mutable_statuses: Some(&["pending"]),
    default_order: "created_at desc",
    read_only: false,
    status_lock: None,
    vip_guard: None,
};
