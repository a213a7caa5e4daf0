pub mod approval;
pub mod employee;
pub mod employment_history;
pub mod organization;
pub mod payroll;
pub mod temporal_pattern;
pub mod vip;
