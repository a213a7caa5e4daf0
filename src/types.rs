/// Shared types used across the codebase

use serde::{Deserialize, Serialize};
use std::fmt;

/// The two products served from one schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Product {
    Hris,
    Payroll,
}

impl Product {
    pub fn as_str(&self) -> &'static str {
        match self {
            Product::Hris => "hris",
            Product::Payroll => "payroll",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "hris" => Some(Product::Hris),
            "payroll" => Some(Product::Payroll),
            _ => None,
        }
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operations a permission can grant on a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }

    /// Map an HTTP method onto the action it performs
    pub fn from_method(method: &axum::http::Method) -> Self {
        match *method {
            axum::http::Method::POST => Action::Create,
            axum::http::Method::PUT | axum::http::Method::PATCH => Action::Update,
            axum::http::Method::DELETE => Action::Delete,
            _ => Action::Read,
        }
    }
}

/// Role carried in the JWT. `Admin` and `Root` bypass permission lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Root,
    Admin,
    Manager,
    Employee,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Root => "root",
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Employee => "employee",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Root | Role::Admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;

    #[test]
    fn methods_map_to_actions() {
        assert_eq!(Action::from_method(&Method::GET), Action::Read);
        assert_eq!(Action::from_method(&Method::POST), Action::Create);
        assert_eq!(Action::from_method(&Method::PATCH), Action::Update);
        assert_eq!(Action::from_method(&Method::PUT), Action::Update);
        assert_eq!(Action::from_method(&Method::DELETE), Action::Delete);
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_value(Role::Admin).unwrap(), serde_json::json!("admin"));
        let role: Role = serde_json::from_value(serde_json::json!("manager")).unwrap();
        assert_eq!(role, Role::Manager);
        assert!(Role::Root.is_admin());
        assert!(!Role::Employee.is_admin());
    }
}
