pub mod approval_service;
pub mod currency_service;
pub mod employment_history_service;
pub mod organization_service;
pub mod payroll_run_service;
pub mod resource_service;
pub mod tax_service;
pub mod temporal_pattern_service;
pub mod vip_service;

use std::collections::BTreeMap;

use crate::database::manager::DatabaseError;

/// Errors raised by domain services
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    InvalidState(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Validation(String),
    #[error("{message}")]
    Unprocessable {
        message: String,
        field_errors: BTreeMap<String, String>,
    },
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl ServiceError {
    pub fn unprocessable(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut field_errors = BTreeMap::new();
        field_errors.insert(field.to_string(), message.clone());
        ServiceError::Unprocessable { message, field_errors }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        ServiceError::Database(DatabaseError::from_sqlx(err))
    }
}

impl From<crate::database::record::RecordError> for ServiceError {
    fn from(err: crate::database::record::RecordError) -> Self {
        ServiceError::Database(err.into())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
