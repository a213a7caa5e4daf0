pub mod manager;
pub mod query_builder;
pub mod record;
pub mod repository;
pub mod models;

pub use manager::{DatabaseManager, DatabaseError};
pub use record::{BoundValue, Operation, Record, RecordError};
pub use repository::Repository;
