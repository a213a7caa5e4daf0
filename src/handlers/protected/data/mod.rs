// handlers/protected/data/mod.rs - Registry-driven CRUD for every resource
//
// Each `ResourceDef` gets its own routes; the definition arrives as router state.

pub mod collection;
pub mod record;

pub use collection::{create as collection_create, list as collection_list};
pub use record::{delete as record_delete, get as record_get, restore as record_restore, update as record_update};
