// handlers/elevated/root/mod.rs - Root administrative operations
pub mod organization;
