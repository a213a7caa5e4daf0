// handlers/elevated/mod.rs - Root-role endpoints under /api/root
pub mod root;
