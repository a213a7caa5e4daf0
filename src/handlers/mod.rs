// handlers/mod.rs - Three-tier handler layout
//
// Public (no auth) → Protected (JWT + organization) → Elevated (JWT + root role)
pub mod elevated;
pub mod protected;
pub mod public;
