//! Database module for ServiceMesh.
//!
//! Provides SQLite storage for users and service credentials with
//! automatic migrations.

mod models;
mod store;

pub use models::*;
pub use store::*;
