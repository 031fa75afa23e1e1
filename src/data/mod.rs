//! Data layer module
//!
//! Handles all data persistence:
//! - SQLite database operations
//! - Entity models shared by the service and auth layers

mod database;
mod models;

pub use database::Database;
pub use models::*;
