//! Database models and queries

pub mod init;
pub mod migrations;
pub mod models;
pub mod schema_sync;
pub mod settings;
pub mod vehicles;

pub use init::*;
pub use models::*;
