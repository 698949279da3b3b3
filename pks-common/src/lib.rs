//! # PKS Common Library
//!
//! Shared code for the parking lot services:
//! - Error type used across crates
//! - Bootstrap configuration and root folder resolution
//! - Database initialization (ensure-schema, column sync, migrations)
//! - Vehicle model and storage queries

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
