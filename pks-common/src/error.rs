//! Error type shared by the PKS crates

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Storage failure; the operation's transaction was rolled back
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Bootstrap TOML unreadable or out of range
    #[error("Configuration error: {0}")]
    Config(String),

    /// No vehicle record with this id
    #[error("Vehicle {0} not found")]
    VehicleNotFound(i64),

    /// Request rejected before touching the lot (blank plate, unknown lane, bad id)
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
