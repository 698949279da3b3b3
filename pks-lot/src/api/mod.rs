//! HTTP API handlers for pks-lot

pub mod error;
pub mod health;
pub mod vehicles;

pub use error::ApiError;
pub use health::health_routes;
pub use vehicles::vehicle_routes;
