//! Vehicle intake
//!
//! Validates the request, classifies the plate (outside any sequencer lock)
//! and stores the vehicle unqueued.

use crate::verifier::AttributeVerifier;
use pks_common::db::models::{NewVehicle, Vehicle};
use pks_common::db::vehicles;
use pks_common::{Error, Result};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeRequest {
    pub plate: String,
    pub lane: i64,
    pub small: bool,
}

pub struct IntakeService {
    db: SqlitePool,
    verifier: Arc<AttributeVerifier>,
    lane_count: i64,
}

impl IntakeService {
    pub fn new(db: SqlitePool, verifier: Arc<AttributeVerifier>, lane_count: i64) -> Self {
        Self {
            db,
            verifier,
            lane_count,
        }
    }

    /// Register a parked vehicle
    ///
    /// Fails with `InvalidInput` before any lookup when the plate is blank or
    /// the lane does not exist. A failed lookup never fails intake.
    pub async fn intake(&self, request: IntakeRequest) -> Result<Vehicle> {
        let plate = request.plate.trim();
        if plate.is_empty() {
            return Err(Error::InvalidInput("plate is required".to_string()));
        }
        if !(1..=self.lane_count).contains(&request.lane) {
            return Err(Error::InvalidInput(format!(
                "lane must be between 1 and {}, got {}",
                self.lane_count, request.lane
            )));
        }

        let low_emission = self.verifier.classify(plate).await;

        let vehicle = vehicles::insert_vehicle(
            &self.db,
            &NewVehicle {
                plate: plate.to_string(),
                lane: request.lane,
                small: request.small,
                low_emission,
            },
        )
        .await?;

        info!(
            vehicle_id = vehicle.id,
            plate = %vehicle.plate,
            lane = vehicle.lane,
            small = vehicle.small,
            low_emission,
            "Vehicle parked"
        );
        Ok(vehicle)
    }
}
