//! pks-lot library - parking lot exit sequencing service
//!
//! Vehicles are parked into lanes (exit machines), tagged with a low-emission
//! classification at intake, and released one lane-front at a time.

use axum::Router;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod intake;
pub mod logging;
pub mod sequencer;
pub mod verifier;

use intake::IntakeService;
use sequencer::ExitSequencer;
use verifier::AttributeVerifier;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub sequencer: Arc<ExitSequencer>,
    pub intake: Arc<IntakeService>,
}

impl AppState {
    pub fn new(db: SqlitePool, verifier: Arc<AttributeVerifier>, lane_count: i64) -> Self {
        Self {
            sequencer: Arc::new(ExitSequencer::new(db.clone(), lane_count)),
            intake: Arc::new(IntakeService::new(db, verifier, lane_count)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::vehicle_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
