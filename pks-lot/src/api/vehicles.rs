//! Vehicle intake and exit queue endpoints
//!
//! Request bodies come from an HTML form posted as JSON, so lane numbers may
//! arrive as strings and flags as `"on"`.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use pks_common::db::models::Vehicle;
use pks_common::Error;
use serde::Deserialize;
use serde_json::{json, Value};

use super::ApiError;
use crate::intake::IntakeRequest;
use crate::sequencer::{ExitOutcome, LaneBoard};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AddVehicleBody {
    #[serde(default)]
    pub plate: Option<String>,
    /// Lane number; `lane` accepted as an alias
    #[serde(default, alias = "lane")]
    pub machine: Option<Value>,
    #[serde(default)]
    pub small: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct RemoveVehicleBody {
    #[serde(default)]
    pub id: Option<Value>,
}

/// Lane from a number or numeric string; absent means lane 1
pub fn parse_lane(value: Option<&Value>) -> Result<i64, Error> {
    match value {
        None | Some(Value::Null) => Ok(1),
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| Error::InvalidInput(format!("invalid lane: {}", n))),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map_err(|_| Error::InvalidInput(format!("invalid lane: {}", s))),
        Some(other) => Err(Error::InvalidInput(format!("invalid lane: {}", other))),
    }
}

/// Checkbox-style flag: `true`, `1`, `"on"`, `"true"`, `"1"`
pub fn parse_flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        Some(Value::String(s)) => matches!(s.as_str(), "on" | "true" | "1"),
        _ => false,
    }
}

/// Vehicle id from a number or numeric string
pub fn parse_id(value: Option<&Value>) -> Result<i64, Error> {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| Error::InvalidInput(format!("invalid id: {}", n))),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map_err(|_| Error::InvalidInput(format!("invalid id: {}", s))),
        _ => Err(Error::InvalidInput("id is required".to_string())),
    }
}

/// POST /add
pub async fn add_vehicle(
    State(state): State<AppState>,
    Json(body): Json<AddVehicleBody>,
) -> Result<Json<Value>, ApiError> {
    let request = IntakeRequest {
        plate: body.plate.unwrap_or_default(),
        lane: parse_lane(body.machine.as_ref())?,
        small: parse_flag(body.small.as_ref()),
    };

    let vehicle = state.intake.intake(request).await?;
    Ok(Json(json!({ "success": true, "vehicle": vehicle })))
}

/// GET /list
pub async fn list_vehicles(State(state): State<AppState>) -> Result<Json<Vec<Vehicle>>, ApiError> {
    Ok(Json(state.sequencer.list_all().await?))
}

/// GET /lots
pub async fn list_lots(State(state): State<AppState>) -> Result<Json<LaneBoard>, ApiError> {
    Ok(Json(state.sequencer.list_by_lane().await?))
}

/// POST /queue_exit/:id
pub async fn queue_exit(
    State(state): State<AppState>,
    Path(vehicle_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let outcome = state.sequencer.queue_for_exit(vehicle_id).await?;
    Ok(Json(json!({ "success": true, "outcome": outcome })))
}

/// POST /exit/:id
///
/// Succeeds whether or not the vehicle was at the front; `exited` tells which.
pub async fn confirm_exit(
    State(state): State<AppState>,
    Path(vehicle_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let outcome = state.sequencer.confirm_exit(vehicle_id).await?;
    let exited = matches!(outcome, ExitOutcome::Exited { .. });
    Ok(Json(json!({ "success": true, "exited": exited, "outcome": outcome })))
}

/// POST /remove
pub async fn remove_vehicle(
    State(state): State<AppState>,
    Json(body): Json<RemoveVehicleBody>,
) -> Result<Json<Value>, ApiError> {
    let vehicle_id = parse_id(body.id.as_ref())?;
    let removed = state.sequencer.remove_direct(vehicle_id).await?;
    Ok(Json(json!({ "success": true, "removed": removed })))
}

pub fn vehicle_routes() -> Router<AppState> {
    Router::new()
        .route("/add", post(add_vehicle))
        .route("/list", get(list_vehicles))
        .route("/lots", get(list_lots))
        .route("/queue_exit/:id", post(queue_exit))
        .route("/exit/:id", post(confirm_exit))
        .route("/remove", post(remove_vehicle))
}
