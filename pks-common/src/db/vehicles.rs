//! Vehicle storage queries
//!
//! Every query is generic over a sqlx executor so callers can run it on the
//! pool directly or inside a transaction they hold.

use crate::db::models::{NewVehicle, Vehicle};
use crate::Result;
use sqlx::{Executor, Sqlite};

const VEHICLE_COLUMNS: &str = "id, plate, lane, small, low_emission, exit_rank, created_at";

/// Insert a new vehicle with `exit_rank = 0`, returning the stored row
pub async fn insert_vehicle<'e, E>(executor: E, vehicle: &NewVehicle) -> Result<Vehicle>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "INSERT INTO vehicles (plate, lane, small, low_emission, exit_rank) \
         VALUES (?, ?, ?, ?, 0) RETURNING {}",
        VEHICLE_COLUMNS
    );
    let stored = sqlx::query_as::<_, Vehicle>(&sql)
        .bind(&vehicle.plate)
        .bind(vehicle.lane)
        .bind(vehicle.small)
        .bind(vehicle.low_emission)
        .fetch_one(executor)
        .await?;

    Ok(stored)
}

pub async fn get_vehicle<'e, E>(executor: E, id: i64) -> Result<Option<Vehicle>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {} FROM vehicles WHERE id = ?", VEHICLE_COLUMNS);
    let vehicle = sqlx::query_as::<_, Vehicle>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;

    Ok(vehicle)
}

pub async fn set_exit_rank<'e, E>(executor: E, id: i64, rank: i64) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("UPDATE vehicles SET exit_rank = ? WHERE id = ?")
        .bind(rank)
        .bind(id)
        .execute(executor)
        .await?;

    Ok(())
}

/// Delete a vehicle; returns whether a row was removed
pub async fn delete_vehicle<'e, E>(executor: E, id: i64) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM vehicles WHERE id = ?")
        .bind(id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Highest exit rank in a lane (0 when nothing is queued)
pub async fn max_exit_rank<'e, E>(executor: E, lane: i64) -> Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let max: Option<i64> = sqlx::query_scalar("SELECT MAX(exit_rank) FROM vehicles WHERE lane = ?")
        .bind(lane)
        .fetch_one(executor)
        .await?;

    Ok(max.unwrap_or(0))
}

/// Move every vehicle behind the front of a lane up by one position
pub async fn shift_ranks_down<'e, E>(executor: E, lane: i64) -> Result<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "UPDATE vehicles SET exit_rank = exit_rank - 1 WHERE lane = ? AND exit_rank > 1",
    )
    .bind(lane)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// All vehicles in a lane ordered by `(exit_rank, id)`
pub async fn list_lane<'e, E>(executor: E, lane: i64) -> Result<Vec<Vehicle>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {} FROM vehicles WHERE lane = ? ORDER BY exit_rank, id",
        VEHICLE_COLUMNS
    );
    let rows = sqlx::query_as::<_, Vehicle>(&sql)
        .bind(lane)
        .fetch_all(executor)
        .await?;

    Ok(rows)
}

/// All vehicles ordered by `(lane, exit_rank, id)`
pub async fn list_all_ordered<'e, E>(executor: E) -> Result<Vec<Vehicle>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "SELECT {} FROM vehicles ORDER BY lane, exit_rank, id",
        VEHICLE_COLUMNS
    );
    let rows = sqlx::query_as::<_, Vehicle>(&sql).fetch_all(executor).await?;

    Ok(rows)
}
