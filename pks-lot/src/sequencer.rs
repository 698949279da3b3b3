//! Per-lane exit sequencing
//!
//! Within a lane, queued vehicles hold ranks `1..=k` with no gaps. Only the
//! vehicle at rank 1 may leave; confirming its exit shifts everyone behind it
//! forward by one.
//!
//! Every operation holds the update scope for its whole read-modify-write and
//! runs inside one `BEGIN IMMEDIATE` transaction, so concurrent requests cannot
//! hand out duplicate ranks and intake inserts from other connections only
//! make it wait.

use pks_common::db::models::Vehicle;
use pks_common::db::vehicles;
use pks_common::{Error, Result};
use serde::Serialize;
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Result of a queue-for-exit request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QueueOutcome {
    Queued { lane: i64, rank: i64 },
    /// Already in the queue; nothing changed
    AlreadyQueued { lane: i64, rank: i64 },
}

impl QueueOutcome {
    pub fn rank(&self) -> i64 {
        match self {
            QueueOutcome::Queued { rank, .. } | QueueOutcome::AlreadyQueued { rank, .. } => *rank,
        }
    }
}

/// Result of a confirm-exit request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExitOutcome {
    /// Vehicle left; `advanced` vehicles moved up one position
    Exited { lane: i64, advanced: u64 },
    /// Not at the front (rank 0 = not queued); nothing changed
    NotAtFront { lane: i64, rank: i64 },
}

/// Vehicles grouped by lane, each lane ordered by `(exit_rank, id)`
pub type LaneBoard = BTreeMap<i64, Vec<Vehicle>>;

pub struct ExitSequencer {
    db: SqlitePool,
    lane_count: i64,
    update_scope: Mutex<()>,
}

impl ExitSequencer {
    pub fn new(db: SqlitePool, lane_count: i64) -> Self {
        Self {
            db,
            lane_count,
            update_scope: Mutex::new(()),
        }
    }

    /// Transaction that takes SQLite's write lock before its first read
    ///
    /// A deferred transaction would read a snapshot, then fail the write with
    /// `SQLITE_BUSY` if an intake insert committed in between.
    async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.db.begin_with("BEGIN IMMEDIATE").await?)
    }

    /// Append the vehicle to the back of its lane's exit queue
    ///
    /// Idempotent: a vehicle already queued keeps its rank.
    pub async fn queue_for_exit(&self, vehicle_id: i64) -> Result<QueueOutcome> {
        let _scope = self.update_scope.lock().await;
        let mut tx = self.begin_write().await?;

        let vehicle = vehicles::get_vehicle(&mut *tx, vehicle_id)
            .await?
            .ok_or(Error::VehicleNotFound(vehicle_id))?;

        if vehicle.is_queued() {
            debug!(vehicle_id, rank = vehicle.exit_rank, "Vehicle already queued for exit");
            return Ok(QueueOutcome::AlreadyQueued {
                lane: vehicle.lane,
                rank: vehicle.exit_rank,
            });
        }

        let rank = vehicles::max_exit_rank(&mut *tx, vehicle.lane).await? + 1;
        vehicles::set_exit_rank(&mut *tx, vehicle_id, rank).await?;
        tx.commit().await?;

        info!(vehicle_id, lane = vehicle.lane, rank, "Vehicle queued for exit");
        Ok(QueueOutcome::Queued {
            lane: vehicle.lane,
            rank,
        })
    }

    /// Release the vehicle if it is at the front of its lane
    ///
    /// Anything other than rank 1 is a successful no-op.
    pub async fn confirm_exit(&self, vehicle_id: i64) -> Result<ExitOutcome> {
        let _scope = self.update_scope.lock().await;
        let mut tx = self.begin_write().await?;

        let vehicle = vehicles::get_vehicle(&mut *tx, vehicle_id)
            .await?
            .ok_or(Error::VehicleNotFound(vehicle_id))?;

        if !vehicle.is_at_front() {
            debug!(vehicle_id, rank = vehicle.exit_rank, "Exit not confirmed, vehicle not at front");
            return Ok(ExitOutcome::NotAtFront {
                lane: vehicle.lane,
                rank: vehicle.exit_rank,
            });
        }

        vehicles::delete_vehicle(&mut *tx, vehicle_id).await?;
        let advanced = vehicles::shift_ranks_down(&mut *tx, vehicle.lane).await?;
        tx.commit().await?;

        info!(vehicle_id, lane = vehicle.lane, advanced, "Vehicle exited");
        Ok(ExitOutcome::Exited {
            lane: vehicle.lane,
            advanced,
        })
    }

    /// Administrative removal regardless of rank
    ///
    /// Does not renumber the lane, so removing a queued vehicle leaves a gap
    /// in its lane's ranks. Returns whether a vehicle was removed.
    pub async fn remove_direct(&self, vehicle_id: i64) -> Result<bool> {
        let _scope = self.update_scope.lock().await;
        let mut tx = self.begin_write().await?;

        let Some(vehicle) = vehicles::get_vehicle(&mut *tx, vehicle_id).await? else {
            debug!(vehicle_id, "Remove requested for unknown vehicle");
            return Ok(false);
        };

        vehicles::delete_vehicle(&mut *tx, vehicle_id).await?;
        tx.commit().await?;

        if vehicle.is_queued() {
            warn!(
                vehicle_id,
                lane = vehicle.lane,
                rank = vehicle.exit_rank,
                "Queued vehicle removed directly; lane ranks not renumbered"
            );
        } else {
            info!(vehicle_id, lane = vehicle.lane, "Vehicle removed");
        }
        Ok(true)
    }

    /// All vehicles ordered by `(lane, exit_rank, id)`
    pub async fn list_all(&self) -> Result<Vec<Vehicle>> {
        vehicles::list_all_ordered(&self.db).await
    }

    /// Vehicles grouped per lane; every configured lane is present
    pub async fn list_by_lane(&self) -> Result<LaneBoard> {
        let mut board: LaneBoard = (1..=self.lane_count).map(|lane| (lane, Vec::new())).collect();

        for vehicle in self.list_all().await? {
            board.entry(vehicle.lane).or_default().push(vehicle);
        }

        Ok(board)
    }
}
