//! Database models

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A parked vehicle, the only persistent entity
///
/// `exit_rank == 0` means not queued; `exit_rank >= 1` is the position in the
/// lane's exit queue. Positive ranks within one lane are always `1..=k`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Vehicle {
    pub id: i64,
    pub plate: String,
    pub lane: i64,
    /// Size class: true for small vehicles (advisory only)
    pub small: bool,
    pub low_emission: bool,
    pub exit_rank: i64,
    pub created_at: Option<NaiveDateTime>,
}

impl Vehicle {
    pub fn is_queued(&self) -> bool {
        self.exit_rank > 0
    }

    /// Only the front of a lane's queue may leave
    pub fn is_at_front(&self) -> bool {
        self.exit_rank == 1
    }
}

/// Fields supplied at intake; `id`, `exit_rank` and `created_at` are assigned by storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVehicle {
    pub plate: String,
    pub lane: i64,
    pub small: bool,
    pub low_emission: bool,
}
