//! Versioned schema migrations
//!
//! Each migration runs once and is recorded in `schema_version`.
//! Migrations must stay idempotent: a crash between the data change and the
//! version record must not corrupt a rerun.

use crate::db::schema_sync::{introspect_table, table_exists};
use crate::Result;
use sqlx::SqlitePool;
use tracing::info;

/// Highest migration version known to this build
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

pub async fn get_schema_version(pool: &SqlitePool) -> Result<i64> {
    let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
        .fetch_one(pool)
        .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i64) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Apply every migration newer than the recorded schema version
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current = get_schema_version(pool).await?;

    if current >= CURRENT_SCHEMA_VERSION {
        return Ok(());
    }

    if current < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
    }

    info!("Schema version now {}", CURRENT_SCHEMA_VERSION);
    Ok(())
}

/// Migration v1: import rows from the legacy `cars` table
///
/// The earlier tool stored lanes as `machine` and ranks as `exit_order`, and
/// older files may lack `low_emission` or `exit_order` entirely. Rows keep
/// their ids so exit-queue tie-breaks stay stable. Skipped when `vehicles`
/// already holds data.
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    if !table_exists(pool, "cars").await? {
        return Ok(());
    }

    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vehicles")
        .fetch_one(pool)
        .await?;
    if existing > 0 {
        info!("Migration v1: vehicles already populated, legacy table left untouched");
        return Ok(());
    }

    let legacy_columns: Vec<String> = introspect_table(pool, "cars")
        .await?
        .into_iter()
        .map(|c| c.name)
        .collect();
    let column_or_zero = |name: &str| {
        if legacy_columns.iter().any(|c| c == name) {
            format!("COALESCE({}, 0)", name)
        } else {
            "0".to_string()
        }
    };

    let lane = if legacy_columns.iter().any(|c| c == "machine") {
        "COALESCE(machine, 1)".to_string()
    } else {
        "1".to_string()
    };

    let sql = format!(
        "INSERT INTO vehicles (id, plate, lane, small, low_emission, exit_rank) \
         SELECT id, COALESCE(plate, ''), {}, {}, {}, {} FROM cars",
        lane,
        column_or_zero("small"),
        column_or_zero("low_emission"),
        column_or_zero("exit_order"),
    );

    let mut tx = pool.begin().await?;
    let imported = sqlx::query(&sql).execute(&mut *tx).await?.rows_affected();
    tx.commit().await?;

    info!("Migration v1: imported {} vehicles from legacy table", imported);
    Ok(())
}
