//! Automatic schema synchronization
//!
//! Declared table schemas are compared with `PRAGMA table_info` at startup.
//! Missing columns are added with `ALTER TABLE ... ADD COLUMN`; type or
//! constraint drift is only reported, since SQLite cannot alter it in place.

use crate::Result;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info, warn};

/// Column definition with SQL constraints
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    /// SQL type (e.g., "TEXT", "INTEGER", "TIMESTAMP")
    pub sql_type: String,
    pub not_null: bool,
    pub primary_key: bool,
    pub default_value: Option<String>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            not_null: false,
            primary_key: false,
            default_value: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }
}

/// Actual column from `PRAGMA table_info`
#[derive(Debug, Clone)]
pub struct ActualColumn {
    pub cid: i32,
    pub name: String,
    pub type_name: String,
    pub not_null: bool,
    pub pk: bool,
}

/// Difference between declared and actual schema
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaDrift {
    MissingColumn {
        table: String,
        column: ColumnDefinition,
    },
    TypeMismatch {
        table: String,
        column: String,
        expected: String,
        actual: String,
    },
}

/// Declared schema of one table
pub trait TableSchema {
    fn table_name() -> &'static str;

    fn expected_columns() -> Vec<ColumnDefinition>;
}

pub struct VehiclesTableSchema;

impl TableSchema for VehiclesTableSchema {
    fn table_name() -> &'static str {
        "vehicles"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("id", "INTEGER").primary_key(),
            ColumnDefinition::new("plate", "TEXT").not_null(),
            ColumnDefinition::new("lane", "INTEGER").not_null().default("1"),
            ColumnDefinition::new("small", "INTEGER").not_null().default("0"),
            ColumnDefinition::new("low_emission", "INTEGER").not_null().default("0"),
            ColumnDefinition::new("exit_rank", "INTEGER").not_null().default("0"),
            ColumnDefinition::new("created_at", "TIMESTAMP"),
        ]
    }
}

pub struct SettingsTableSchema;

impl TableSchema for SettingsTableSchema {
    fn table_name() -> &'static str {
        "settings"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("key", "TEXT").primary_key(),
            ColumnDefinition::new("value", "TEXT"),
            ColumnDefinition::new("updated_at", "TIMESTAMP")
                .not_null()
                .default("CURRENT_TIMESTAMP"),
        ]
    }
}

/// Synchronize every declared table
pub async fn sync_all_table_schemas(pool: &SqlitePool) -> Result<()> {
    sync_table::<SettingsTableSchema>(pool).await?;
    sync_table::<VehiclesTableSchema>(pool).await?;
    Ok(())
}

pub async fn introspect_table(pool: &SqlitePool, table_name: &str) -> Result<Vec<ActualColumn>> {
    let query = format!("PRAGMA table_info({})", table_name);
    let rows = sqlx::query(&query).fetch_all(pool).await?;

    let mut columns: Vec<ActualColumn> = rows
        .iter()
        .map(|row| ActualColumn {
            cid: row.get("cid"),
            name: row.get("name"),
            type_name: row.get("type"),
            not_null: row.get::<i32, _>("notnull") != 0,
            pk: row.get::<i32, _>("pk") != 0,
        })
        .collect();

    columns.sort_by_key(|c| c.cid);

    Ok(columns)
}

pub async fn table_exists(pool: &SqlitePool, table_name: &str) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?)",
    )
    .bind(table_name)
    .fetch_one(pool)
    .await?;

    Ok(exists)
}

/// Compare declared columns with the actual ones
pub fn compare(table_name: &str, expected: &[ColumnDefinition], actual: &[ActualColumn]) -> Vec<SchemaDrift> {
    let mut drift = Vec::new();

    for expected_col in expected {
        match actual.iter().find(|c| c.name == expected_col.name) {
            Some(actual_col) => {
                if !types_compatible(&expected_col.sql_type, &actual_col.type_name) {
                    drift.push(SchemaDrift::TypeMismatch {
                        table: table_name.to_string(),
                        column: expected_col.name.clone(),
                        expected: expected_col.sql_type.clone(),
                        actual: actual_col.type_name.clone(),
                    });
                }
            }
            None => drift.push(SchemaDrift::MissingColumn {
                table: table_name.to_string(),
                column: expected_col.clone(),
            }),
        }
    }

    drift
}

/// SQLite type affinity comparison
fn types_compatible(expected: &str, actual: &str) -> bool {
    let exp = expected.to_uppercase();
    let act = actual.to_uppercase();

    if exp == act {
        return true;
    }

    if exp.contains("INT") && act.contains("INT") {
        return true;
    }

    let texty = |t: &str| t.contains("TEXT") || t.contains("CHAR") || t.contains("CLOB");
    texty(&exp) && texty(&act)
}

pub async fn sync_table<T: TableSchema>(pool: &SqlitePool) -> Result<()> {
    let table_name = T::table_name();

    if !table_exists(pool, table_name).await? {
        warn!("Schema sync: table '{}' does not exist", table_name);
        return Ok(());
    }

    let actual = introspect_table(pool, table_name).await?;
    let drift = compare(table_name, &T::expected_columns(), &actual);

    if drift.is_empty() {
        debug!("Schema sync: '{}' up to date", table_name);
        return Ok(());
    }

    for change in drift {
        match change {
            SchemaDrift::MissingColumn { table, column } => {
                add_column(pool, &table, &column).await?;
            }
            SchemaDrift::TypeMismatch { table, column, expected, actual } => {
                warn!(
                    "Type mismatch in {}.{}: expected '{}', found '{}'. Manual migration required.",
                    table, column, expected, actual
                );
            }
        }
    }

    Ok(())
}

async fn add_column(pool: &SqlitePool, table: &str, column: &ColumnDefinition) -> Result<()> {
    let mut sql = format!("ALTER TABLE {} ADD COLUMN {} {}", table, column.name, column.sql_type);

    if column.primary_key {
        warn!(
            "Cannot add PRIMARY KEY column {}.{} via ALTER TABLE; adding it without the constraint",
            table, column.name
        );
    }

    match (&column.default_value, column.not_null) {
        (Some(default), true) => sql.push_str(&format!(" NOT NULL DEFAULT {}", default)),
        (Some(default), false) => sql.push_str(&format!(" DEFAULT {}", default)),
        (None, true) => warn!(
            "Cannot add NOT NULL column {}.{} without DEFAULT; column will be nullable",
            table, column.name
        ),
        (None, false) => {}
    }

    info!("Adding column: {}.{} ({})", table, column.name, column.sql_type);

    match sqlx::query(&sql).execute(pool).await {
        Ok(_) => Ok(()),
        // Another process added it first
        Err(sqlx::Error::Database(db_err)) if db_err.message().contains("duplicate column") => Ok(()),
        Err(e) => Err(e.into()),
    }
}
