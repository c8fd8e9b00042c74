//! Target table schema verification
//!
//! Each pipeline declares the columns it reads back and writes (primary key plus
//! prediction column). At startup the declaration is compared once against the live
//! store; any drift is a configuration fault. Nothing is altered: schema changes
//! belong to the application that owns the store.
//!
//! # Usage
//!
//! ```rust,ignore
//! let schema = TableSchema::new("flightdetails")
//!     .column(ColumnDefinition::new("Id", "INTEGER").primary_key())
//!     .column(ColumnDefinition::new("Probability", "REAL").nullable());
//!
//! schema.verify(&pool).await?;
//! ```

use crate::{Error, Result};
use sqlx::{Row, SqlitePool};
use std::fmt;
use tracing::{info, warn};

/// Column definition with the constraints the service relies on
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    /// Column name
    pub name: String,
    /// SQL type (e.g., "TEXT", "INTEGER", "REAL")
    pub sql_type: String,
    /// Must be (part of) the PRIMARY KEY
    pub primary_key: bool,
    /// Must accept NULL
    pub nullable: bool,
}

impl ColumnDefinition {
    /// Create new column definition
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            primary_key: false,
            nullable: false,
        }
    }

    /// Require PRIMARY KEY
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Require the column to accept NULL
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

/// Actual column from database introspection (PRAGMA table_info result)
#[derive(Debug, Clone)]
pub struct ActualColumn {
    pub cid: i32,
    pub name: String,
    pub type_name: String,
    pub not_null: bool,
    pub pk: bool,
}

/// Difference between the declared and the live schema
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaDrift {
    MissingTable {
        table: String,
    },
    MissingColumn {
        table: String,
        column: String,
    },
    /// Declared and live types fall into different SQLite affinities
    TypeMismatch {
        table: String,
        column: String,
        expected: String,
        actual: String,
    },
    ConstraintMismatch {
        table: String,
        column: String,
        constraint: String, // "PRIMARY KEY", "NULLABLE"
    },
}

impl fmt::Display for SchemaDrift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaDrift::MissingTable { table } => write!(f, "table '{}' does not exist", table),
            SchemaDrift::MissingColumn { table, column } => {
                write!(f, "column {}.{} does not exist", table, column)
            }
            SchemaDrift::TypeMismatch {
                table,
                column,
                expected,
                actual,
            } => write!(
                f,
                "column {}.{} has type '{}', expected '{}'",
                table, column, actual, expected
            ),
            SchemaDrift::ConstraintMismatch {
                table,
                column,
                constraint,
            } => write!(f, "column {}.{} is not {}", table, column, constraint),
        }
    }
}

/// SQLite column affinity, derived from a declared type name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    Integer,
    Text,
    Blob,
    Real,
    Numeric,
}

impl Affinity {
    /// Apply the SQLite affinity rules (section 3.1 of the datatype documentation), in order
    pub fn of(declared: &str) -> Self {
        let t = declared.to_uppercase();
        if t.contains("INT") {
            Affinity::Integer
        } else if t.contains("CHAR") || t.contains("CLOB") || t.contains("TEXT") {
            Affinity::Text
        } else if t.is_empty() || t.contains("BLOB") {
            Affinity::Blob
        } else if t.contains("REAL") || t.contains("FLOA") || t.contains("DOUB") {
            Affinity::Real
        } else {
            Affinity::Numeric
        }
    }
}

/// Read the live schema
pub struct SchemaIntrospector;

impl SchemaIntrospector {
    /// Columns of `table_name` in declaration order
    pub async fn introspect_table(pool: &SqlitePool, table_name: &str) -> Result<Vec<ActualColumn>> {
        let rows = sqlx::query("SELECT cid, name, type, \"notnull\", pk FROM pragma_table_info(?)")
            .bind(table_name)
            .fetch_all(pool)
            .await?;

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

    /// Check if table exists (identifiers compare case-insensitively, as SQLite does)
    pub async fn table_exists(pool: &SqlitePool, table_name: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM sqlite_master
                WHERE type = 'table' AND name = ? COLLATE NOCASE
            )
            "#,
        )
        .bind(table_name)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }
}

/// Declared schema for one table
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    pub table_name: String,
    pub columns: Vec<ColumnDefinition>,
}

impl TableSchema {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            columns: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    /// Compare the declaration to introspected columns
    pub fn compare(&self, actual: &[ActualColumn]) -> Vec<SchemaDrift> {
        let table = &self.table_name;
        let mut drift = Vec::new();

        for expected in &self.columns {
            let Some(live) = actual
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(&expected.name))
            else {
                drift.push(SchemaDrift::MissingColumn {
                    table: table.clone(),
                    column: expected.name.clone(),
                });
                continue;
            };

            if Affinity::of(&expected.sql_type) != Affinity::of(&live.type_name) {
                drift.push(SchemaDrift::TypeMismatch {
                    table: table.clone(),
                    column: expected.name.clone(),
                    expected: expected.sql_type.clone(),
                    actual: live.type_name.clone(),
                });
            }

            if expected.primary_key && !live.pk {
                drift.push(SchemaDrift::ConstraintMismatch {
                    table: table.clone(),
                    column: expected.name.clone(),
                    constraint: "PRIMARY KEY".to_string(),
                });
            }

            if expected.nullable && live.not_null {
                drift.push(SchemaDrift::ConstraintMismatch {
                    table: table.clone(),
                    column: expected.name.clone(),
                    constraint: "NULLABLE".to_string(),
                });
            }
        }

        drift
    }

    /// Collect all drift against the live store
    pub async fn detect_drift(&self, pool: &SqlitePool) -> Result<Vec<SchemaDrift>> {
        if !SchemaIntrospector::table_exists(pool, &self.table_name).await? {
            return Ok(vec![SchemaDrift::MissingTable {
                table: self.table_name.clone(),
            }]);
        }

        let actual = SchemaIntrospector::introspect_table(pool, &self.table_name).await?;
        Ok(self.compare(&actual))
    }

    /// Fail with a configuration error listing every drift item
    pub async fn verify(&self, pool: &SqlitePool) -> Result<()> {
        let drift = self.detect_drift(pool).await?;

        if drift.is_empty() {
            info!("Schema check passed for '{}'", self.table_name);
            return Ok(());
        }

        for item in &drift {
            warn!("Schema drift: {}", item);
        }

        let details: Vec<String> = drift.iter().map(ToString::to_string).collect();
        Err(Error::Config(format!(
            "Store schema does not match '{}': {}",
            self.table_name,
            details.join("; ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    fn flight_schema() -> TableSchema {
        TableSchema::new("flightdetails")
            .column(ColumnDefinition::new("Id", "INTEGER").primary_key())
            .column(ColumnDefinition::new("Probability", "REAL").nullable())
    }

    #[test]
    fn test_affinity_rules() {
        assert_eq!(Affinity::of("INTEGER"), Affinity::Integer);
        assert_eq!(Affinity::of("bigint"), Affinity::Integer);
        assert_eq!(Affinity::of("VARCHAR(36)"), Affinity::Text);
        assert_eq!(Affinity::of("DOUBLE PRECISION"), Affinity::Real);
        assert_eq!(Affinity::of("FLOAT"), Affinity::Real);
        assert_eq!(Affinity::of("DECIMAL(10,2)"), Affinity::Numeric);
        assert_eq!(Affinity::of(""), Affinity::Blob);
        // "POINT" contains "INT"
        assert_eq!(Affinity::of("FLOATING POINT"), Affinity::Integer);
    }

    #[tokio::test]
    async fn test_matching_table_passes() {
        let pool = setup_test_db().await;
        sqlx::query("CREATE TABLE FlightDetails (Id INTEGER PRIMARY KEY, Probability DOUBLE, Distance REAL)")
            .execute(&pool)
            .await
            .unwrap();

        assert!(flight_schema().verify(&pool).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_table_reported() {
        let pool = setup_test_db().await;

        let drift = flight_schema().detect_drift(&pool).await.unwrap();

        assert_eq!(
            drift,
            vec![SchemaDrift::MissingTable {
                table: "flightdetails".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_missing_prediction_column_fails() {
        let pool = setup_test_db().await;
        sqlx::query("CREATE TABLE flightdetails (Id INTEGER PRIMARY KEY)")
            .execute(&pool)
            .await
            .unwrap();

        let err = flight_schema().verify(&pool).await.unwrap_err();

        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("Probability"));
    }

    #[tokio::test]
    async fn test_not_null_prediction_column_is_drift() {
        let pool = setup_test_db().await;
        sqlx::query("CREATE TABLE flightdetails (Id INTEGER PRIMARY KEY, Probability REAL NOT NULL)")
            .execute(&pool)
            .await
            .unwrap();

        let drift = flight_schema().detect_drift(&pool).await.unwrap();

        assert_eq!(drift.len(), 1);
        assert!(matches!(
            &drift[0],
            SchemaDrift::ConstraintMismatch { constraint, .. } if constraint == "NULLABLE"
        ));
    }

    #[tokio::test]
    async fn test_key_type_and_pk_drift() {
        let pool = setup_test_db().await;
        sqlx::query("CREATE TABLE flightdetails (Id TEXT, Probability REAL)")
            .execute(&pool)
            .await
            .unwrap();

        let drift = flight_schema().detect_drift(&pool).await.unwrap();

        assert!(drift.iter().any(|d| matches!(d, SchemaDrift::TypeMismatch { column, .. } if column == "Id")));
        assert!(drift.iter().any(|d| matches!(
            d,
            SchemaDrift::ConstraintMismatch { constraint, .. } if constraint == "PRIMARY KEY"
        )));
    }
}
