//! Feature fetch: one join query per invocation

use super::PipelineSpec;
use crate::error::{Error, Result};
use crate::frame::{FeatureValue, KeyKind, RawRow, RowKey};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Executor, QueryBuilder, Row, Sqlite, SqlitePool, Statement, TypeInfo, ValueRef};

/// Unscored rows with their keys kept apart from the feature values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedBatch {
    pub keys: Vec<RowKey>,
    pub rows: Vec<RawRow>,
}

impl FetchedBatch {
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Run the pipeline's join query, optionally narrowed to one key
///
/// Rows come back ordered by key. The whole result set is read before returning.
pub async fn fetch_batch(
    pool: &SqlitePool,
    spec: &PipelineSpec,
    key: Option<&RowKey>,
) -> Result<FetchedBatch> {
    let mut query = QueryBuilder::<Sqlite>::new(spec.select_sql);
    if let Some(key) = key {
        query.push(" AND ").push(spec.key_expr).push(" = ");
        match key {
            RowKey::Integer(v) => query.push_bind(*v),
            RowKey::Text(s) => query.push_bind(s.clone()),
        };
    }
    query.push(" ORDER BY ").push(spec.key_expr);

    let rows = query.build().fetch_all(pool).await?;

    let mut batch = FetchedBatch::default();
    for row in &rows {
        let (key, raw) = decode_row(row, spec.key_alias, spec.target.key_kind)?;
        batch.keys.push(key);
        batch.rows.push(raw);
    }
    Ok(batch)
}

/// Result column names of the join query, read from the prepared statement
///
/// No rows are fetched. A query that does not prepare against this store is a
/// configuration fault.
pub async fn result_columns(pool: &SqlitePool, spec: &PipelineSpec) -> Result<Vec<String>> {
    let statement = pool.prepare(spec.select_sql).await.map_err(|e| {
        Error::Config(format!("{} join query does not prepare: {}", spec.name, e))
    })?;

    Ok(statement
        .columns()
        .iter()
        .map(|column| column.name().to_string())
        .collect())
}

fn decode_row(row: &SqliteRow, key_alias: &str, key_kind: KeyKind) -> Result<(RowKey, RawRow)> {
    let mut key = None;
    let mut raw = RawRow::new();

    for column in row.columns() {
        let name = column.name();
        if name == key_alias {
            key = Some(decode_key(row, column.ordinal(), key_kind)?);
        } else {
            raw.insert(name.to_string(), decode_value(row, column.ordinal(), name)?);
        }
    }

    let key = key.ok_or_else(|| {
        Error::Config(format!("Join query returns no '{}' column", key_alias))
    })?;
    Ok((key, raw))
}

fn decode_key(row: &SqliteRow, index: usize, kind: KeyKind) -> Result<RowKey> {
    let key = match kind {
        KeyKind::Integer => row.try_get::<Option<i64>, _>(index)?.map(RowKey::Integer),
        KeyKind::Text => row.try_get::<Option<String>, _>(index)?.map(RowKey::Text),
    };
    key.ok_or_else(|| Error::Feature("row with NULL primary key".to_string()))
}

/// Decode by the value's storage class; SQLite columns are loosely typed
fn decode_value(row: &SqliteRow, index: usize, name: &str) -> Result<FeatureValue> {
    let value = row.try_get_raw(index)?;
    if value.is_null() {
        return Ok(FeatureValue::Missing);
    }
    let storage = value.type_info().name().to_string();

    match storage.as_str() {
        "INTEGER" => Ok(FeatureValue::Number(row.try_get::<i64, _>(index)? as f64)),
        "REAL" => Ok(FeatureValue::Number(row.try_get::<f64, _>(index)?)),
        "TEXT" => Ok(FeatureValue::Text(row.try_get::<String, _>(index)?)),
        other => Err(Error::Feature(format!(
            "column {} holds unsupported {} value",
            name, other
        ))),
    }
}
