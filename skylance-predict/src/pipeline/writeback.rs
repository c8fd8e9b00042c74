//! Writeback of predictions, one transaction per batch

use super::{Prediction, TargetTable};
use crate::error::{Error, Result};
use crate::frame::RowKey;
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::{Sqlite, SqlitePool};
use tracing::debug;

/// Write `predictions[i]` to the row keyed `keys[i]`
///
/// Only rows whose prediction column is still NULL are touched. Returns the number of
/// rows this call changed. Any failed statement rolls back the whole batch.
pub async fn commit_predictions(
    pool: &SqlitePool,
    target: &TargetTable,
    keys: &[RowKey],
    predictions: &[Prediction],
) -> Result<usize> {
    if keys.len() != predictions.len() {
        return Err(Error::Scorer(format!(
            "{} predictions for {} rows",
            predictions.len(),
            keys.len()
        )));
    }

    let sql = format!(
        "UPDATE {table} SET {column} = ? WHERE {key} = ? AND {column} IS NULL",
        table = target.table,
        column = target.prediction_column,
        key = target.key_column,
    );

    let mut tx = pool.begin().await?;
    let mut updated = 0;

    for (key, prediction) in keys.iter().zip(predictions) {
        let query = bind_key(bind_prediction(sqlx::query(&sql), prediction), key);
        let result = query.execute(&mut *tx).await?;
        if result.rows_affected() == 0 {
            debug!(table = target.table, %key, "Row already scored, skipped");
        }
        updated += result.rows_affected() as usize;
    }

    tx.commit().await?;
    Ok(updated)
}

fn bind_prediction<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    prediction: &Prediction,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match prediction {
        Prediction::Label(v) => query.bind(*v),
        Prediction::Probability(v) => query.bind(*v),
    }
}

fn bind_key<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    key: &RowKey,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match key {
        RowKey::Integer(v) => query.bind(*v),
        RowKey::Text(s) => query.bind(s.clone()),
    }
}
