//! Pure normalization of fetched rows into a scorer frame
//!
//! Order of operations per row: remaps, then placeholder defaults, then projection onto
//! the feature schema with kind coercion. No store access.

use super::PipelineSpec;
use crate::error::{Error, Result};
use crate::frame::{FeatureColumn, FeatureFrame, FeatureKind, FeatureValue, RawRow};

/// Normalize a whole batch, preserving row order
pub fn normalize_batch(spec: &PipelineSpec, rows: &[RawRow]) -> Result<FeatureFrame> {
    let mut frame = FeatureFrame::new(spec.schema.clone());
    for raw in rows {
        frame.push_row(normalize_row(spec, raw)?)?;
    }
    Ok(frame)
}

/// One row in schema order
///
/// A schema column that neither the query nor a default provides is a configuration
/// fault, not a data fault.
pub fn normalize_row(spec: &PipelineSpec, raw: &RawRow) -> Result<Vec<FeatureValue>> {
    let mut row = raw.clone();

    for remap in &spec.remaps {
        if let Some(value) = row.get_mut(remap.column) {
            *value = remap.apply(value);
        }
    }

    for (column, value) in &spec.defaults {
        row.insert(column.to_string(), value.clone());
    }

    spec.schema
        .columns()
        .iter()
        .map(|column| {
            let value = row.remove(&column.name).ok_or_else(|| {
                Error::Config(format!(
                    "{} pipeline provides no '{}' feature",
                    spec.name, column.name
                ))
            })?;
            coerce(column, value)
        })
        .collect()
}

/// Check that query columns and defaults supply the key and every feature
///
/// Run once at startup so a query that drifted from the feature schema fails before
/// any request is served.
pub fn check_feature_sources(spec: &PipelineSpec, query_columns: &[String]) -> Result<()> {
    let provided = |name: &str| query_columns.iter().any(|c| c == name);

    if !provided(spec.key_alias) {
        return Err(Error::Config(format!(
            "{} join query returns no '{}' column",
            spec.name, spec.key_alias
        )));
    }

    let missing: Vec<&str> = spec
        .schema
        .columns()
        .iter()
        .map(|column| column.name.as_str())
        .filter(|name| !provided(name) && !spec.defaults.iter().any(|(d, _)| *d == *name))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "{} pipeline provides no {} feature",
            spec.name,
            missing.join(", ")
        )))
    }
}

fn coerce(column: &FeatureColumn, value: FeatureValue) -> Result<FeatureValue> {
    match (column.kind, value) {
        (FeatureKind::Categorical, FeatureValue::Number(v)) => {
            let label = if v.fract() == 0.0 {
                format!("{}", v as i64)
            } else {
                v.to_string()
            };
            Ok(FeatureValue::Text(label))
        }
        (FeatureKind::Numeric, FeatureValue::Text(s)) => s
            .trim()
            .parse::<f64>()
            .map(FeatureValue::Number)
            .map_err(|_| {
                Error::Feature(format!("column {} holds non-numeric '{}'", column.name, s))
            }),
        (_, value) => Ok(value),
    }
}
