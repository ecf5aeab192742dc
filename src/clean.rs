//! Per-table cleaning: column normalization, last-wins deduplication and
//! permissive type coercion

use std::collections::HashSet;
use std::sync::OnceLock;

use polars::prelude::*;
use regex::Regex;
use tracing::{debug, warn};

use crate::frame::{has_column, has_columns};

/// Date layout of `fecha` and `fecha_alta`; anything after the date is ignored
pub const DATE_FORMAT: &str = "%Y-%m-%d";

const ROW_INDEX: &str = "__row_index";

fn synthetic_index_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:Unnamed: \d+|column_\d+$)").expect("static pattern compiles")
    })
}

/// Clean a raw header: drop the synthetic index marker and surrounding
/// whitespace. Returns `None` when nothing meaningful is left.
///
/// Synthetic markers are the `Unnamed: N` prefix pandas writes for its index
/// and the `column_N` placeholder the CSV reader gives a blank header.
pub fn clean_column_name(raw: &str) -> Option<String> {
    let stripped = synthetic_index_pattern().replace(raw.trim(), "");
    let trimmed = stripped.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Normalize column names and drop synthetic index and entirely empty columns.
///
/// A zero-row frame keeps all of its named columns.
pub fn normalize_columns(df: DataFrame) -> PolarsResult<DataFrame> {
    let height = df.height();
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(df.width());

    for column in df.get_columns() {
        let raw = column.name().as_str();
        let Some(name) = clean_column_name(raw) else {
            debug!(column = raw, "dropping synthetic index column");
            continue;
        };
        if height > 0 && column.null_count() == height {
            debug!(column = %name, "dropping empty column");
            continue;
        }
        if !seen.insert(name.clone()) {
            warn!(column = %name, "dropping column whose cleaned name is already taken");
            continue;
        }
        kept.push(column.clone().with_name(name.into()));
    }

    DataFrame::new(kept)
}

/// Collapse rows sharing `keys` to the last one under a stable ascending sort.
///
/// Returns the frame untouched when `keys` is empty or any key column is
/// missing. The tie-break is positional: the surviving row is the one sorting
/// last, whatever its other columns hold.
pub fn dedup_last_by(df: DataFrame, keys: &[&str]) -> PolarsResult<DataFrame> {
    if keys.is_empty() || !has_columns(&df, keys) {
        return Ok(df);
    }

    let key_exprs: Vec<Expr> = keys.iter().map(|key| col(*key)).collect();
    let sort_options = SortMultipleOptions::default()
        .with_maintain_order(true)
        .with_nulls_last(true);

    let deduped = df
        .lazy()
        .sort_by_exprs(key_exprs.clone(), sort_options)
        .with_row_index(ROW_INDEX, None)
        .filter(col(ROW_INDEX).eq(col(ROW_INDEX).max().over(key_exprs)))
        .collect()?;

    deduped.drop(ROW_INDEX)
}

/// Parse the listed columns as dates; unparseable values become null
pub fn coerce_dates(df: DataFrame, columns: &[&str]) -> PolarsResult<DataFrame> {
    let options = StrptimeOptions {
        format: Some(DATE_FORMAT.into()),
        strict: false,
        exact: false,
        ..Default::default()
    };

    let exprs: Vec<Expr> = columns
        .iter()
        .filter(|name| has_column(&df, name))
        .map(|name| {
            col(*name)
                .cast(DataType::String)
                .str()
                .to_date(options.clone())
                .alias(*name)
        })
        .collect();

    if exprs.is_empty() {
        return Ok(df);
    }
    df.lazy().with_columns(exprs).collect()
}

/// Cast the listed columns to `Float64`; unparseable values become null
pub fn coerce_numeric(df: DataFrame, columns: &[&str]) -> PolarsResult<DataFrame> {
    let exprs: Vec<Expr> = columns
        .iter()
        .filter(|name| has_column(&df, name))
        .map(|name| col(*name).cast(DataType::Float64).alias(*name))
        .collect();

    if exprs.is_empty() {
        return Ok(df);
    }
    df.lazy().with_columns(exprs).collect()
}
