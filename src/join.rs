//! Left joins of the cleaned tables with explicit collision resolution, and
//! the row filter that guards aggregation

use std::fmt;

use polars::prelude::*;
use tracing::{debug, info};

use crate::clean::coerce_numeric;
use crate::data::SourceTables;
use crate::frame::{align_key_dtypes, column_names, ensure_columns};
use crate::schema::{
    AMOUNT, CUSTOMER_ID, DOCUMENTED_COLLISIONS, LEFT_SUFFIX, NUMERIC_COLUMNS, PRODUCT_ID,
    QUANTITY, REQUIRED_FOR_AGGREGATION, RIGHT_SUFFIX, SALE_DATE, SALE_ID,
};

/// A column both sides of a join contributed; the left value was kept
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCollision {
    pub step: &'static str,
    pub column: String,
}

impl ResolvedCollision {
    pub fn is_documented(&self) -> bool {
        DOCUMENTED_COLLISIONS.contains(&self.column.as_str())
    }
}

impl fmt::Display for ResolvedCollision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{step}: kept {col}{LEFT_SUFFIX}, dropped {col}{RIGHT_SUFFIX}",
            step = self.step,
            col = self.column
        )
    }
}

/// The denormalized line-item table and the collisions resolved building it
#[derive(Debug, Clone)]
pub struct JoinedTable {
    pub frame: DataFrame,
    pub collisions: Vec<ResolvedCollision>,
}

fn tagged(name: &str, suffix: &str) -> String {
    format!("{name}{suffix}")
}

/// Select every column, renaming the colliding ones with `suffix`
fn tag_side(df: DataFrame, names: &[String], collisions: &[String], suffix: &str) -> LazyFrame {
    let selection: Vec<Expr> = names
        .iter()
        .map(|name| {
            if collisions.contains(name) {
                col(name.as_str()).alias(tagged(name, suffix))
            } else {
                col(name.as_str())
            }
        })
        .collect();
    df.lazy().select(selection)
}

/// Left-outer join `right` onto `left` by `key`.
///
/// Every non-key column present on both sides is tagged `_x` (left) and `_y`
/// (right) for the join; afterwards the `_x` column is renamed back and the
/// `_y` column dropped. A key missing on either side is added as nulls.
///
/// # Arguments
/// * `left` - Line-item side; all of its rows are kept
/// * `right` - Lookup table joined onto `left`
/// * `key` - Join column shared by both frames
/// * `step` - Label recorded on every resolved collision
///
/// # Returns
/// The joined frame and the collisions resolved in favour of `left`
pub fn left_join_resolving(
    left: DataFrame,
    right: DataFrame,
    key: &str,
    step: &'static str,
) -> PolarsResult<(DataFrame, Vec<ResolvedCollision>)> {
    let left = ensure_columns(left, &[(key, DataType::String)])?;
    let right = ensure_columns(right, &[(key, DataType::String)])?;
    let (left, right) = align_key_dtypes(left, right, key)?;

    let left_names = column_names(&left);
    let right_names = column_names(&right);
    let collisions: Vec<String> = right_names
        .iter()
        .filter(|name| name.as_str() != key && left_names.contains(name))
        .cloned()
        .collect();

    let joined = tag_side(left, &left_names, &collisions, LEFT_SUFFIX).join(
        tag_side(right, &right_names, &collisions, RIGHT_SUFFIX),
        [col(key)],
        [col(key)],
        JoinArgs::new(JoinType::Left),
    );

    let mut selection: Vec<Expr> = left_names
        .iter()
        .map(|name| {
            if collisions.contains(name) {
                col(tagged(name, LEFT_SUFFIX)).alias(name.as_str())
            } else {
                col(name.as_str())
            }
        })
        .collect();
    selection.extend(
        right_names
            .iter()
            .filter(|name| name.as_str() != key && !collisions.contains(name))
            .map(|name| col(name.as_str())),
    );

    let frame = joined.select(selection).collect()?;
    let resolved = collisions
        .into_iter()
        .map(|column| ResolvedCollision { step, column })
        .collect();
    Ok((frame, resolved))
}

/// Build the denormalized table: line items ⟕ sales ⟕ customers ⟕ products.
///
/// Price, amount and quantity are parsed as floats once the joins are done.
pub fn join_sources(tables: &SourceTables) -> PolarsResult<JoinedTable> {
    let mut collisions = Vec::new();

    let (frame, found) = left_join_resolving(
        tables.line_items.clone(),
        tables.sales.clone(),
        SALE_ID,
        "line_items+sales",
    )?;
    collisions.extend(found);

    let (frame, found) =
        left_join_resolving(frame, tables.customers.clone(), CUSTOMER_ID, "+customers")?;
    collisions.extend(found);

    let (frame, found) =
        left_join_resolving(frame, tables.products.clone(), PRODUCT_ID, "+products")?;
    collisions.extend(found);

    let frame = coerce_numeric(frame, &NUMERIC_COLUMNS)?;

    for collision in &collisions {
        debug!(
            component = "join",
            event = "collision.resolved",
            step = collision.step,
            column = %collision.column,
            documented = collision.is_documented()
        );
    }
    info!(
        component = "join",
        event = "stage.complete",
        rows = frame.height(),
        columns = frame.width(),
        collisions = collisions.len()
    );

    Ok(JoinedTable { frame, collisions })
}

/// Drop rows missing customer id, amount, quantity or date.
///
/// An absent required column counts as all-null.
pub fn drop_incomplete_rows(df: DataFrame) -> PolarsResult<DataFrame> {
    let df = ensure_columns(
        df,
        &[
            (CUSTOMER_ID, DataType::String),
            (AMOUNT, DataType::Float64),
            (QUANTITY, DataType::Float64),
            (SALE_DATE, DataType::Date),
            (SALE_ID, DataType::String),
        ],
    )?;

    let complete = REQUIRED_FOR_AGGREGATION
        .iter()
        .fold(lit(true), |acc, name| acc.and(col(*name).is_not_null()));

    let rows_in = df.height();
    let filtered = df.lazy().filter(complete).collect()?;
    info!(
        component = "row_filter",
        event = "stage.complete",
        rows_in,
        rows_out = filtered.height()
    );
    Ok(filtered)
}
