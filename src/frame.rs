//! Small DataFrame helpers used across the cleaning and join stages

use polars::prelude::*;

/// Column names of a frame, in order
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .map(|column| column.name().to_string())
        .collect()
}

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_index(name).is_some()
}

pub fn has_columns(df: &DataFrame, names: &[&str]) -> bool {
    names.iter().all(|name| has_column(df, name))
}

/// Add every missing column as an all-null column of the given type.
///
/// Downstream stages treat an absent column exactly like a column of nulls,
/// so a source file that lost a column still flows through the pipeline.
pub fn ensure_columns(mut df: DataFrame, columns: &[(&str, DataType)]) -> PolarsResult<DataFrame> {
    let height = df.height();
    for (name, dtype) in columns {
        if !has_column(&df, name) {
            df.with_column(Series::full_null((*name).into(), height, dtype))?;
        }
    }
    Ok(df)
}

/// Make the join key of both frames share a dtype.
///
/// Equal dtypes are left alone. Two numeric keys are cast to `Int64` when both
/// are integers and to `Float64` otherwise, so an id written as `1.0` still
/// matches `1`. Any other mismatch casts both keys to text.
pub fn align_key_dtypes(
    left: DataFrame,
    right: DataFrame,
    key: &str,
) -> PolarsResult<(DataFrame, DataFrame)> {
    let left_dtype = left.column(key)?.dtype().clone();
    let right_dtype = right.column(key)?.dtype().clone();
    if left_dtype == right_dtype {
        return Ok((left, right));
    }

    let target = common_key_dtype(&left_dtype, &right_dtype);
    let cast_key = |df: DataFrame| {
        df.lazy()
            .with_columns([col(key).cast(target.clone()).alias(key)])
            .collect()
    };
    Ok((cast_key(left)?, cast_key(right)?))
}

fn common_key_dtype(left: &DataType, right: &DataType) -> DataType {
    if left.is_integer() && right.is_integer() {
        DataType::Int64
    } else if left.is_primitive_numeric() && right.is_primitive_numeric() {
        DataType::Float64
    } else {
        DataType::String
    }
}
