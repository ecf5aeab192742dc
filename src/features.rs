//! Per-customer aggregation and feature construction

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use polars::prelude::*;
use tracing::info;

use crate::frame::{column_names, ensure_columns, has_column};
use crate::join::left_join_resolving;
use crate::schema::{
    AMOUNT, CITY, CUSTOMER_ID, FIRST_PURCHASE, PURCHASE_COUNT, QUANTITY, SALE_DATE, SALE_ID,
    SIGNUP_DATE, TENURE_DAYS, TOTAL_QUANTITY, TOTAL_SPEND,
};

/// Feature table with one row per customer
#[derive(Debug, Clone)]
pub struct CustomerFeatures {
    pub frame: DataFrame,
    /// City left out of the encoding, represented by all indicators false
    pub baseline_city: Option<String>,
    /// Indicator columns in the order they were added
    pub city_indicators: Vec<String>,
}

/// Group the filtered line items by customer.
///
/// Expects the row filter to have run: customer id, amount, quantity and date
/// are non-null on every row.
pub fn aggregate_customers(joined: DataFrame) -> PolarsResult<DataFrame> {
    let aggregated = joined
        .lazy()
        .group_by([col(CUSTOMER_ID)])
        .agg([
            col(AMOUNT).sum().alias(TOTAL_SPEND),
            col(SALE_ID)
                .drop_nulls()
                .n_unique()
                .cast(DataType::Int64)
                .alias(PURCHASE_COUNT),
            col(QUANTITY).sum().alias(TOTAL_QUANTITY),
            col(SALE_DATE).min().alias(FIRST_PURCHASE),
        ])
        .sort_by_exprs([col(CUSTOMER_ID)], SortMultipleOptions::default())
        .collect()?;

    info!(
        component = "aggregate",
        event = "stage.complete",
        customers = aggregated.height()
    );
    Ok(aggregated)
}

fn days_since_epoch(date: NaiveDate) -> i64 {
    date.signed_duration_since(DateTime::<Utc>::UNIX_EPOCH.date_naive())
        .num_days()
}

/// Join customer attributes, derive tenure and one-hot encode the city.
///
/// `antiguedad_dias` counts whole days from the first purchase to
/// `reference_date`; pass a fixed date for reproducible features.
///
/// # Arguments
/// * `aggregates` - Output of [`aggregate_customers`]
/// * `customers` - Cleaned customer table providing `ciudad`
/// * `reference_date` - Date tenure is measured against
///
/// # Returns
/// One row per customer with the city replaced by its indicator columns
pub fn build_customer_features(
    aggregates: DataFrame,
    customers: &DataFrame,
    reference_date: NaiveDate,
) -> PolarsResult<CustomerFeatures> {
    let attributes = ensure_columns(
        customers.clone(),
        &[
            (CUSTOMER_ID, DataType::String),
            (CITY, DataType::String),
            (SIGNUP_DATE, DataType::Date),
        ],
    )?
    .select([CUSTOMER_ID, CITY, SIGNUP_DATE])?;

    let (joined, _) = left_join_resolving(aggregates, attributes, CUSTOMER_ID, "features")?;

    let keep: Vec<Expr> = column_names(&joined)
        .iter()
        .filter(|name| name.as_str() != SIGNUP_DATE && name.as_str() != FIRST_PURCHASE)
        .map(|name| col(name.as_str()))
        .chain([(lit(days_since_epoch(reference_date))
            - col(FIRST_PURCHASE).cast(DataType::Int64))
        .alias(TENURE_DAYS)])
        .collect();
    let frame = joined.lazy().select(keep).collect()?;

    let features = one_hot_encode(frame, CITY)?;
    info!(
        component = "features",
        event = "stage.complete",
        customers = features.frame.height(),
        columns = features.frame.width(),
        reference_date = %reference_date,
        baseline_city = features.baseline_city.as_deref().unwrap_or("-")
    );
    Ok(features)
}

/// Replace `column` by boolean indicators, one per distinct non-null value
/// except the first in sorted order.
///
/// Indicators are named `<column>_<value>`; null values get all indicators
/// false, like the baseline.
pub fn one_hot_encode(df: DataFrame, column: &str) -> PolarsResult<CustomerFeatures> {
    if !has_column(&df, column) {
        return Ok(CustomerFeatures {
            frame: df,
            baseline_city: None,
            city_indicators: Vec::new(),
        });
    }

    let values = df.column(column)?.cast(&DataType::String)?;
    let categories: BTreeSet<String> = values
        .as_materialized_series()
        .str()?
        .into_iter()
        .flatten()
        .map(str::to_string)
        .collect();

    let mut categories = categories.into_iter();
    let baseline = categories.next();
    let mut indicator_names = Vec::new();
    let mut indicators = Vec::new();
    for category in categories {
        let name = format!("{column}_{category}");
        indicators.push(
            col(column)
                .cast(DataType::String)
                .eq(lit(category.as_str()))
                .fill_null(lit(false))
                .alias(name.as_str()),
        );
        indicator_names.push(name);
    }

    let frame = df.lazy().with_columns(indicators).collect()?.drop(column)?;
    Ok(CustomerFeatures {
        frame,
        baseline_city: baseline,
        city_indicators: indicator_names,
    })
}
