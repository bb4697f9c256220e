//! Scalar key metrics over the filtered view.
//!
//! Undefined on an empty view: the mean of zero rows is NaN, so `compute`
//! refuses empty input outright rather than letting NaN reach the metrics
//! row. The session short-circuits on `FilteredView::Empty` before calling
//! this, making the guard here a second line of defense for direct callers.

use datafusion::functions_aggregate::expr_fn::{avg, count, sum};
use datafusion::prelude::*;
use datafusion::scalar::ScalarValue;

use crate::exceptions::{TripBoardError, TripBoardResult};

/// The five key metrics shown above the charts.
#[derive(Debug, Clone, PartialEq)]
pub struct TripSummary {
    pub total_trips: u64,
    pub avg_fare: f64,
    pub total_revenue: f64,
    pub avg_distance: f64,
    pub avg_duration_minutes: f64,
}

/// Computes the scalar summary of a non-empty filtered view.
pub async fn compute(filtered: DataFrame) -> TripBoardResult<TripSummary> {
    let aggregated = filtered.aggregate(
        vec![],
        vec![
            count(lit(1)).alias("total_trips"),
            avg(col("fare_amount")).alias("avg_fare"),
            sum(col("total_amount")).alias("total_revenue"),
            avg(col("trip_distance")).alias("avg_distance"),
            avg(col("trip_duration_minutes")).alias("avg_duration_minutes"),
        ],
    )?;
    let batches = aggregated.collect().await?;
    let batch = batches
        .first()
        .ok_or_else(|| TripBoardError::Schema("summary aggregate produced no output".into()))?;

    let total_trips = match ScalarValue::try_from_array(batch.column(0), 0)? {
        ScalarValue::Int64(Some(n)) if n > 0 => n as u64,
        _ => {
            return Err(TripBoardError::InvalidParameter(
                "scalar summary is undefined for an empty view".to_string(),
            ))
        }
    };

    Ok(TripSummary {
        total_trips,
        avg_fare: float_scalar(batch.column(1), "avg_fare")?,
        total_revenue: float_scalar(batch.column(2), "total_revenue")?,
        avg_distance: float_scalar(batch.column(3), "avg_distance")?,
        avg_duration_minutes: float_scalar(batch.column(4), "avg_duration_minutes")?,
    })
}

fn float_scalar(array: &arrow::array::ArrayRef, name: &str) -> TripBoardResult<f64> {
    match ScalarValue::try_from_array(array, 0)? {
        ScalarValue::Float64(Some(v)) => Ok(v),
        other => Err(TripBoardError::Schema(format!(
            "summary metric '{name}' is not a Float64, found {other:?}"
        ))),
    }
}
