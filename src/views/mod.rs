//! # Aggregation Views
//!
//! The five chart queries and the scalar summary the dashboard renders, each
//! a pure transformation of the filtered trip view with no shared state
//! between them:
//!
//! - [`zones::TopPickupZones`]: trip counts for the ten busiest pickup zones.
//! - [`fares::AverageFareByHour`]: mean fare per pickup hour.
//! - [`distances::DistanceHistogram`]: a 50-bin equal-width histogram of trip
//!   distances.
//! - [`payments::PaymentBreakdown`]: trip counts per payment type, labeled.
//! - [`heatmap::DayHourHeatmap`]: trip counts per (weekday, hour) cell.
//! - [`summary::compute`]: the five scalar key metrics.
//!
//! Each chart view implements [`AggregationView`], producing a small result
//! table as a lazy plan, and ships a typed `compute` helper that collects and
//! decodes that table for the presentation layer. All views expect a
//! non-empty input; the session never calls them when the filter produced
//! zero rows.

pub mod distances;
pub mod fares;
pub mod heatmap;
pub mod payments;
pub mod summary;
pub mod zones;

use arrow::array::{Array, Float64Array, Int64Array, StringArray};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use datafusion::prelude::DataFrame;

use crate::exceptions::{TripBoardError, TripBoardResult};

/// The fixed week ordering every day-keyed output must respect, regardless
/// of the group-by's natural (alphabetical) ordering.
pub const WEEK_DAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// A named aggregation over the filtered trip view.
///
/// `evaluate` returns the view's result as a new (small) lazy plan; it never
/// mutates its input. Implementations may run intermediate aggregates (the
/// histogram needs the observed min/max before it can bin), which is why the
/// method is async.
#[async_trait]
pub trait AggregationView {
    /// Stable name of the view, used in logs.
    fn name(&self) -> &'static str;

    /// Produces the view's result table from the filtered trip view.
    async fn evaluate(&self, filtered: DataFrame) -> TripBoardResult<DataFrame>;
}

// Column decoding helpers shared by the typed `compute` functions. The views
// cast their output columns explicitly, so a downcast failure here means the
// view's own plan is wrong.

pub(crate) fn string_at(batch: &RecordBatch, column: usize, row: usize) -> TripBoardResult<Option<String>> {
    let array = batch
        .column(column)
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| decode_error(batch, column, "Utf8"))?;
    if array.is_null(row) {
        Ok(None)
    } else {
        Ok(Some(array.value(row).to_string()))
    }
}

pub(crate) fn i64_at(batch: &RecordBatch, column: usize, row: usize) -> TripBoardResult<Option<i64>> {
    let array = batch
        .column(column)
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or_else(|| decode_error(batch, column, "Int64"))?;
    if array.is_null(row) {
        Ok(None)
    } else {
        Ok(Some(array.value(row)))
    }
}

pub(crate) fn f64_at(batch: &RecordBatch, column: usize, row: usize) -> TripBoardResult<Option<f64>> {
    let array = batch
        .column(column)
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| decode_error(batch, column, "Float64"))?;
    if array.is_null(row) {
        Ok(None)
    } else {
        Ok(Some(array.value(row)))
    }
}

fn decode_error(batch: &RecordBatch, column: usize, expected: &str) -> TripBoardError {
    TripBoardError::Schema(format!(
        "view output column '{}' is not {expected}",
        batch.schema().field(column).name()
    ))
}
