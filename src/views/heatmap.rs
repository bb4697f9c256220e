//! Trips by day of week and hour of day.
//!
//! Counts trips per (weekday, hour) cell and decodes the result into a dense
//! 7×24 matrix whose day axis follows the fixed Monday→Sunday ordering. The
//! ordering is a correctness property: the group-by's natural ordering is
//! alphabetical, which would silently put Friday first on the chart.

use arrow::datatypes::DataType;
use async_trait::async_trait;
use datafusion::functions_aggregate::expr_fn::count;
use datafusion::prelude::*;
use tracing::warn;

use crate::exceptions::TripBoardResult;
use crate::views::{i64_at, string_at, AggregationView, WEEK_DAYS};

/// Dense trip counts per weekday and hour, Monday first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeatmapMatrix {
    /// Row labels, always [`WEEK_DAYS`] in order.
    pub days: [&'static str; 7],
    /// `counts[day][hour]`, day indexed per `days`, hour 0–23.
    pub counts: [[u64; 24]; 7],
}

impl HeatmapMatrix {
    fn empty() -> Self {
        Self {
            days: WEEK_DAYS,
            counts: [[0; 24]; 7],
        }
    }

    /// Sum of all cells.
    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }
}

/// The day×hour heatmap view.
#[derive(Default)]
pub struct DayHourHeatmap;

#[async_trait]
impl AggregationView for DayHourHeatmap {
    fn name(&self) -> &'static str {
        "day_hour_heatmap"
    }

    async fn evaluate(&self, filtered: DataFrame) -> TripBoardResult<DataFrame> {
        let result = filtered
            .aggregate(
                vec![col("pickup_day_of_week"), col("pickup_hour")],
                vec![count(lit(1)).alias("trip_count")],
            )?
            .select(vec![
                col("pickup_day_of_week"),
                cast(col("pickup_hour"), DataType::Int64).alias("pickup_hour"),
                col("trip_count"),
            ])?;
        Ok(result)
    }
}

/// Evaluates the view and decodes it into the fixed-order matrix. Cells with
/// an unrecognized day label or out-of-range hour are skipped with a
/// warning; they cannot be placed on the week axis.
pub async fn compute(filtered: DataFrame) -> TripBoardResult<HeatmapMatrix> {
    let batches = DayHourHeatmap.evaluate(filtered).await?.collect().await?;
    let mut matrix = HeatmapMatrix::empty();
    for batch in &batches {
        for row in 0..batch.num_rows() {
            let (Some(day), Some(hour), Some(trips)) = (
                string_at(batch, 0, row)?,
                i64_at(batch, 1, row)?,
                i64_at(batch, 2, row)?,
            ) else {
                continue;
            };
            let Some(day_idx) = WEEK_DAYS.iter().position(|d| *d == day) else {
                warn!(day, "heatmap skipped a cell with an unrecognized day label");
                continue;
            };
            if !(0..24).contains(&hour) {
                warn!(hour, "heatmap skipped a cell with an out-of-range hour");
                continue;
            }
            matrix.counts[day_idx][hour as usize] = trips as u64;
        }
    }
    Ok(matrix)
}
