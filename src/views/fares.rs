//! Average fare by hour of day.
//!
//! Hours with no rows in the filtered set are simply absent from the output,
//! not zero-filled: a zero would read as "free rides at 4 AM" on the chart.

use arrow::datatypes::DataType;
use async_trait::async_trait;
use datafusion::functions_aggregate::expr_fn::avg;
use datafusion::prelude::*;

use crate::exceptions::TripBoardResult;
use crate::views::{f64_at, i64_at, AggregationView};

/// One point of the fare-by-hour line.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyFare {
    pub hour: u8,
    pub avg_fare: f64,
}

/// The average-fare-by-hour view.
#[derive(Default)]
pub struct AverageFareByHour;

#[async_trait]
impl AggregationView for AverageFareByHour {
    fn name(&self) -> &'static str {
        "average_fare_by_hour"
    }

    async fn evaluate(&self, filtered: DataFrame) -> TripBoardResult<DataFrame> {
        let result = filtered
            .aggregate(
                vec![col("pickup_hour")],
                vec![avg(col("fare_amount")).alias("avg_fare")],
            )?
            .select(vec![
                cast(col("pickup_hour"), DataType::Int64).alias("pickup_hour"),
                col("avg_fare"),
            ])?
            .sort(vec![col("pickup_hour").sort(true, false)])?;
        Ok(result)
    }
}

/// Evaluates the view and decodes it, hours ascending.
pub async fn compute(filtered: DataFrame) -> TripBoardResult<Vec<HourlyFare>> {
    let batches = AverageFareByHour.evaluate(filtered).await?.collect().await?;
    let mut out = Vec::new();
    for batch in &batches {
        for row in 0..batch.num_rows() {
            let (Some(hour), Some(avg_fare)) = (i64_at(batch, 0, row)?, f64_at(batch, 1, row)?)
            else {
                continue;
            };
            out.push(HourlyFare {
                hour: hour as u8,
                avg_fare,
            });
        }
    }
    Ok(out)
}
