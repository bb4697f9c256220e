//! Payment type breakdown.
//!
//! Counts trips per payment code and attaches the fixed human-readable
//! labels. The label mapping is a total function over the integer domain
//! with an explicit "Other" arm for codes outside the published set, so an
//! unexpected code shows up labeled rather than crashing or vanishing.

use arrow::datatypes::DataType;
use async_trait::async_trait;
use datafusion::functions_aggregate::expr_fn::count;
use datafusion::prelude::*;

use crate::exceptions::TripBoardResult;
use crate::views::{i64_at, AggregationView};

/// The published payment-code labels; anything else is "Other".
pub fn payment_label(code: i64) -> &'static str {
    match code {
        1 => "Credit card",
        2 => "Cash",
        3 => "No charge",
        4 => "Dispute",
        5 => "Unknown",
        _ => "Other",
    }
}

/// The label the dashboard's payment-type control shows for `code`.
pub fn payment_option_label(code: i64) -> String {
    format!("{} - {}", code, payment_label(code))
}

/// One bar of the payment breakdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentCount {
    pub code: i64,
    pub label: String,
    pub trips: u64,
}

/// The payment-breakdown view.
#[derive(Default)]
pub struct PaymentBreakdown;

#[async_trait]
impl AggregationView for PaymentBreakdown {
    fn name(&self) -> &'static str {
        "payment_breakdown"
    }

    async fn evaluate(&self, filtered: DataFrame) -> TripBoardResult<DataFrame> {
        let result = filtered
            .aggregate(
                vec![col("payment_type")],
                vec![count(lit(1)).alias("trip_count")],
            )?
            .select(vec![
                cast(col("payment_type"), DataType::Int64).alias("payment_type"),
                col("trip_count"),
            ])?
            .sort(vec![
                col("trip_count").sort(false, false),
                col("payment_type").sort(true, false),
            ])?;
        Ok(result)
    }
}

/// Evaluates the view and decodes it, labeled and sorted by count
/// descending (ties by code ascending).
pub async fn compute(filtered: DataFrame) -> TripBoardResult<Vec<PaymentCount>> {
    let batches = PaymentBreakdown.evaluate(filtered).await?.collect().await?;
    let mut out = Vec::new();
    for batch in &batches {
        for row in 0..batch.num_rows() {
            let (Some(code), Some(trips)) = (i64_at(batch, 0, row)?, i64_at(batch, 1, row)?)
            else {
                continue;
            };
            out.push(PaymentCount {
                code,
                label: payment_option_label(code),
                trips: trips as u64,
            });
        }
    }
    Ok(out)
}
