//! Trip distance distribution.
//!
//! A fixed 50-bin equal-width histogram whose edges come from the filtered
//! set's observed min and max. Binning is expressed as a CASE expression over
//! the lazy plan, so only the per-bin counts are ever materialized. When all
//! distances are equal the histogram collapses to a single occupied bin.

use async_trait::async_trait;
use datafusion::functions_aggregate::expr_fn::{count, max, min};
use datafusion::prelude::*;
use datafusion_expr::{Case as DFCase, Expr};
use datafusion::scalar::ScalarValue;

use crate::exceptions::{TripBoardError, TripBoardResult};
use crate::views::{i64_at, AggregationView};

/// Number of equal-width bins.
pub const DISTANCE_BINS: usize = 50;

/// One bar of the distance histogram. `lower` is inclusive; `upper` is
/// exclusive except for the last bin.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: u64,
}

/// The distance-distribution view.
#[derive(Default)]
pub struct DistanceHistogram;

#[async_trait]
impl AggregationView for DistanceHistogram {
    fn name(&self) -> &'static str {
        "distance_histogram"
    }

    async fn evaluate(&self, filtered: DataFrame) -> TripBoardResult<DataFrame> {
        let (lo, hi) = observed_range(&filtered).await?;
        binned_counts(filtered, lo, hi)
    }
}

/// Evaluates the view and decodes it into a dense bin list: bins with no
/// rows are present with a zero count, which is what a histogram renderer
/// expects.
pub async fn compute(filtered: DataFrame) -> TripBoardResult<Vec<HistogramBin>> {
    let (lo, hi) = observed_range(&filtered).await?;
    let batches = binned_counts(filtered, lo, hi)?.collect().await?;

    let edges = bin_edges(lo, hi);
    let mut bins: Vec<HistogramBin> = edges
        .iter()
        .map(|&(lower, upper)| HistogramBin {
            lower,
            upper,
            count: 0,
        })
        .collect();
    for batch in &batches {
        for row in 0..batch.num_rows() {
            let (Some(idx), Some(n)) = (i64_at(batch, 0, row)?, i64_at(batch, 1, row)?) else {
                continue;
            };
            if let Some(bin) = bins.get_mut(idx as usize) {
                bin.count = n as u64;
            }
        }
    }
    Ok(bins)
}

/// Exact min and max of `trip_distance` in the filtered set.
async fn observed_range(filtered: &DataFrame) -> TripBoardResult<(f64, f64)> {
    let aggregated = filtered.clone().aggregate(
        vec![],
        vec![
            min(col("trip_distance")).alias("lo"),
            max(col("trip_distance")).alias("hi"),
        ],
    )?;
    let batches = aggregated.collect().await?;
    let batch = batches
        .first()
        .ok_or_else(|| TripBoardError::Schema("distance range aggregate produced no output".into()))?;
    let lo = float_scalar(batch.column(0))?;
    let hi = float_scalar(batch.column(1))?;
    Ok((lo, hi))
}

fn float_scalar(array: &arrow::array::ArrayRef) -> TripBoardResult<f64> {
    match ScalarValue::try_from_array(array, 0)? {
        ScalarValue::Float64(Some(v)) => Ok(v),
        other => Err(TripBoardError::InvalidParameter(format!(
            "distance histogram is undefined without observed distances, found {other:?}"
        ))),
    }
}

/// The (lower, upper) edges of every bin. A degenerate range yields a single
/// zero-width bin.
fn bin_edges(lo: f64, hi: f64) -> Vec<(f64, f64)> {
    if hi <= lo {
        return vec![(lo, hi.max(lo))];
    }
    let width = (hi - lo) / DISTANCE_BINS as f64;
    (0..DISTANCE_BINS)
        .map(|i| {
            let lower = lo + i as f64 * width;
            let upper = if i == DISTANCE_BINS - 1 {
                hi
            } else {
                lo + (i + 1) as f64 * width
            };
            (lower, upper)
        })
        .collect()
}

/// Maps each distance to its bin index with a CASE expression and counts per
/// bin. Output columns: `bin` (Int64), `trip_count` (Int64), sparse over
/// occupied bins, sorted by bin.
fn binned_counts(filtered: DataFrame, lo: f64, hi: f64) -> TripBoardResult<DataFrame> {
    let edges = bin_edges(lo, hi);
    let n = edges.len();
    let when_then_expr = edges
        .iter()
        .enumerate()
        .map(|(i, (lower, upper))| {
            let condition = if i == n - 1 {
                col("trip_distance")
                    .gt_eq(lit(*lower))
                    .and(col("trip_distance").lt_eq(lit(*upper)))
            } else {
                col("trip_distance")
                    .gt_eq(lit(*lower))
                    .and(col("trip_distance").lt(lit(*upper)))
            };
            (Box::new(condition), Box::new(lit(i as i64)))
        })
        .collect::<Vec<_>>();
    let bin_expr = Expr::Case(DFCase {
        expr: None,
        when_then_expr,
        else_expr: Some(Box::new(lit(ScalarValue::Int64(None)))),
    });

    let result = filtered
        .select(vec![bin_expr.alias("bin")])?
        .aggregate(vec![col("bin")], vec![count(lit(1)).alias("trip_count")])?
        .sort(vec![col("bin").sort(true, false)])?;
    Ok(result)
}
