//! Top pickup zones by trip count.
//!
//! Groups on `pickup_zone` when the view is enriched, falling back to the
//! raw `pickup_location_id` otherwise; enrichment is an enhancement, not a
//! prerequisite. Ordering is trip count descending with ties broken by
//! group key ascending, so the top-10 cut is deterministic.

use arrow::datatypes::DataType;
use async_trait::async_trait;
use datafusion::functions_aggregate::expr_fn::count;
use datafusion::prelude::*;

use crate::exceptions::TripBoardResult;
use crate::views::{i64_at, string_at, AggregationView};

/// Default number of zones kept.
pub const TOP_ZONES: usize = 10;

/// One bar of the top-zones chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneCount {
    pub zone: String,
    pub trips: u64,
}

/// The top-pickup-zones view.
pub struct TopPickupZones {
    pub limit: usize,
}

impl Default for TopPickupZones {
    fn default() -> Self {
        Self { limit: TOP_ZONES }
    }
}

impl TopPickupZones {
    fn group_column(filtered: &DataFrame) -> &'static str {
        if filtered.schema().field_with_name(None, "pickup_zone").is_ok() {
            "pickup_zone"
        } else {
            "pickup_location_id"
        }
    }
}

#[async_trait]
impl AggregationView for TopPickupZones {
    fn name(&self) -> &'static str {
        "top_pickup_zones"
    }

    async fn evaluate(&self, filtered: DataFrame) -> TripBoardResult<DataFrame> {
        let group_col = Self::group_column(&filtered);
        // Sort on the native group key, before the display cast: location
        // ids must tie-break numerically, not as "10" < "9".
        let result = filtered
            .aggregate(
                vec![col(group_col)],
                vec![count(lit(1)).alias("trip_count")],
            )?
            .sort(vec![
                col("trip_count").sort(false, false),
                col(group_col).sort(true, false),
            ])?
            .limit(0, Some(self.limit))?
            .select(vec![
                cast(col(group_col), DataType::Utf8).alias("zone"),
                col("trip_count"),
            ])?;
        Ok(result)
    }
}

/// Evaluates the view and decodes it for the presentation layer. Rows whose
/// group key is null (unenriched trips with no location id) are labeled
/// `"(unknown)"`.
pub async fn compute(filtered: DataFrame, limit: usize) -> TripBoardResult<Vec<ZoneCount>> {
    let view = TopPickupZones { limit };
    let batches = view.evaluate(filtered).await?.collect().await?;
    let mut out = Vec::new();
    for batch in &batches {
        for row in 0..batch.num_rows() {
            let zone = string_at(batch, 0, row)?.unwrap_or_else(|| "(unknown)".to_string());
            let trips = i64_at(batch, 1, row)?.unwrap_or(0) as u64;
            out.push(ZoneCount { zone, trips });
        }
    }
    Ok(out)
}
