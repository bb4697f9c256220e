//! ## Zone Enricher
//!
//! Attaches human-readable zone and borough names to trip records by joining
//! the trip table against the zone lookup table twice: once through the
//! pickup location id, once through the drop-off location id. Both joins are
//! LEFT joins: a location id absent from the zone table yields nulls in the
//! four added columns, never a dropped row.
//!
//! The operation is idempotent: a table that already carries the zone
//! columns is returned unchanged, so callers holding a pre-enriched dataset
//! pay nothing. Before joining, the zone table's `location_id` uniqueness is
//! checked lazily; a duplicate would fan out trip rows, and is rejected as a
//! schema violation instead.

use datafusion::common::JoinType;
use datafusion::functions_aggregate::expr_fn::{count, count_distinct};
use datafusion::prelude::*;
use datafusion::scalar::ScalarValue;
use tracing::debug;

use crate::exceptions::{TripBoardError, TripBoardResult};

/// The four columns enrichment adds to the trip table.
pub const ENRICHED_COLUMNS: [&str; 4] = [
    "pickup_zone",
    "pickup_borough",
    "dropoff_zone",
    "dropoff_borough",
];

/// Returns true if `trips` already carries the pickup and drop-off zone
/// columns.
pub fn is_enriched(trips: &DataFrame) -> bool {
    let schema = trips.schema();
    schema.field_with_name(None, "pickup_zone").is_ok()
        && schema.field_with_name(None, "dropoff_zone").is_ok()
}

/// Left-joins zone and borough names onto the trip table.
///
/// Row count of the output equals the row count of the input: the zone
/// table's `location_id` is verified unique before the joins run.
pub async fn enrich(trips: DataFrame, zones: DataFrame) -> TripBoardResult<DataFrame> {
    if is_enriched(&trips) {
        debug!("trip table already enriched; returning unchanged");
        return Ok(trips);
    }

    for name in ["location_id", "zone_name", "borough_name"] {
        if zones.schema().field_with_name(None, name).is_err() {
            return Err(TripBoardError::MissingColumn(name.to_string()));
        }
    }
    verify_unique_location_ids(&zones).await?;

    let pickup_names = zones.clone().select(vec![
        col("location_id"),
        col("zone_name").alias("pickup_zone"),
        col("borough_name").alias("pickup_borough"),
    ])?;
    let dropoff_names = zones.select(vec![
        col("location_id"),
        col("zone_name").alias("dropoff_zone"),
        col("borough_name").alias("dropoff_borough"),
    ])?;

    let joined = trips
        .join(
            pickup_names,
            JoinType::Left,
            &["pickup_location_id"],
            &["location_id"],
            None,
        )?
        .drop_columns(&["location_id"])?
        .join(
            dropoff_names,
            JoinType::Left,
            &["dropoff_location_id"],
            &["location_id"],
            None,
        )?
        .drop_columns(&["location_id"])?;

    Ok(joined)
}

/// Fails with a schema violation when `location_id` repeats in the zone
/// table. Evaluated as a single aggregate over the lazy plan.
async fn verify_unique_location_ids(zones: &DataFrame) -> TripBoardResult<()> {
    let counts = zones.clone().aggregate(
        vec![],
        vec![
            count(col("location_id")).alias("total"),
            count_distinct(col("location_id")).alias("distinct"),
        ],
    )?;
    let batches = counts.collect().await?;
    let batch = batches.first().ok_or_else(|| {
        TripBoardError::Schema("zone uniqueness aggregate produced no output".into())
    })?;
    let total = int_scalar(ScalarValue::try_from_array(batch.column(0), 0)?)?;
    let distinct = int_scalar(ScalarValue::try_from_array(batch.column(1), 0)?)?;
    if total != distinct {
        return Err(TripBoardError::Schema(format!(
            "zone table location_id is not unique ({total} rows, {distinct} distinct ids)"
        )));
    }
    Ok(())
}

fn int_scalar(value: ScalarValue) -> TripBoardResult<i64> {
    match value {
        ScalarValue::Int64(Some(v)) => Ok(v),
        other => Err(TripBoardError::Schema(format!(
            "expected an Int64 count, found {other:?}"
        ))),
    }
}
