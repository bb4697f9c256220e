//! ## Dashboard Session
//!
//! The orchestrating object the presentation layer talks to. A session owns
//! one DataFusion context, the injected [`SessionCache`], and the loader;
//! every interaction (a filter change) is one synchronous pass:
//! cached load → cached enrichment → lazy filter → views.
//!
//! Enrichment is the one degradable step: if the zone table cannot be
//! fetched or joined, the session logs a warning and continues with the
//! unenriched trips, so the dashboard falls back to raw location ids instead
//! of going dark. Fetch, load, and schema errors remain fatal to the pass.

use std::sync::Arc;
use std::time::Instant;

use arrow::datatypes::{DataType, Schema};
use chrono::NaiveDate;
use datafusion::functions_aggregate::expr_fn::{max, min};
use datafusion::prelude::*;
use datafusion::scalar::ScalarValue;
use tracing::{debug, warn};

use crate::cache::{CacheKey, CachedTable, SessionCache};
use crate::config::DashboardConfig;
use crate::enrich::enrich;
use crate::exceptions::{TripBoardError, TripBoardResult};
use crate::filter::{self, FilterSpec, FilteredView};
use crate::loader::Loader;
use crate::views::distances::HistogramBin;
use crate::views::fares::HourlyFare;
use crate::views::heatmap::HeatmapMatrix;
use crate::views::payments::PaymentCount;
use crate::views::summary::TripSummary;
use crate::views::zones::{ZoneCount, TOP_ZONES};
use crate::views::{distances, fares, heatmap, i64_at, payments, summary, zones};

/// Everything one render pass needs: the scalar metrics and the five chart
/// results, all plain data decoupled from any chart library.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSnapshot {
    pub summary: TripSummary,
    pub top_pickup_zones: Vec<ZoneCount>,
    pub fare_by_hour: Vec<HourlyFare>,
    pub distance_histogram: Vec<HistogramBin>,
    pub payment_breakdown: Vec<PaymentCount>,
    pub heatmap: HeatmapMatrix,
    /// True when the filtered view was cut at the configured row cap.
    pub truncated: bool,
}

/// One analyst's session over the fixed dataset.
pub struct DashboardSession {
    ctx: SessionContext,
    cache: Arc<SessionCache>,
    loader: Loader,
    config: DashboardConfig,
}

impl DashboardSession {
    pub fn new(config: DashboardConfig, cache: Arc<SessionCache>) -> TripBoardResult<Self> {
        let loader = Loader::new(config.clone(), cache.clone())?;
        Ok(Self {
            ctx: SessionContext::new(),
            cache,
            loader,
            config,
        })
    }

    /// The session's DataFusion context, for callers composing their own
    /// plans on top of the loaded tables.
    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    /// The (column-pruned) trip table as a lazy plan.
    pub async fn trips(&self) -> TripBoardResult<DataFrame> {
        self.loader.load_trips().await?.to_frame(&self.ctx)
    }

    /// The zone lookup table as a lazy plan.
    pub async fn zones(&self) -> TripBoardResult<DataFrame> {
        self.loader.load_zones().await?.to_frame(&self.ctx)
    }

    /// The trip table with zone and borough names attached.
    ///
    /// Degrades gracefully: when the zone load or the join fails, the
    /// unenriched trips are returned and a warning is logged. The enriched
    /// table is cached for the session, so the joins run once.
    pub async fn enriched(&self) -> TripBoardResult<DataFrame> {
        // Keyed by the column set too: sessions sharing one cache may load
        // different projections of the same URL.
        let key = CacheKey::new("enrich", &self.config.trips_url, &self.config.trip_columns);
        if let Some(table) = self.cache.table(&key) {
            return table.to_frame(&self.ctx);
        }
        let trips = self.trips().await?;
        match self.enrich_trips(trips.clone()).await {
            Ok(table) => self.cache.store_table(key, Arc::new(table)).to_frame(&self.ctx),
            Err(e) => {
                warn!(error = %e, "zone enrichment failed; continuing with location ids");
                Ok(trips)
            }
        }
    }

    async fn enrich_trips(&self, trips: DataFrame) -> TripBoardResult<CachedTable> {
        let zones = self.zones().await?;
        let enriched = enrich(trips, zones).await?;
        let schema = Arc::new(Schema::from(enriched.schema()));
        let batches = enriched.collect().await?;
        Ok(CachedTable::new(
            batches.first().map(|b| b.schema()).unwrap_or(schema),
            batches,
        ))
    }

    /// Applies the filter specification to the enriched trip table.
    pub async fn filtered(&self, spec: &FilterSpec) -> TripBoardResult<FilteredView> {
        let frame = self.enriched().await?;
        filter::apply(frame, spec, self.config.row_cap).await
    }

    /// Runs the whole render pass: filter, then the summary and all five
    /// views. Returns `None` when the filters matched no trips, the signal
    /// for the presentation layer's empty-result state.
    pub async fn snapshot(&self, spec: &FilterSpec) -> TripBoardResult<Option<DashboardSnapshot>> {
        let start = Instant::now();
        let FilteredView::Ready {
            frame,
            rows,
            truncated,
        } = self.filtered(spec).await?
        else {
            debug!("filters matched no trips; skipping aggregation");
            return Ok(None);
        };
        debug!(rows, truncated, "computing views over filtered trips");

        let snapshot = DashboardSnapshot {
            summary: summary::compute(frame.clone()).await?,
            top_pickup_zones: zones::compute(frame.clone(), TOP_ZONES).await?,
            fare_by_hour: fares::compute(frame.clone()).await?,
            distance_histogram: distances::compute(frame.clone()).await?,
            payment_breakdown: payments::compute(frame.clone()).await?,
            heatmap: heatmap::compute(frame).await?,
            truncated,
        };
        debug!(elapsed = ?start.elapsed(), "render pass complete");
        Ok(Some(snapshot))
    }

    /// Min and max pickup dates in the dataset, for bounding the date-range
    /// control.
    pub async fn dataset_date_bounds(&self) -> TripBoardResult<(NaiveDate, NaiveDate)> {
        let trips = self.trips().await?;
        let aggregated = trips.aggregate(
            vec![],
            vec![
                min(col("pickup_timestamp")).alias("min_pickup"),
                max(col("pickup_timestamp")).alias("max_pickup"),
            ],
        )?;
        let batches = aggregated.collect().await?;
        let batch = batches
            .first()
            .ok_or_else(|| TripBoardError::Schema("date bounds aggregate produced no output".into()))?;
        let lo = timestamp_date(ScalarValue::try_from_array(batch.column(0), 0)?)?;
        let hi = timestamp_date(ScalarValue::try_from_array(batch.column(1), 0)?)?;
        Ok((lo, hi))
    }

    /// Sorted distinct payment codes observed in the dataset, for populating
    /// the payment-type control (labels via
    /// [`crate::views::payments::payment_option_label`]).
    pub async fn payment_type_options(&self) -> TripBoardResult<Vec<i64>> {
        let trips = self.trips().await?;
        let options = trips
            .select(vec![
                cast(col("payment_type"), DataType::Int64).alias("payment_type")
            ])?
            .distinct()?
            .sort(vec![col("payment_type").sort(true, false)])?;
        let batches = options.collect().await?;
        let mut codes = Vec::new();
        for batch in &batches {
            for row in 0..batch.num_rows() {
                if let Some(code) = i64_at(batch, 0, row)? {
                    codes.push(code);
                }
            }
        }
        Ok(codes)
    }
}

fn timestamp_date(value: ScalarValue) -> TripBoardResult<NaiveDate> {
    let (secs, nanos) = match value {
        ScalarValue::TimestampNanosecond(Some(ns), _) => (
            ns.div_euclid(1_000_000_000),
            ns.rem_euclid(1_000_000_000) as u32,
        ),
        ScalarValue::TimestampMicrosecond(Some(us), _) => (
            us.div_euclid(1_000_000),
            (us.rem_euclid(1_000_000) * 1_000) as u32,
        ),
        ScalarValue::TimestampMillisecond(Some(ms), _) => (
            ms.div_euclid(1_000),
            (ms.rem_euclid(1_000) * 1_000_000) as u32,
        ),
        ScalarValue::TimestampSecond(Some(s), _) => (s, 0),
        other => {
            return Err(TripBoardError::Schema(format!(
                "pickup_timestamp bound is not a timestamp, found {other:?}"
            )))
        }
    };
    chrono::DateTime::from_timestamp(secs, nanos)
        .map(|dt| dt.date_naive())
        .ok_or_else(|| TripBoardError::Schema("pickup_timestamp bound out of range".into()))
}
