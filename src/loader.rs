//! ## Dataset Loader
//!
//! Turns the two fetched parquet payloads into typed in-memory tables. The
//! trip load is column-pruned: only the allow-listed columns are decoded,
//! using a parquet `ProjectionMask` so the unused columns never leave the
//! file's columnar layout. The zone load reads the full (small) reference
//! table and eagerly validates the referential-integrity assumption the
//! enricher depends on: `location_id` must be unique.
//!
//! Both loads are memoized in the [`SessionCache`] keyed by URL and column
//! set, so a repeated invocation within a session costs a map lookup.

use std::collections::HashSet;
use std::sync::Arc;

use arrow::array::{Array, Int32Array, Int64Array};
use arrow::datatypes::{DataType, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ProjectionMask;
use tracing::debug;

use crate::cache::{CacheKey, CachedTable, SessionCache};
use crate::config::{DashboardConfig, REQUIRED_ZONE_COLUMNS};
use crate::exceptions::{TripBoardError, TripBoardResult};
use crate::fetch::Fetcher;

/// Decodes a parquet payload into record batches, reading only `columns`
/// when given. Requested columns that do not exist in the file produce a
/// [`TripBoardError::MissingColumn`] before any decoding happens.
pub fn read_parquet_table(payload: Bytes, columns: Option<&[String]>) -> TripBoardResult<CachedTable> {
    let mut builder = ParquetRecordBatchReaderBuilder::try_new(payload)?;
    let file_schema: SchemaRef = builder.schema().clone();

    let projected_schema = match columns {
        Some(names) => {
            let mut indices = Vec::with_capacity(names.len());
            for name in names {
                let idx = file_schema
                    .index_of(name)
                    .map_err(|_| TripBoardError::MissingColumn(name.clone()))?;
                indices.push(idx);
            }
            let mask = ProjectionMask::roots(builder.parquet_schema(), indices.iter().copied());
            builder = builder.with_projection(mask);
            Arc::new(Schema::new(
                indices
                    .iter()
                    .map(|&i| file_schema.field(i).clone())
                    .collect::<Vec<_>>(),
            ))
        }
        None => file_schema,
    };

    let reader = builder.build()?;
    let batches = reader.collect::<Result<Vec<RecordBatch>, _>>()?;
    let schema = batches
        .first()
        .map(|b| b.schema())
        .unwrap_or(projected_schema);
    Ok(CachedTable::new(schema, batches))
}

/// Checks that every required column is present in `schema`.
fn validate_columns(schema: &Schema, required: &[&str]) -> TripBoardResult<()> {
    for name in required {
        if schema.index_of(name).is_err() {
            return Err(TripBoardError::MissingColumn((*name).to_string()));
        }
    }
    Ok(())
}

/// Enforces uniqueness of `location_id` across the zone table. A duplicate
/// id would silently fan out trip rows in the enricher's left joins, so it
/// is rejected here as a schema violation.
fn validate_zone_uniqueness(table: &CachedTable) -> TripBoardResult<()> {
    let idx = table
        .schema
        .index_of("location_id")
        .map_err(|_| TripBoardError::MissingColumn("location_id".to_string()))?;
    let mut seen: HashSet<i64> = HashSet::new();
    for batch in &table.batches {
        let column = batch.column(idx);
        let ids: Vec<i64> = match column.data_type() {
            DataType::Int64 => {
                let arr = column
                    .as_any()
                    .downcast_ref::<Int64Array>()
                    .ok_or_else(|| TripBoardError::Schema("location_id downcast failed".into()))?;
                (0..arr.len()).filter(|&i| !arr.is_null(i)).map(|i| arr.value(i)).collect()
            }
            DataType::Int32 => {
                let arr = column
                    .as_any()
                    .downcast_ref::<Int32Array>()
                    .ok_or_else(|| TripBoardError::Schema("location_id downcast failed".into()))?;
                (0..arr.len())
                    .filter(|&i| !arr.is_null(i))
                    .map(|i| arr.value(i) as i64)
                    .collect()
            }
            dt => {
                return Err(TripBoardError::Schema(format!(
                    "location_id must be an integer column, found {dt:?}"
                )))
            }
        };
        for id in ids {
            if !seen.insert(id) {
                return Err(TripBoardError::Schema(format!(
                    "location_id {id} appears more than once in the zone table"
                )));
            }
        }
    }
    Ok(())
}

/// Fetches and decodes the two source tables, memoizing through the session
/// cache.
pub struct Loader {
    fetcher: Fetcher,
    cache: Arc<SessionCache>,
    config: DashboardConfig,
}

impl Loader {
    pub fn new(config: DashboardConfig, cache: Arc<SessionCache>) -> TripBoardResult<Self> {
        let fetcher = Fetcher::from_config(&config)?;
        Ok(Self {
            fetcher,
            cache,
            config,
        })
    }

    /// Loads the trip table, decoding only the configured column allow-list.
    pub async fn load_trips(&self) -> TripBoardResult<Arc<CachedTable>> {
        let key = CacheKey::new("load_trips", &self.config.trips_url, &self.config.trip_columns);
        if let Some(table) = self.cache.table(&key) {
            return Ok(table);
        }
        let payload = self.fetch_cached(&self.config.trips_url).await?;
        let table = read_parquet_table(payload, Some(&self.config.trip_columns))?;
        debug!(rows = table.row_count(), "loaded trip table");
        Ok(self.cache.store_table(key, Arc::new(table)))
    }

    /// Loads the full zone lookup table and validates its schema.
    pub async fn load_zones(&self) -> TripBoardResult<Arc<CachedTable>> {
        let key = CacheKey::new("load_zones", &self.config.zones_url, &[]);
        if let Some(table) = self.cache.table(&key) {
            return Ok(table);
        }
        let payload = self.fetch_cached(&self.config.zones_url).await?;
        let table = read_parquet_table(payload, None)?;
        validate_columns(&table.schema, &REQUIRED_ZONE_COLUMNS)?;
        validate_zone_uniqueness(&table)?;
        debug!(rows = table.row_count(), "loaded zone table");
        Ok(self.cache.store_table(key, Arc::new(table)))
    }

    async fn fetch_cached(&self, url: &str) -> TripBoardResult<Bytes> {
        if let Some(payload) = self.cache.bytes(url) {
            return Ok(payload);
        }
        let payload = self.fetcher.fetch(url).await?;
        Ok(self.cache.store_bytes(url, payload))
    }
}
