use std::sync::Arc;

use arrow::array::{
    ArrayRef, Float64Array, Int32Array, Int64Array, StringArray, TimestampNanosecondArray,
};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit as ArrowTimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use parquet::arrow::ArrowWriter;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tripboard::{DashboardConfig, DashboardSession, FilterSpec, SessionCache};

fn ts(day: u32, hour: u32) -> i64 {
    NaiveDate::from_ymd_opt(2024, 1, day)
        .unwrap()
        .and_hms_opt(hour, 30, 0)
        .unwrap()
        .and_utc()
        .timestamp_nanos_opt()
        .unwrap()
}

fn trips_parquet() -> Vec<u8> {
    let schema = Arc::new(Schema::new(vec![
        Field::new(
            "pickup_timestamp",
            DataType::Timestamp(ArrowTimeUnit::Nanosecond, None),
            false,
        ),
        Field::new("pickup_hour", DataType::Int32, false),
        Field::new("pickup_day_of_week", DataType::Utf8, false),
        Field::new("trip_duration_minutes", DataType::Float64, false),
        Field::new("payment_type", DataType::Int64, false),
        Field::new("fare_amount", DataType::Float64, false),
        Field::new("total_amount", DataType::Float64, false),
        Field::new("trip_distance", DataType::Float64, false),
        Field::new("pickup_location_id", DataType::Int64, false),
        Field::new("dropoff_location_id", DataType::Int64, false),
        // An extra column the loader must prune away.
        Field::new("store_and_fwd_flag", DataType::Utf8, false),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(TimestampNanosecondArray::from(vec![
                ts(1, 8),
                ts(2, 8),
                ts(2, 19),
                ts(5, 23),
            ])) as ArrayRef,
            Arc::new(Int32Array::from(vec![8, 8, 19, 23])) as ArrayRef,
            Arc::new(StringArray::from(vec![
                "Monday", "Tuesday", "Tuesday", "Friday",
            ])) as ArrayRef,
            Arc::new(Float64Array::from(vec![10.0, 12.0, 25.0, 8.0])) as ArrayRef,
            Arc::new(Int64Array::from(vec![1, 1, 2, 1])) as ArrayRef,
            Arc::new(Float64Array::from(vec![12.0, 14.0, 30.0, 9.0])) as ArrayRef,
            Arc::new(Float64Array::from(vec![15.0, 17.0, 36.0, 11.0])) as ArrayRef,
            Arc::new(Float64Array::from(vec![1.2, 1.8, 7.5, 0.9])) as ArrayRef,
            Arc::new(Int64Array::from(vec![1, 1, 2, 7])) as ArrayRef,
            Arc::new(Int64Array::from(vec![2, 3, 1, 1])) as ArrayRef,
            Arc::new(StringArray::from(vec!["N", "N", "Y", "N"])) as ArrayRef,
        ],
    )
    .unwrap();
    write_parquet(&batch)
}

fn zones_parquet() -> Vec<u8> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("location_id", DataType::Int64, false),
        Field::new("zone_name", DataType::Utf8, false),
        Field::new("borough_name", DataType::Utf8, false),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from(vec![1, 2, 3])) as ArrayRef,
            Arc::new(StringArray::from(vec!["Midtown", "JFK Airport", "Astoria"])) as ArrayRef,
            Arc::new(StringArray::from(vec!["Manhattan", "Queens", "Queens"])) as ArrayRef,
        ],
    )
    .unwrap();
    write_parquet(&batch)
}

fn write_parquet(batch: &RecordBatch) -> Vec<u8> {
    let mut buffer = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), None).unwrap();
    writer.write(batch).unwrap();
    writer.close().unwrap();
    buffer
}

/// Serves `body` for exactly one request. The session caches fetched bytes,
/// so a second fetch of the same URL would hang — which makes any cache
/// regression show up as a test timeout rather than passing silently.
async fn serve_once(body: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        if let Ok((mut sock, _)) = listener.accept().await {
            let mut buf = [0u8; 2048];
            let _ = sock.read(&mut buf).await;
            let header = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            let _ = sock.write_all(header.as_bytes()).await;
            let _ = sock.write_all(&body).await;
            let _ = sock.shutdown().await;
        }
    });
    format!("http://{addr}/data.parquet")
}

async fn session() -> DashboardSession {
    let trips_url = serve_once(trips_parquet()).await;
    let zones_url = serve_once(zones_parquet()).await;
    let config = DashboardConfig::default().with_urls(trips_url, zones_url);
    DashboardSession::new(config, Arc::new(SessionCache::new())).unwrap()
}

fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
}

#[tokio::test]
async fn test_snapshot_end_to_end() {
    let session = session().await;
    let spec = FilterSpec::new(date(1), date(31), 0, 23, [1, 2, 3, 4, 5]).unwrap();

    let snapshot = session.snapshot(&spec).await.unwrap().expect("non-empty");
    assert_eq!(snapshot.summary.total_trips, 4);
    assert!(!snapshot.truncated);

    // Enrichment happened: zones are named, and the unknown pickup id 7
    // grouped as a null zone rather than dropping the trip.
    assert!(snapshot
        .top_pickup_zones
        .iter()
        .any(|z| z.zone == "Midtown" && z.trips == 2));
    assert!(snapshot.payment_breakdown[0].label.starts_with("1 -"));
    assert_eq!(snapshot.heatmap.total(), 4);
    assert_eq!(snapshot.heatmap.counts[1][8], 1); // Tuesday 08:00
}

#[tokio::test]
async fn test_snapshot_empty_filters_return_none() {
    let session = session().await;
    // Payment code 4 never occurs.
    let spec = FilterSpec::new(date(1), date(31), 0, 23, [4]).unwrap();
    assert!(session.snapshot(&spec).await.unwrap().is_none());
}

#[tokio::test]
async fn test_repeated_snapshots_hit_the_cache() {
    // Each stub URL serves exactly one request; the second snapshot can only
    // succeed from the cache.
    let session = session().await;
    let spec = FilterSpec::new(date(1), date(31), 0, 23, [1, 2]).unwrap();

    let first = session.snapshot(&spec).await.unwrap().expect("non-empty");
    let second = session.snapshot(&spec).await.unwrap().expect("non-empty");
    assert_eq!(first, second);

    let narrower = FilterSpec::new(date(2), date(2), 0, 23, [1, 2]).unwrap();
    let third = session.snapshot(&narrower).await.unwrap().expect("non-empty");
    assert_eq!(third.summary.total_trips, 2);
}

#[tokio::test]
async fn test_dataset_date_bounds() {
    let session = session().await;
    let (lo, hi) = session.dataset_date_bounds().await.unwrap();
    assert_eq!(lo, date(1));
    assert_eq!(hi, date(5));
}

#[tokio::test]
async fn test_payment_type_options_are_sorted_distinct() {
    let session = session().await;
    assert_eq!(session.payment_type_options().await.unwrap(), vec![1, 2]);
}

#[tokio::test]
async fn test_column_pruning_drops_unrequested_columns() {
    let session = session().await;
    let trips = session.trips().await.unwrap();
    assert!(trips
        .schema()
        .field_with_name(None, "store_and_fwd_flag")
        .is_err());
    assert!(trips.schema().field_with_name(None, "fare_amount").is_ok());
}

#[tokio::test]
async fn test_shared_cache_keeps_per_column_set_enrichments_apart() {
    // Two sessions share one cache and one pair of URLs but request
    // different trip projections; neither may observe the other's enriched
    // table.
    let trips_url = serve_once(trips_parquet()).await;
    let zones_url = serve_once(zones_parquet()).await;
    let cache = Arc::new(SessionCache::new());

    let wide_config = DashboardConfig::default().with_urls(trips_url.clone(), zones_url.clone());
    let mut narrow_config = DashboardConfig::default().with_urls(trips_url, zones_url);
    narrow_config.trip_columns.retain(|c| c != "total_amount");

    let wide = DashboardSession::new(wide_config, cache.clone()).unwrap();
    let narrow = DashboardSession::new(narrow_config, cache).unwrap();

    let wide_enriched = wide.enriched().await.unwrap();
    assert!(wide_enriched
        .schema()
        .field_with_name(None, "total_amount")
        .is_ok());

    let narrow_enriched = narrow.enriched().await.unwrap();
    assert!(narrow_enriched
        .schema()
        .field_with_name(None, "total_amount")
        .is_err());
    assert!(narrow_enriched
        .schema()
        .field_with_name(None, "pickup_zone")
        .is_ok());
}

#[tokio::test]
async fn test_row_cap_is_reported_in_snapshot() {
    let trips_url = serve_once(trips_parquet()).await;
    let zones_url = serve_once(zones_parquet()).await;
    let config = DashboardConfig::default()
        .with_urls(trips_url, zones_url)
        .with_row_cap(Some(2));
    let session = DashboardSession::new(config, Arc::new(SessionCache::new())).unwrap();

    let spec = FilterSpec::new(date(1), date(31), 0, 23, [1, 2]).unwrap();
    let snapshot = session.snapshot(&spec).await.unwrap().expect("non-empty");
    assert!(snapshot.truncated);
    assert_eq!(snapshot.summary.total_trips, 2);
}
