//! ## Dashboard Configuration
//!
//! Dataset locations and tunables for a dashboard session. The defaults point
//! at the published January-2024 yellow-taxi dataset the dashboard was built
//! around; everything is overridable for tests (which point the URLs at local
//! stub servers) and for alternative hosts of the same two files.

use std::time::Duration;

/// Default location of the cleaned trip records parquet file.
pub const DEFAULT_TRIPS_URL: &str =
    "https://huggingface.co/datasets/Denelle/streamlit-data/resolve/main/cleaned_taxi.parquet?download=true";

/// Default location of the zone lookup parquet file.
pub const DEFAULT_ZONES_URL: &str =
    "https://huggingface.co/datasets/Denelle/streamlit-data/resolve/main/zones.parquet?download=true";

/// The minimum trip-table schema the loader requests from the parquet reader.
/// Only these columns are decoded; the file's remaining columns never leave
/// the columnar format.
pub const REQUIRED_TRIP_COLUMNS: [&str; 10] = [
    "pickup_timestamp",
    "pickup_hour",
    "pickup_day_of_week",
    "trip_duration_minutes",
    "payment_type",
    "fare_amount",
    "total_amount",
    "trip_distance",
    "pickup_location_id",
    "dropoff_location_id",
];

/// Columns the zone lookup table must carry.
pub const REQUIRED_ZONE_COLUMNS: [&str; 3] = ["location_id", "zone_name", "borough_name"];

/// Default ceiling on the number of filtered rows handed to the views.
pub const DEFAULT_ROW_CAP: usize = 300_000;

/// Configuration for a [`crate::session::DashboardSession`].
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// URL of the trip records parquet file.
    pub trips_url: String,
    /// URL of the zone lookup parquet file.
    pub zones_url: String,
    /// Columns requested from the trip file. Defaults to
    /// [`REQUIRED_TRIP_COLUMNS`].
    pub trip_columns: Vec<String>,
    /// HTTP timeout for a single fetch. Generous, because the trip file is
    /// tens of megabytes on a shared host.
    pub timeout: Duration,
    /// User-agent sent with every request; some content hosts reject
    /// anonymous clients.
    pub user_agent: String,
    /// Optional ceiling on the filtered row count; `None` disables
    /// truncation.
    pub row_cap: Option<usize>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            trips_url: DEFAULT_TRIPS_URL.to_string(),
            zones_url: DEFAULT_ZONES_URL.to_string(),
            trip_columns: REQUIRED_TRIP_COLUMNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            timeout: Duration::from_secs(180),
            user_agent: "Mozilla/5.0 (compatible; tripboard/0.1)".to_string(),
            row_cap: Some(DEFAULT_ROW_CAP),
        }
    }
}

impl DashboardConfig {
    /// Override both dataset URLs.
    pub fn with_urls(mut self, trips_url: impl Into<String>, zones_url: impl Into<String>) -> Self {
        self.trips_url = trips_url.into();
        self.zones_url = zones_url.into();
        self
    }

    /// Override the fetch timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override or disable the filtered-row ceiling.
    pub fn with_row_cap(mut self, row_cap: Option<usize>) -> Self {
        self.row_cap = row_cap;
        self
    }
}
