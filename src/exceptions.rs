//! ## Custom Errors for Tripboard
//!
//! This module defines the error types used throughout the crate, derived
//! with the `thiserror` crate. The `TripBoardError` enum covers both the
//! wrapped errors of the underlying engines (I/O, DataFusion, Arrow, Parquet)
//! and the domain failures of the data pipeline: network fetches, payloads
//! that are not parquet, and schema violations in the source tables.
//!
//! A zero-row filter result is deliberately *not* an error; it is a normal
//! terminal state modeled by [`crate::filter::FilteredView::Empty`].
//!
//! The `TripBoardResult` type alias simplifies error handling by providing a
//! convenient alias for results returned by the library.

use thiserror::Error;

/// Errors specific to the Tripboard library.
#[derive(Debug, Error)]
pub enum TripBoardError {
    /// Wraps underlying I/O errors.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Wraps errors from DataFusion.
    #[error("DataFusion error: {0}")]
    DataFusionError(#[from] datafusion::error::DataFusionError),

    /// Wraps errors from Arrow.
    #[error("Arrow error: {0}")]
    ArrowError(#[from] arrow::error::ArrowError),

    /// Wraps errors from Parquet.
    #[error("Parquet error: {0}")]
    ParquetError(#[from] parquet::errors::ParquetError),

    /// Non-2xx HTTP response or transport failure while fetching a resource.
    /// `status` is `None` when the transport failed before any response.
    #[error("network error fetching '{url}' (status {status:?}): {detail}")]
    Network {
        url: String,
        status: Option<u16>,
        detail: String,
    },

    /// The fetched payload does not begin with the parquet magic bytes,
    /// typically because the host returned an HTML error or redirect page.
    /// Carries a short excerpt of the payload for diagnosis.
    #[error("'{url}' is not a parquet payload; begins with: {excerpt:?}")]
    Format { url: String, excerpt: String },

    /// A referential-integrity or structural assumption about the source
    /// tables was violated (e.g., duplicate zone location ids).
    #[error("schema violation: {0}")]
    Schema(String),

    /// Indicates that the specified column does not exist in the table.
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// Indicates that an invalid parameter was provided (e.g., an empty
    /// payment-type set or an inverted hour range).
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// A convenient result type for Tripboard operations.
pub type TripBoardResult<T> = std::result::Result<T, TripBoardError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_io_error() {
        let io_err = io::Error::new(io::ErrorKind::Other, "test io error");
        let err: TripBoardError = io_err.into();
        let err_msg = format!("{}", err);
        assert!(err_msg.contains("I/O error:"));
        assert!(err_msg.contains("test io error"));
    }

    #[test]
    fn test_datafusion_error() {
        let df_err = datafusion::error::DataFusionError::Plan("test plan error".into());
        let err: TripBoardError = df_err.into();
        let err_msg = format!("{}", err);
        assert!(err_msg.contains("DataFusion error:"));
        assert!(err_msg.contains("test plan error"));
    }

    #[test]
    fn test_network_error_carries_status() {
        let err = TripBoardError::Network {
            url: "http://example.com/trips.parquet".into(),
            status: Some(404),
            detail: "Not Found".into(),
        };
        let err_msg = format!("{}", err);
        assert!(err_msg.contains("404"));
        assert!(err_msg.contains("trips.parquet"));
    }

    #[test]
    fn test_format_error_carries_excerpt() {
        let err = TripBoardError::Format {
            url: "http://example.com/zones.parquet".into(),
            excerpt: "<html><body>Moved".into(),
        };
        let err_msg = format!("{}", err);
        assert!(err_msg.contains("not a parquet payload"));
        assert!(err_msg.contains("<html>"));
    }

    #[test]
    fn test_schema_error() {
        let err = TripBoardError::Schema("location_id is not unique".into());
        let err_msg = format!("{}", err);
        assert!(err_msg.contains("schema violation:"));
        assert!(err_msg.contains("location_id"));
    }

    #[test]
    fn test_missing_column_error() {
        let err = TripBoardError::MissingColumn("fare_amount".into());
        let err_msg = format!("{}", err);
        assert!(err_msg.contains("Missing column:"));
        assert!(err_msg.contains("fare_amount"));
    }

    #[test]
    fn test_invalid_parameter_error() {
        let err = TripBoardError::InvalidParameter("empty payment-type set".into());
        let err_msg = format!("{}", err);
        assert!(err_msg.contains("Invalid parameter:"));
        assert!(err_msg.contains("empty payment-type set"));
    }
}
