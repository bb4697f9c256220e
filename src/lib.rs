//! # Tripboard
//!
//! Tripboard is the data core of an interactive dashboard over a fixed,
//! published month of NYC yellow-taxi trips. It downloads two parquet files
//! (trip records and a zone lookup table), attaches readable zone and borough
//! names to the trips, applies the dashboard's three interactive filters
//! (date range, hour range, payment types) as a single lazy DataFusion plan,
//! and produces the five aggregate views plus the scalar summary that a
//! presentation layer renders.
//!
//! The crate owns no storage and has no write path: the remote files are
//! immutable for the lifetime of a session, which is what makes the
//! [`cache::SessionCache`] safe without eviction or locking beyond a mutex.
//!
//! ## Modules
//!
//! - [`fetch`]: HTTP retrieval with parquet magic-byte validation.
//! - [`loader`]: parquet decoding with true columnar projection, plus schema
//!   checks on the two source tables.
//! - [`enrich`]: the double left join attaching zone/borough names.
//! - [`cache`]: the session-scoped memo for fetched bytes and loaded tables.
//! - [`filter`]: the filter specification and lazy filter engine.
//! - [`views`]: the five aggregation views and the scalar summary.
//! - [`session`]: the orchestrating [`session::DashboardSession`] consumed by
//!   the presentation layer.
//! - [`config`]: dataset locations and tunables.
//! - [`exceptions`]: the [`exceptions::TripBoardError`] taxonomy.

pub mod cache;
pub mod config;
pub mod enrich;
pub mod exceptions;
pub mod fetch;
pub mod filter;
pub mod loader;
pub mod logging;
pub mod session;
pub mod views;

pub use cache::SessionCache;
pub use config::DashboardConfig;
pub use exceptions::{TripBoardError, TripBoardResult};
pub use filter::{FilterSpec, FilteredView};
pub use session::{DashboardSession, DashboardSnapshot};
