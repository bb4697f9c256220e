//! ## Filter Engine
//!
//! The filter specification is the immutable tuple behind the dashboard's
//! three controls: date range, hour-of-day range, and payment-type set. The
//! engine composes the three predicates into a single conjunction on the
//! *lazy* trip plan, so no row is materialized until the caller collects the
//! filtered view; peak memory is bounded by the filtered subset, not the
//! full dataset.
//!
//! A zero-row result is a normal state, reported as [`FilteredView::Empty`]
//! so downstream aggregation is skipped instead of producing NaN summaries.
//! An optional row cap truncates pathological filter combinations
//! deterministically: rows are ordered by `pickup_timestamp`, then
//! `pickup_location_id`, then `fare_amount` (all ascending) and the first N
//! kept. Trip timestamps have second resolution and tie often, so the
//! secondary keys are what make the kept set reproducible across runs.

use std::collections::BTreeSet;

use arrow::datatypes::DataType;
use chrono::NaiveDate;
use datafusion::prelude::*;
use datafusion::scalar::ScalarValue;
use datafusion_expr::cast;
use tracing::debug;

use crate::exceptions::{TripBoardError, TripBoardResult};

/// The immutable description of the dashboard's current filter controls.
///
/// Construction normalizes an inverted date range by swapping the endpoints
/// (a range picker mid-edit hands them over backwards); inverted hour ranges
/// and empty payment sets are rejected instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSpec {
    start_date: NaiveDate,
    end_date: NaiveDate,
    hour_min: u8,
    hour_max: u8,
    payment_types: BTreeSet<i64>,
}

impl FilterSpec {
    pub fn new(
        start_date: NaiveDate,
        end_date: NaiveDate,
        hour_min: u8,
        hour_max: u8,
        payment_types: impl IntoIterator<Item = i64>,
    ) -> TripBoardResult<Self> {
        let (start_date, end_date) = if start_date <= end_date {
            (start_date, end_date)
        } else {
            (end_date, start_date)
        };
        if hour_max > 23 {
            return Err(TripBoardError::InvalidParameter(format!(
                "hour_max must be at most 23, got {hour_max}"
            )));
        }
        if hour_min > hour_max {
            return Err(TripBoardError::InvalidParameter(format!(
                "hour_min {hour_min} exceeds hour_max {hour_max}"
            )));
        }
        let payment_types: BTreeSet<i64> = payment_types.into_iter().collect();
        if payment_types.is_empty() {
            return Err(TripBoardError::InvalidParameter(
                "payment-type set must not be empty".to_string(),
            ));
        }
        Ok(Self {
            start_date,
            end_date,
            hour_min,
            hour_max,
            payment_types,
        })
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    pub fn hour_range(&self) -> (u8, u8) {
        (self.hour_min, self.hour_max)
    }

    pub fn payment_types(&self) -> &BTreeSet<i64> {
        &self.payment_types
    }

    /// The conjunction of the three filter predicates as one lazy expression.
    pub fn predicate(&self) -> Expr {
        let date = cast(col("pickup_timestamp"), DataType::Date32)
            .between(date_literal(self.start_date), date_literal(self.end_date));
        let hour = col("pickup_hour").between(
            lit(self.hour_min as i32),
            lit(self.hour_max as i32),
        );
        let payment = col("payment_type").in_list(
            self.payment_types.iter().map(|c| lit(*c)).collect(),
            false,
        );
        date.and(hour).and(payment)
    }
}

fn date_literal(date: NaiveDate) -> Expr {
    // NaiveDate::default() is the Date32 epoch (1970-01-01).
    let days = date.signed_duration_since(NaiveDate::default()).num_days() as i32;
    lit(ScalarValue::Date32(Some(days)))
}

/// The outcome of applying a [`FilterSpec`] to the trip table.
pub enum FilteredView {
    /// No trip satisfied the filters. Aggregation must be skipped.
    Empty,
    /// At least one trip matched.
    Ready {
        /// The filtered lazy plan; not yet materialized.
        frame: DataFrame,
        /// Rows in `frame` (after truncation, when applied).
        rows: usize,
        /// True when the row cap cut the result short.
        truncated: bool,
    },
}

/// Applies the specification to the (lazy) trip plan.
///
/// The plan is counted once; a zero count short-circuits to
/// [`FilteredView::Empty`]. When `row_cap` is exceeded, the plan is ordered
/// by (`pickup_timestamp`, `pickup_location_id`, `fare_amount`) ascending
/// and limited to the first `row_cap` rows.
pub async fn apply(
    trips: DataFrame,
    spec: &FilterSpec,
    row_cap: Option<usize>,
) -> TripBoardResult<FilteredView> {
    let filtered = trips.filter(spec.predicate())?;
    let rows = filtered.clone().count().await?;
    debug!(rows, "filter pass complete");
    if rows == 0 {
        return Ok(FilteredView::Empty);
    }
    if let Some(cap) = row_cap {
        if rows > cap {
            debug!(cap, "filtered result exceeds row cap; truncating");
            let frame = filtered
                .sort(vec![
                    col("pickup_timestamp").sort(true, false),
                    col("pickup_location_id").sort(true, false),
                    col("fare_amount").sort(true, false),
                ])?
                .limit(0, Some(cap))?;
            return Ok(FilteredView::Ready {
                frame,
                rows: cap,
                truncated: true,
            });
        }
    }
    Ok(FilteredView::Ready {
        frame: filtered,
        rows,
        truncated: false,
    })
}
