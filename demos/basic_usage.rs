//! Fetches the published dataset, applies a morning-rush filter, and prints
//! the summary plus the top pickup zones.
//!
//! Run with: `cargo run --example basic_usage`

use std::sync::Arc;

use tripboard::views::payments::payment_option_label;
use tripboard::{DashboardConfig, DashboardSession, FilterSpec, SessionCache, TripBoardResult};

#[tokio::main]
async fn main() -> TripBoardResult<()> {
    let session = DashboardSession::new(DashboardConfig::default(), Arc::new(SessionCache::new()))?;

    let (min_date, max_date) = session.dataset_date_bounds().await?;
    let codes = session.payment_type_options().await?;
    println!("dataset covers {min_date} to {max_date}");
    for code in &codes {
        println!("payment option: {}", payment_option_label(*code));
    }

    // Weekday-morning-rush style filter: 6 AM to 10 AM, any payment type.
    let spec = FilterSpec::new(min_date, max_date, 6, 10, codes)?;

    match session.snapshot(&spec).await? {
        None => println!("no trips match the filters"),
        Some(snapshot) => {
            let s = &snapshot.summary;
            println!(
                "{} trips, avg fare ${:.2}, total revenue ${:.2}, avg {:.2} mi in {:.1} min",
                s.total_trips, s.avg_fare, s.total_revenue, s.avg_distance, s.avg_duration_minutes
            );
            if snapshot.truncated {
                println!("(result truncated at the configured row cap)");
            }
            for zone in &snapshot.top_pickup_zones {
                println!("{:>7} trips from {}", zone.trips, zone.zone);
            }
        }
    }
    Ok(())
}
