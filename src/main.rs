use serde::Serialize;
use tracing::{error, info};

use listings_processor::{
    GroupKey,
    config::DashboardConfig,
    processor::{
        ProcessorError,
        aggregate::{distinct_values, group_mean},
        correlate::{CorrelationEntry, correlate_with},
        filter::{ListingFilter, filter},
        rank::top,
        report::{DistrictReport, MapPoint, map_center, map_points},
        schema::{DISTRICT, PRICE},
        table_cache::TableCache,
    },
};
use jemallocator::Jemalloc;

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[derive(Serialize)]
struct DashboardOutput {
    districts: Vec<GroupKey>,
    report: DistrictReport,
    top_districts: Vec<(GroupKey, f64)>,
    correlations: Vec<CorrelationEntry>,
    map_center: (f64, f64),
    map_points: Vec<MapPoint>,
}

fn main() {
    let config = match DashboardConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(config.log_filter.as_str())
        .try_init();

    if let Err(e) = run(&config) {
        error!(%e, "dashboard failed");
        std::process::exit(1);
    }
}

fn run(config: &DashboardConfig) -> Result<(), ProcessorError> {
    let cache = TableCache::new();
    let table = cache.get_or_load(&config.csv_path)?;

    let districts = distinct_values(&table, DISTRICT)?;
    let district = match (&config.district, districts.first()) {
        (Some(d), _) => d.clone(),
        (None, Some(first)) => first.to_string(),
        (None, None) => {
            info!("no listings loaded");
            return Ok(());
        }
    };

    let report = DistrictReport::build(
        &table,
        config.negotiation_type,
        &district,
        &ListingFilter::new(),
    )?;

    let by_negotiation = filter(
        &table,
        &ListingFilter::new().negotiation_type(config.negotiation_type),
    )?;
    let top_districts = top(
        &group_mean(by_negotiation.table(), DISTRICT, PRICE)?,
        config.top_n,
    );
    let correlations = correlate_with(by_negotiation.table(), PRICE)?;

    let district_view = filter(
        &table,
        &ListingFilter::new()
            .district(&district)
            .negotiation_type(config.negotiation_type),
    )?;

    let output = DashboardOutput {
        districts,
        report,
        top_districts,
        correlations,
        map_center: map_center(district_view.table()),
        map_points: map_points(district_view.table())?,
    };

    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| ProcessorError::Parse(e.to_string()))?;
    println!("{json}");

    info!(district = %district, negotiation = %config.negotiation_type, "dashboard rendered");
    Ok(())
}
