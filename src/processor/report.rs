//! District-level analysis composed from the filter, derive and aggregation steps,
//! plus per-listing map markers.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::processor::{
    NegotiationType, ProcessorError,
    aggregate::{ColumnSummary, GroupedSeries, column_mean, group_mean, summary},
    column::Column,
    derive::with_cost_per_area,
    filter::{ListingFilter, filter},
    listings_table::ListingsTable,
    schema::{
        BATHROOMS, CONDO_FEE, DEFAULT_LATITUDE, DEFAULT_LONGITUDE, LATITUDE, LONGITUDE,
        PARKING_SPACES, POOL, PRICE, ROOMS, SUITES,
    },
};

/// Columns the report breaks the mean price down by, when present
const BREAKDOWN_COLUMNS: [&str; 4] = [ROOMS, BATHROOMS, SUITES, PARKING_SPACES];

/// Cost-per-area table, or the reason it could not be derived
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "value")]
pub enum CostPerArea {
    Computed(ListingsTable),
    Invalid(String),
}

impl CostPerArea {
    pub fn table(&self) -> Option<&ListingsTable> {
        match self {
            CostPerArea::Computed(t) => Some(t),
            CostPerArea::Invalid(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistrictReport {
    pub district: String,
    pub negotiation_type: NegotiationType,
    pub listing_count: usize,
    /// Non-null prices of the district view, in row order
    pub prices: Vec<f64>,
    /// Mean price keyed by breakdown column name
    pub mean_price_by: BTreeMap<String, GroupedSeries>,
    /// Derived on the district view, then narrowed by the extra filters
    pub cost_per_area: CostPerArea,
    /// Mean price by pool presence, after the extra filters
    pub mean_price_by_pool: Option<GroupedSeries>,
    pub mean_condo_fee: Option<f64>,
    /// Descriptive statistics of every numeric column of the district view
    pub describe: BTreeMap<String, ColumnSummary>,
}

impl DistrictReport {
    /// Builds the report for one district and negotiation type.
    ///
    /// `extra` narrows the cost-per-area table and the pool breakdown; its district
    /// and negotiation fields are ignored. A district with no listings gives an
    /// empty report, not an error.
    ///
    /// # Errors
    /// [`ProcessorError::MissingColumn`] when the district, negotiation or price
    /// column (or a column named by an active extra filter) is absent.
    pub fn build(
        table: &ListingsTable,
        negotiation_type: NegotiationType,
        district: &str,
        extra: &ListingFilter,
    ) -> Result<Self, ProcessorError> {
        let base = ListingFilter::new()
            .district(district)
            .negotiation_type(negotiation_type);
        let view = filter(table, &base)?.into_table();

        let prices: Vec<f64> = view.get_col(PRICE)?.iter_f64().flatten().collect();

        let mut mean_price_by = BTreeMap::new();
        for column in BREAKDOWN_COLUMNS {
            if view.has_column(column) {
                mean_price_by.insert(column.to_string(), group_mean(&view, column, PRICE)?);
            }
        }

        let amenities = extra.amenities_only();
        let cost_per_area = match with_cost_per_area(&view) {
            Ok(derived) => CostPerArea::Computed(filter(&derived, &amenities)?.into_table()),
            Err(err) => {
                warn!(district, %negotiation_type, %err, "cost per area unavailable");
                CostPerArea::Invalid(err.to_string())
            }
        };

        let narrowed = filter(&view, &amenities)?;
        let mean_price_by_pool = if narrowed.table().has_column(POOL) {
            Some(group_mean(narrowed.table(), POOL, PRICE)?)
        } else {
            None
        };

        let mean_condo_fee = if view.has_column(CONDO_FEE) {
            column_mean(&view, CONDO_FEE)?
        } else {
            None
        };

        let mut describe = BTreeMap::new();
        for (name, _) in view.iter_columns().filter(|(_, c)| c.is_numeric()) {
            if let Some(stats) = summary(&view, name)? {
                describe.insert(name.to_string(), stats);
            }
        }

        debug!(
            district,
            %negotiation_type,
            listings = view.row_count(),
            "district report built"
        );

        Ok(DistrictReport {
            district: district.to_string(),
            negotiation_type,
            listing_count: view.row_count(),
            prices,
            mean_price_by,
            cost_per_area,
            mean_price_by_pool,
            mean_condo_fee,
            describe,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.listing_count == 0
    }
}

/// Marker category shown for a listing, first match wins:
/// pool, more than one parking space, at least one suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerKind {
    Pool,
    Parking,
    Suite,
    Default,
}

impl MarkerKind {
    pub fn classify(has_pool: bool, parking_spaces: Option<i64>, suites: Option<i64>) -> Self {
        if has_pool {
            MarkerKind::Pool
        } else if parking_spaces.is_some_and(|p| p > 1) {
            MarkerKind::Parking
        } else if suites.is_some_and(|s| s > 0) {
            MarkerKind::Suite
        } else {
            MarkerKind::Default
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub price: Option<f64>,
    pub rooms: Option<i64>,
    pub suites: Option<i64>,
    pub parking_spaces: Option<i64>,
    pub has_pool: bool,
    pub marker: MarkerKind,
}

/// One point per row. Missing coordinates fall back to the São Paulo centroid.
pub fn map_points(table: &ListingsTable) -> Result<Vec<MapPoint>, ProcessorError> {
    let price = table.get_col(PRICE)?;
    let optional = |name: &str| table.get_col(name).ok();
    let (lat, lon) = (optional(LATITUDE), optional(LONGITUDE));
    let (rooms, suites, parking, pool) = (
        optional(ROOMS),
        optional(SUITES),
        optional(PARKING_SPACES),
        optional(POOL),
    );

    // flags and counts may be loaded as floats
    let int_at = |col: Option<&Column>, i: usize| col.and_then(|c| c.get_f64(i)).map(|v| v as i64);

    let points = (0..table.row_count())
        .map(|i| {
            let has_pool = int_at(pool, i) == Some(1);
            let parking_spaces = int_at(parking, i);
            let suite_count = int_at(suites, i);
            MapPoint {
                latitude: lat.and_then(|c| c.get_f64(i)).unwrap_or(DEFAULT_LATITUDE),
                longitude: lon.and_then(|c| c.get_f64(i)).unwrap_or(DEFAULT_LONGITUDE),
                price: price.get_f64(i),
                rooms: int_at(rooms, i),
                suites: suite_count,
                parking_spaces,
                has_pool,
                marker: MarkerKind::classify(has_pool, parking_spaces, suite_count),
            }
        })
        .collect();

    Ok(points)
}

/// Coordinates of the first listing, or the centroid for an empty table
pub fn map_center(table: &ListingsTable) -> (f64, f64) {
    let coord = |name: &str, default: f64| {
        table
            .get_col(name)
            .ok()
            .and_then(|c| c.get_f64(0))
            .unwrap_or(default)
    };
    (
        coord(LATITUDE, DEFAULT_LATITUDE),
        coord(LONGITUDE, DEFAULT_LONGITUDE),
    )
}
