//! # ListingsProcessor
//!
//! `ListingsProcessor` is the data pipeline behind a São Paulo real-estate listings
//! dashboard. It loads a listings CSV into an immutable columnar table and exposes the
//! transformations the dashboard views are built from:
//!
//! - Memory-mapped, parallel CSV loading with type inference (int, float, string)
//! - Filtering by district, negotiation type, rooms, suites, parking spaces and pool
//! - Derived cost per square meter, validated before it is computed
//! - Grouped means with deterministic (ascending key) ordering
//! - Top/bottom rankings with key tie-breaks
//! - Pearson correlation against a target column, undefined values ranked last
//! - An LRU table cache keyed by file path and modification time
//!
//! Numeric aggregation and filtering use AVX2 when available, with a scalar fallback.
//!
//! # Example
//!
//! ```rust,no_run
//! use listings_processor::processor::{
//!     NegotiationType, aggregate::group_mean, derive::with_cost_per_area,
//!     filter::{ListingFilter, filter}, listings_table::ListingsTable, rank::top,
//!     schema::{DISTRICT, PRICE},
//! };
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (table, _summary) = ListingsTable::load_csv(Path::new("imoveis-sao-paulo.csv"))?;
//!
//!     let sales = filter(&table, &ListingFilter::new().negotiation_type(NegotiationType::Sale))?;
//!     let priced = with_cost_per_area(sales.table())?;
//!     println!("{} listings with cost per m²", priced.row_count());
//!
//!     let by_district = group_mean(sales.table(), DISTRICT, PRICE)?;
//!     for (district, mean) in top(&by_district, 5) {
//!         println!("{district} => {mean:.2}");
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod config;
mod helpers;
pub mod processor;

#[cfg(feature = "python-bindings")]
pub mod python;

pub use processor::{
    AggregateOp, FilterPredicate, GroupKey, NegotiationType, ProcessorError, ValidationError,
    Value,
};
