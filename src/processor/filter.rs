//! Filter engine: conjunctions of field-level predicates over a listings table.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::helpers::simd_helpers::{filter_f64, filter_i64};
use crate::processor::{
    FilterPredicate, NegotiationType, ProcessorError, Value,
    column::Column,
    listings_table::ListingsTable,
    schema::{DISTRICT, NEGOTIATION_TYPE, PARKING_SPACES, POOL, ROOMS, SUITES},
};

/// Listing filter. Every field is optional; `None` means "All".
///
/// Active fields compose by logical AND.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingFilter {
    pub district: Option<String>,
    pub negotiation_type: Option<NegotiationType>,
    pub rooms: Option<i64>,
    pub suites: Option<i64>,
    pub parking_spaces: Option<i64>,
    pub has_pool: Option<bool>,
}

impl ListingFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn district(mut self, district: &str) -> Self {
        self.district = Some(district.to_string());
        self
    }

    pub fn negotiation_type(mut self, negotiation_type: NegotiationType) -> Self {
        self.negotiation_type = Some(negotiation_type);
        self
    }

    pub fn rooms(mut self, rooms: i64) -> Self {
        self.rooms = Some(rooms);
        self
    }

    pub fn suites(mut self, suites: i64) -> Self {
        self.suites = Some(suites);
        self
    }

    pub fn parking_spaces(mut self, parking_spaces: i64) -> Self {
        self.parking_spaces = Some(parking_spaces);
        self
    }

    pub fn has_pool(mut self, has_pool: bool) -> Self {
        self.has_pool = Some(has_pool);
        self
    }

    /// Same filter without the district and negotiation fields
    pub fn amenities_only(&self) -> Self {
        Self {
            district: None,
            negotiation_type: None,
            ..self.clone()
        }
    }

    /// Active predicates as (column, predicate) pairs
    pub fn predicates(&self) -> Vec<(&'static str, FilterPredicate)> {
        let mut out = Vec::new();
        if let Some(d) = &self.district {
            out.push((DISTRICT, FilterPredicate::Equals(Value::Str(d.clone()))));
        }
        if let Some(n) = self.negotiation_type {
            out.push((
                NEGOTIATION_TYPE,
                FilterPredicate::Equals(Value::Str(n.as_str().to_string())),
            ));
        }
        if let Some(r) = self.rooms {
            out.push((ROOMS, FilterPredicate::Equals(Value::Int(r))));
        }
        if let Some(s) = self.suites {
            out.push((SUITES, FilterPredicate::Equals(Value::Int(s))));
        }
        if let Some(p) = self.parking_spaces {
            out.push((PARKING_SPACES, FilterPredicate::Equals(Value::Int(p))));
        }
        if let Some(pool) = self.has_pool {
            out.push((POOL, FilterPredicate::Equals(Value::Int(pool as i64))));
        }
        out
    }

    pub fn active_count(&self) -> usize {
        self.predicates().len()
    }

    pub fn is_empty(&self) -> bool {
        self.active_count() == 0
    }
}

/// Result of [`filter`]: the matching rows plus how many predicates produced them.
///
/// An empty view with active predicates ("nothing matched") is distinct from an
/// unfiltered view ("no predicates applied").
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredView {
    table: ListingsTable,
    active_predicates: usize,
}

impl FilteredView {
    pub fn table(&self) -> &ListingsTable {
        &self.table
    }

    pub fn into_table(self) -> ListingsTable {
        self.table
    }

    pub fn row_count(&self) -> usize {
        self.table.row_count()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn active_predicates(&self) -> usize {
        self.active_predicates
    }

    pub fn is_unfiltered(&self) -> bool {
        self.active_predicates == 0
    }
}

/// Applies a [`ListingFilter`] and returns the matching rows in original order.
///
/// Null fields never match an active predicate.
///
/// # Errors
/// [`ProcessorError::MissingColumn`] when an active predicate names a column the
/// table lacks. Inactive predicates never touch the schema.
pub fn filter(
    table: &ListingsTable,
    listing_filter: &ListingFilter,
) -> Result<FilteredView, ProcessorError> {
    let predicates = listing_filter.predicates();
    let mut filtered_rows: Option<Vec<usize>> = None;

    for (column, predicate) in &predicates {
        let current = filter_rows(table, column, predicate)?;
        filtered_rows = Some(match filtered_rows {
            None => current,
            Some(existing) => intersect_sorted_vecs(&existing, &current),
        });
    }

    let table = match filtered_rows {
        Some(rows) => table.take(&rows),
        None => table.clone(),
    };

    debug!(
        predicates = predicates.len(),
        rows = table.row_count(),
        "filtered listings"
    );

    Ok(FilteredView {
        table,
        active_predicates: predicates.len(),
    })
}

/// Row indices (ascending) of a single column matching `predicate`.
///
/// Numeric columns accept integer or float operands; string columns compare
/// lexicographically.
pub fn filter_rows(
    table: &ListingsTable,
    column: &str,
    predicate: &FilterPredicate,
) -> Result<Vec<usize>, ProcessorError> {
    let col = table.get_col(column)?;

    let unsupported = || {
        ProcessorError::Parse(format!(
            "Predicate {:?} not supported on column '{}'",
            predicate, column
        ))
    };

    let candidates = match (col, predicate) {
        (Column::Int64 { values, .. }, _) if is_int_predicate(predicate) => {
            filter_i64(values, predicate)
        }
        (Column::Int64 { values, .. }, _) => {
            let widened = predicate.to_float().ok_or_else(unsupported)?;
            let as_f64: Vec<f64> = values.iter().map(|v| *v as f64).collect();
            filter_f64(&as_f64, &widened)
        }
        (Column::Float64 { values, .. }, _) => {
            let widened = predicate.to_float().ok_or_else(unsupported)?;
            filter_f64(values, &widened)
        }
        (Column::Str { values, .. }, _) => {
            let mut out = Vec::new();
            for (i, v) in values.iter().enumerate() {
                let keep = match predicate {
                    FilterPredicate::Equals(Value::Str(t)) => v == t,
                    FilterPredicate::GreaterThan(Value::Str(t)) => v > t,
                    FilterPredicate::LessThan(Value::Str(t)) => v < t,
                    FilterPredicate::Between(Value::Str(a), Value::Str(b)) => v >= a && v <= b,
                    _ => return Err(unsupported()),
                };
                if keep {
                    out.push(i);
                }
            }
            out
        }
    };

    Ok(candidates.into_iter().filter(|&i| col.is_valid(i)).collect())
}

fn is_int_predicate(predicate: &FilterPredicate) -> bool {
    match predicate {
        FilterPredicate::Equals(v)
        | FilterPredicate::GreaterThan(v)
        | FilterPredicate::LessThan(v) => matches!(v, Value::Int(_)),
        FilterPredicate::Between(a, b) => matches!((a, b), (Value::Int(_), Value::Int(_))),
    }
}

/// Helper function to intersect sorted vectors
fn intersect_sorted_vecs(a: &[usize], b: &[usize]) -> Vec<usize> {
    let mut result = Vec::with_capacity(a.len().min(b.len()));
    let mut i = 0;
    let mut j = 0;

    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Equal => {
                result.push(a[i]);
                i += 1;
                j += 1;
            }
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
        }
    }

    result
}
