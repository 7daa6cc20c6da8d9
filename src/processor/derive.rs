//! Derived per-row metrics.

use tracing::{debug, warn};

use crate::processor::{
    RowRef, ValidationError,
    column::Column,
    listings_table::ListingsTable,
    schema::{COST_PER_AREA, DISTRICT, PRICE, SIZE},
};

/// Rounds to 2 decimal digits, half away from zero.
///
/// For the non-negative prices in the dataset this is round-half-up. Rounding is
/// applied to the binary `f64` quotient, so a quotient like `1.005` (stored as
/// `1.00499999...`) rounds down.
pub fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Adds the `cost per area` column (`price / size`, rounded to 2 decimals).
///
/// Every row must have a non-null, strictly positive size. Null sizes are checked
/// before non-positive ones; the error reports the count and the first offending
/// row. A null price yields a null cost.
///
/// # Errors
/// [`ValidationError`] when the size or price column is missing or not numeric, or
/// when any size is null or `<= 0`. No partial table is returned.
///
/// # Example
/// ```rust
/// # use listings_processor::processor::{column::Column, listings_table::ListingsTable};
/// # use listings_processor::processor::derive::with_cost_per_area;
/// let table = ListingsTable::from_columns(vec![
///     ("Preço", Column::from_i64(vec![1000])),
///     ("Tamanho", Column::from_i64(vec![3])),
/// ])
/// .unwrap();
/// let derived = with_cost_per_area(&table).unwrap();
/// assert_eq!(derived.get_col("Custo por m²").unwrap().get_f64(0), Some(333.33));
/// ```
pub fn with_cost_per_area(table: &ListingsTable) -> Result<ListingsTable, ValidationError> {
    let size = numeric_column(table, SIZE)?;
    let price = numeric_column(table, PRICE)?;
    let districts = table.get_col(DISTRICT).ok();

    let row_ref = |row: usize| RowRef {
        row,
        district: districts
            .and_then(|d| d.get_str(row))
            .map(str::to_string),
    };

    let null_rows: Vec<usize> = (0..table.row_count())
        .filter(|&i| !size.is_valid(i))
        .collect();
    if let Some(&first) = null_rows.first() {
        let err = ValidationError::NullValues {
            column: SIZE.to_string(),
            count: null_rows.len(),
            first: row_ref(first),
        };
        warn!(%err, "cannot compute cost per area");
        return Err(err);
    }

    // `!(s > 0.0)` also rejects NaN
    let non_positive: Vec<usize> = (0..table.row_count())
        .filter(|&i| size.get_f64(i).is_some_and(|s| !(s > 0.0)))
        .collect();
    if let Some(&first) = non_positive.first() {
        let err = ValidationError::NonPositiveValues {
            column: SIZE.to_string(),
            count: non_positive.len(),
            first: row_ref(first),
        };
        warn!(%err, "cannot compute cost per area");
        return Err(err);
    }

    let cost: Vec<Option<f64>> = (0..table.row_count())
        .map(|i| match (price.get_f64(i), size.get_f64(i)) {
            (Some(p), Some(s)) => Some(round_to_cents(p / s)),
            _ => None,
        })
        .collect();

    debug!(rows = cost.len(), "computed cost per area");

    // lengths match by construction, so the only failure is a schema one
    table
        .with_column(COST_PER_AREA, Column::from_opt_f64(cost))
        .map_err(|_| ValidationError::MissingColumn {
            column: COST_PER_AREA.to_string(),
        })
}

fn numeric_column<'a>(
    table: &'a ListingsTable,
    name: &str,
) -> Result<&'a Column, ValidationError> {
    let col = table
        .get_col(name)
        .map_err(|_| ValidationError::MissingColumn {
            column: name.to_string(),
        })?;
    if !col.is_numeric() {
        return Err(ValidationError::NonNumeric {
            column: name.to_string(),
        });
    }
    Ok(col)
}
