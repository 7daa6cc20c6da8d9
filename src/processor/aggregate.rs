//! Group-by and scalar aggregations.
//!
//! Groups come out ascending by key. Rows with a null key are skipped, null values
//! are skipped, and a group left with no values is absent from the output.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::helpers::simd_helpers::aggregate_f64;
use crate::processor::{
    AggregateOp, GroupKey, ProcessorError, column::Column, listings_table::ListingsTable,
};

/// Ordered mapping from group key to aggregated value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedSeries {
    key_column: String,
    value_column: String,
    op: AggregateOp,
    entries: BTreeMap<GroupKey, f64>,
}

impl GroupedSeries {
    pub fn key_column(&self) -> &str {
        &self.key_column
    }

    pub fn value_column(&self) -> &str {
        &self.value_column
    }

    pub fn op(&self) -> AggregateOp {
        self.op
    }

    pub fn get(&self, key: &GroupKey) -> Option<f64> {
        self.entries.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries ascending by key
    pub fn iter(&self) -> impl Iterator<Item = (&GroupKey, f64)> {
        self.entries.iter().map(|(k, v)| (k, *v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &GroupKey> {
        self.entries.keys()
    }

    pub fn into_entries(self) -> Vec<(GroupKey, f64)> {
        self.entries.into_iter().collect()
    }
}

/// Descriptive statistics of the non-null values of a numeric column.
///
/// Quartiles interpolate linearly between the closest ranks. `std` is the sample
/// standard deviation and is `None` below two values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub count: usize,
    pub mean: f64,
    pub std: Option<f64>,
    pub min: f64,
    #[serde(rename = "25%")]
    pub q1: f64,
    #[serde(rename = "50%")]
    pub median: f64,
    #[serde(rename = "75%")]
    pub q3: f64,
    pub max: f64,
}

/// Mean of `value_key` per distinct value of `group_key`.
///
/// # Example
/// ```rust
/// # use listings_processor::processor::{column::Column, listings_table::ListingsTable, GroupKey};
/// # use listings_processor::processor::aggregate::group_mean;
/// let table = ListingsTable::from_columns(vec![
///     ("Distrito", Column::from_strs(vec!["A", "A"])),
///     ("Preço", Column::from_i64(vec![100, 300])),
/// ])
/// .unwrap();
/// let means = group_mean(&table, "Distrito", "Preço").unwrap();
/// assert_eq!(means.get(&GroupKey::from("A")), Some(200.0));
/// ```
pub fn group_mean(
    table: &ListingsTable,
    group_key: &str,
    value_key: &str,
) -> Result<GroupedSeries, ProcessorError> {
    group_aggregate(table, group_key, value_key, AggregateOp::Mean)
}

/// Group-by aggregation on an integer or string key column
///
/// # Errors
/// - [`ProcessorError::MissingColumn`] if either column is absent
/// - [`ProcessorError::TypeMismatch`] if the key column is float or the value
///   column is not numeric
pub fn group_aggregate(
    table: &ListingsTable,
    group_key: &str,
    value_key: &str,
    op: AggregateOp,
) -> Result<GroupedSeries, ProcessorError> {
    let gcol = key_column(table, group_key)?;
    let acol = numeric_column(table, value_key)?;

    let mut groups: BTreeMap<GroupKey, Vec<f64>> = BTreeMap::new();
    for i in 0..table.row_count() {
        if let (Some(key), Some(v)) = (gcol.group_key(i), acol.get_f64(i)) {
            groups.entry(key).or_default().push(v);
        }
    }

    let entries: BTreeMap<GroupKey, f64> = groups
        .into_iter()
        .map(|(k, values)| (k, aggregate_f64(&values, op)))
        .collect();

    debug!(
        group_key,
        value_key,
        ?op,
        groups = entries.len(),
        "grouped aggregation"
    );

    Ok(GroupedSeries {
        key_column: group_key.to_string(),
        value_column: value_key.to_string(),
        op,
        entries,
    })
}

/// Mean of the non-null values of a numeric column; `None` when there are none
pub fn column_mean(table: &ListingsTable, column: &str) -> Result<Option<f64>, ProcessorError> {
    Ok(summary(table, column)?.map(|s| s.mean))
}

/// Summary of the non-null values of a numeric column; `None` when there are none
pub fn summary(
    table: &ListingsTable,
    column: &str,
) -> Result<Option<ColumnSummary>, ProcessorError> {
    let col = numeric_column(table, column)?;
    let mut values: Vec<f64> = col.iter_f64().flatten().collect();
    if values.is_empty() {
        return Ok(None);
    }

    let count = values.len();
    let mean = aggregate_f64(&values, AggregateOp::Mean);
    let std = (count > 1).then(|| {
        let squares: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
        (squares / (count - 1) as f64).sqrt()
    });

    values.sort_unstable_by(f64::total_cmp);

    Ok(Some(ColumnSummary {
        count,
        mean,
        std,
        min: aggregate_f64(&values, AggregateOp::Min),
        q1: quantile(&values, 0.25),
        median: quantile(&values, 0.5),
        q3: quantile(&values, 0.75),
        max: aggregate_f64(&values, AggregateOp::Max),
    }))
}

/// Linear interpolation between closest ranks of a sorted, non-empty slice
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Sorted distinct non-null values of an integer or string column.
///
/// Used to populate selector options (districts, room counts, ...).
pub fn distinct_values(
    table: &ListingsTable,
    column: &str,
) -> Result<Vec<GroupKey>, ProcessorError> {
    let col = key_column(table, column)?;
    let keys: BTreeSet<GroupKey> = (0..table.row_count())
        .filter_map(|i| col.group_key(i))
        .collect();
    Ok(keys.into_iter().collect())
}

fn key_column<'a>(table: &'a ListingsTable, name: &str) -> Result<&'a Column, ProcessorError> {
    let col = table.get_col(name)?;
    match col {
        Column::Float64 { .. } => Err(ProcessorError::TypeMismatch {
            column: name.to_string(),
            expected: "an integer or string column",
        }),
        _ => Ok(col),
    }
}

fn numeric_column<'a>(table: &'a ListingsTable, name: &str) -> Result<&'a Column, ProcessorError> {
    let col = table.get_col(name)?;
    if !col.is_numeric() {
        return Err(ProcessorError::TypeMismatch {
            column: name.to_string(),
            expected: "numeric",
        });
    }
    Ok(col)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::schema::{CONDO_FEE, DISTRICT, POOL, PRICE, ROOMS};

    fn sample_table() -> ListingsTable {
        ListingsTable::from_columns(vec![
            (
                DISTRICT,
                Column::from_opt_strs(vec![
                    Some("Sé"),
                    Some("Moema"),
                    Some("Sé"),
                    None,
                    Some("Lapa"),
                ]),
            ),
            (PRICE, Column::from_i64(vec![100, 500, 300, 999, 50])),
            (ROOMS, Column::from_i64(vec![10, 2, 1, 2, 2])),
            (POOL, Column::from_i64(vec![0, 1, 0, 1, 0])),
            (
                CONDO_FEE,
                Column::from_opt_f64(vec![Some(400.0), None, Some(200.0), None, None]),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_group_mean_ascending_keys() {
        let series = group_mean(&sample_table(), DISTRICT, PRICE).unwrap();
        let entries = series.into_entries();
        assert_eq!(
            entries,
            vec![
                (GroupKey::from("Lapa"), 50.0),
                (GroupKey::from("Moema"), 500.0),
                (GroupKey::from("Sé"), 200.0),
            ]
        );
    }

    #[test]
    fn test_integer_keys_order_numerically() {
        let series = group_mean(&sample_table(), ROOMS, PRICE).unwrap();
        let keys: Vec<_> = series.keys().cloned().collect();
        assert_eq!(keys, vec![GroupKey::Int(1), GroupKey::Int(2), GroupKey::Int(10)]);
        assert!((series.get(&GroupKey::Int(2)).unwrap() - 516.333333).abs() < 1e-4);
    }

    #[test]
    fn test_null_values_skipped_and_empty_groups_absent() {
        let series = group_mean(&sample_table(), DISTRICT, CONDO_FEE).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.get(&GroupKey::from("Sé")), Some(300.0));
        assert_eq!(series.get(&GroupKey::from("Moema")), None);
    }

    #[test]
    fn test_other_ops() {
        let t = sample_table();
        let sums = group_aggregate(&t, POOL, PRICE, AggregateOp::Sum).unwrap();
        assert_eq!(sums.get(&GroupKey::Int(1)), Some(1499.0));
        let counts = group_aggregate(&t, POOL, PRICE, AggregateOp::Count).unwrap();
        assert_eq!(counts.get(&GroupKey::Int(0)), Some(3.0));
        let max = group_aggregate(&t, POOL, PRICE, AggregateOp::Max).unwrap();
        assert_eq!(max.get(&GroupKey::Int(0)), Some(300.0));
    }

    #[test]
    fn test_empty_table_gives_empty_series() {
        let t = sample_table().take(&[]);
        let series = group_mean(&t, DISTRICT, PRICE).unwrap();
        assert!(series.is_empty());
        assert_eq!(column_mean(&t, PRICE).unwrap(), None);
    }

    #[test]
    fn test_type_errors() {
        let t = sample_table();
        assert!(matches!(
            group_mean(&t, CONDO_FEE, PRICE),
            Err(ProcessorError::TypeMismatch { .. })
        ));
        assert!(matches!(
            group_mean(&t, PRICE, DISTRICT),
            Err(ProcessorError::TypeMismatch { .. })
        ));
        assert!(matches!(
            group_mean(&t, "Bairro", PRICE),
            Err(ProcessorError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_summary_and_column_mean() {
        let t = sample_table();
        assert_eq!(column_mean(&t, CONDO_FEE).unwrap(), Some(300.0));
        let s = summary(&t, PRICE).unwrap().unwrap();
        assert_eq!(s.count, 5);
        assert_eq!(s.min, 50.0);
        assert_eq!(s.max, 999.0);
        assert!((s.mean - 389.8).abs() < 1e-9);
        assert!((s.std.unwrap() - 384.311332).abs() < 1e-5);
        assert_eq!((s.q1, s.median, s.q3), (100.0, 300.0, 500.0));
    }

    #[test]
    fn test_summary_interpolates_quartiles() {
        let s = summary(&sample_table(), CONDO_FEE).unwrap().unwrap();
        assert_eq!(s.count, 2);
        assert_eq!((s.q1, s.median, s.q3), (250.0, 300.0, 350.0));
        assert!((s.std.unwrap() - 200.0_f64.sqrt() * 10.0).abs() < 1e-9);

        let single = sample_table().take(&[0]);
        let s = summary(&single, CONDO_FEE).unwrap().unwrap();
        assert_eq!(s.std, None);
        assert_eq!((s.min, s.median, s.max), (400.0, 400.0, 400.0));

        let json = serde_json::to_value(s).unwrap();
        assert_eq!(json["50%"], 400.0);
        assert!(json["std"].is_null());
    }

    #[test]
    fn test_distinct_values() {
        let values = distinct_values(&sample_table(), DISTRICT).unwrap();
        assert_eq!(
            values,
            vec![GroupKey::from("Lapa"), GroupKey::from("Moema"), GroupKey::from("Sé")]
        );
    }
}
