//! Pearson correlation of numeric columns against a target column.

use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use tracing::debug;

use crate::processor::{ProcessorError, listings_table::ListingsTable};

/// Correlation coefficient, or `Undefined` when a side has zero variance or there
/// are fewer than two paired values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Correlation {
    Defined(f64),
    Undefined,
}

impl Correlation {
    pub fn value(&self) -> Option<f64> {
        match self {
            Correlation::Defined(v) => Some(*v),
            Correlation::Undefined => None,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Correlation::Undefined)
    }
}

impl Serialize for Correlation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Correlation::Defined(v) => serializer.serialize_some(v),
            Correlation::Undefined => serializer.serialize_none(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationEntry {
    pub column: String,
    pub correlation: Correlation,
}

/// Pearson product-moment correlation of two equally long samples
pub fn pearson(xs: &[f64], ys: &[f64]) -> Correlation {
    let n = xs.len().min(ys.len());
    if n < 2 || is_constant(&xs[..n]) || is_constant(&ys[..n]) {
        return Correlation::Undefined;
    }

    // r is scale invariant; unit-scaled samples keep the sums of squares finite
    let (xs, ys) = (unit_scaled(&xs[..n]), unit_scaled(&ys[..n]));
    let mean_x = xs.iter().sum::<f64>() / n as f64;
    let mean_y = ys.iter().sum::<f64>() / n as f64;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(&ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    let r = sxy / (sxx * syy).sqrt();
    if r.is_finite() {
        Correlation::Defined(r.clamp(-1.0, 1.0))
    } else {
        Correlation::Undefined
    }
}

fn is_constant(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] == w[1])
}

/// Divides by the largest magnitude so every value lies in [-1, 1]
fn unit_scaled(values: &[f64]) -> Vec<f64> {
    let scale = values.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    values.iter().map(|v| v / scale).collect()
}

/// Correlation of every numeric column (except `target`) with `target`, over rows
/// where both values are non-null.
///
/// Sorted descending by coefficient, ties by column name; undefined entries come
/// last, ordered by column name.
///
/// # Errors
/// [`ProcessorError::MissingColumn`] if `target` is absent,
/// [`ProcessorError::TypeMismatch`] if it is not numeric.
pub fn correlate_with(
    table: &ListingsTable,
    target: &str,
) -> Result<Vec<CorrelationEntry>, ProcessorError> {
    let target_col = table.get_col(target)?;
    if !target_col.is_numeric() {
        return Err(ProcessorError::TypeMismatch {
            column: target.to_string(),
            expected: "numeric",
        });
    }

    let mut entries: Vec<CorrelationEntry> = table
        .iter_columns()
        .filter(|(name, col)| *name != target && col.is_numeric())
        .map(|(name, col)| {
            let (xs, ys): (Vec<f64>, Vec<f64>) = (0..table.row_count())
                .filter_map(|i| Some((col.get_f64(i)?, target_col.get_f64(i)?)))
                .unzip();
            CorrelationEntry {
                column: name.to_string(),
                correlation: pearson(&xs, &ys),
            }
        })
        .collect();

    entries.sort_by(|a, b| match (a.correlation, b.correlation) {
        (Correlation::Defined(x), Correlation::Defined(y)) => {
            y.total_cmp(&x).then_with(|| a.column.cmp(&b.column))
        }
        (Correlation::Defined(_), Correlation::Undefined) => Ordering::Less,
        (Correlation::Undefined, Correlation::Defined(_)) => Ordering::Greater,
        (Correlation::Undefined, Correlation::Undefined) => a.column.cmp(&b.column),
    });

    debug!(target, columns = entries.len(), "correlations computed");
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::{
        column::Column,
        schema::{DISTRICT, PRICE, ROOMS, SIZE},
    };

    #[test]
    fn test_pearson_perfect() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(pearson(&xs, &[2.0, 4.0, 6.0, 8.0]), Correlation::Defined(1.0));
        assert_eq!(pearson(&xs, &[8.0, 6.0, 4.0, 2.0]), Correlation::Defined(-1.0));
    }

    #[test]
    fn test_pearson_extreme_magnitudes() {
        let huge = [1e160, -1e160, 0.0];
        assert_eq!(pearson(&huge, &huge), Correlation::Defined(1.0));
        assert_eq!(pearson(&huge, &[1.0, -1.0, 0.0]), Correlation::Defined(1.0));
        assert_eq!(pearson(&huge, &[-3.0, 3.0, 0.0]), Correlation::Defined(-1.0));

        let tiny = [1e-170, 3e-170, 2e-170];
        let r = pearson(&tiny, &[1.0, 3.0, 2.0]).value().unwrap();
        assert!((r - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pearson_undefined() {
        assert_eq!(pearson(&[1.0], &[2.0]), Correlation::Undefined);
        assert_eq!(pearson(&[0.1, 0.1, 0.1], &[1.0, 2.0, 3.0]), Correlation::Undefined);
    }

    #[test]
    fn test_correlate_with_orders_and_flags_undefined() {
        let table = ListingsTable::from_columns(vec![
            (DISTRICT, Column::from_strs(vec!["A", "B", "C", "D"])),
            (PRICE, Column::from_i64(vec![100, 200, 300, 400])),
            (SIZE, Column::from_i64(vec![10, 20, 30, 40])),
            (ROOMS, Column::from_i64(vec![4, 1, 3, 2])),
            ("Constante", Column::from_i64(vec![1, 1, 1, 1])),
            ("Andar", Column::from_opt_f64(vec![Some(5.0), None, None, None])),
        ])
        .unwrap();

        let entries = correlate_with(&table, PRICE).unwrap();
        let columns: Vec<&str> = entries.iter().map(|e| e.column.as_str()).collect();
        assert_eq!(columns, vec![SIZE, ROOMS, "Andar", "Constante"]);
        assert_eq!(entries[0].correlation, Correlation::Defined(1.0));
        assert!(entries[1].correlation.value().unwrap() < 0.0);
        assert!(entries[2].correlation.is_undefined());
        assert!(entries[3].correlation.is_undefined());
    }

    #[test]
    fn test_equal_coefficients_ordered_by_name() {
        let table = ListingsTable::from_columns(vec![
            (PRICE, Column::from_i64(vec![100, 250, 300, 420])),
            ("Vagas", Column::from_i64(vec![1, 2, 4, 3])),
            ("Banheiros", Column::from_i64(vec![1, 2, 4, 3])),
            (SIZE, Column::from_i64(vec![10, 25, 30, 42])),
        ])
        .unwrap();

        let entries = correlate_with(&table, PRICE).unwrap();
        let columns: Vec<&str> = entries.iter().map(|e| e.column.as_str()).collect();
        assert_eq!(columns, vec![SIZE, "Banheiros", "Vagas"]);
        assert_eq!(entries[1].correlation, entries[2].correlation);
        assert!(entries[1].correlation.value().unwrap() < 1.0);
    }

    #[test]
    fn test_target_must_be_numeric() {
        let table = ListingsTable::from_columns(vec![(DISTRICT, Column::from_strs(vec!["A"]))])
            .unwrap();
        assert!(matches!(
            correlate_with(&table, DISTRICT),
            Err(ProcessorError::TypeMismatch { .. })
        ));
        assert!(matches!(
            correlate_with(&table, PRICE),
            Err(ProcessorError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_serialize_undefined_as_null() {
        let entry = CorrelationEntry {
            column: "x".to_string(),
            correlation: Correlation::Undefined,
        };
        assert_eq!(
            serde_json::to_string(&entry).unwrap(),
            r#"{"column":"x","correlation":null}"#
        );
    }
}
