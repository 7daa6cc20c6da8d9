use serde::ser::{Serialize, SerializeSeq, Serializer};

use crate::processor::{GroupKey, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int64,
    Float64,
    Str,
}

impl ColumnType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Int64 | ColumnType::Float64)
    }
}

/// A nullable column. `validity[i] == false` marks row `i` as null; the slot in
/// `values` then holds a placeholder (0, 0.0 or an empty string).
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Int64 { values: Vec<i64>, validity: Vec<bool> },
    Float64 { values: Vec<f64>, validity: Vec<bool> },
    Str { values: Vec<String>, validity: Vec<bool> },
}

impl Column {
    pub fn with_capacity(column_type: ColumnType, capacity: usize) -> Self {
        match column_type {
            ColumnType::Int64 => Column::Int64 {
                values: Vec::with_capacity(capacity),
                validity: Vec::with_capacity(capacity),
            },
            ColumnType::Float64 => Column::Float64 {
                values: Vec::with_capacity(capacity),
                validity: Vec::with_capacity(capacity),
            },
            ColumnType::Str => Column::Str {
                values: Vec::with_capacity(capacity),
                validity: Vec::with_capacity(capacity),
            },
        }
    }

    pub fn from_i64(values: Vec<i64>) -> Self {
        let validity = vec![true; values.len()];
        Column::Int64 { values, validity }
    }

    pub fn from_f64(values: Vec<f64>) -> Self {
        let validity = vec![true; values.len()];
        Column::Float64 { values, validity }
    }

    pub fn from_strs<S: Into<String>>(values: Vec<S>) -> Self {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        let validity = vec![true; values.len()];
        Column::Str { values, validity }
    }

    pub fn from_opt_i64(values: Vec<Option<i64>>) -> Self {
        let validity = values.iter().map(Option::is_some).collect();
        let values = values.into_iter().map(|v| v.unwrap_or_default()).collect();
        Column::Int64 { values, validity }
    }

    pub fn from_opt_f64(values: Vec<Option<f64>>) -> Self {
        let validity = values.iter().map(Option::is_some).collect();
        let values = values.into_iter().map(|v| v.unwrap_or_default()).collect();
        Column::Float64 { values, validity }
    }

    pub fn from_opt_strs<S: Into<String>>(values: Vec<Option<S>>) -> Self {
        let validity = values.iter().map(Option::is_some).collect();
        let values = values
            .into_iter()
            .map(|v| v.map(Into::into).unwrap_or_default())
            .collect();
        Column::Str { values, validity }
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            Column::Int64 { .. } => ColumnType::Int64,
            Column::Float64 { .. } => ColumnType::Float64,
            Column::Str { .. } => ColumnType::Str,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.column_type().is_numeric()
    }

    fn validity(&self) -> &[bool] {
        match self {
            Column::Int64 { validity, .. }
            | Column::Float64 { validity, .. }
            | Column::Str { validity, .. } => validity,
        }
    }

    pub fn len(&self) -> usize {
        self.validity().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_valid(&self, idx: usize) -> bool {
        self.validity().get(idx).copied().unwrap_or(false)
    }

    pub fn null_count(&self) -> usize {
        self.validity().iter().filter(|v| !**v).count()
    }

    pub fn push_null(&mut self) {
        match self {
            Column::Int64 { values, validity } => {
                values.push(0);
                validity.push(false);
            }
            Column::Float64 { values, validity } => {
                values.push(0.0);
                validity.push(false);
            }
            Column::Str { values, validity } => {
                values.push(String::new());
                validity.push(false);
            }
        }
    }

    /// Parses a raw CSV field according to this column's type and appends it.
    ///
    /// Empty fields become nulls. An integer column that meets a finite decimal is
    /// promoted to `Float64` first. A field that does not parse is appended as null
    /// and the reason is returned so the loader can record it.
    pub fn push_field(&mut self, raw: &[u8]) -> Result<(), String> {
        let field = clean_field(raw);
        if field.is_empty() {
            self.push_null();
            return Ok(());
        }

        let promote = match self {
            Column::Int64 { values, validity } => match atoi_simd::parse::<i64>(field) {
                Ok(v) => {
                    values.push(v);
                    validity.push(true);
                    return Ok(());
                }
                Err(_) => parse_finite(field).is_some(),
            },
            _ => false,
        };
        if promote {
            self.promote_to_f64();
        }

        match self {
            Column::Int64 { values, validity } => {
                values.push(0);
                validity.push(false);
                Err("invalid integer".to_string())
            }
            Column::Float64 { values, validity } => match parse_finite(field) {
                Some(v) => {
                    values.push(v);
                    validity.push(true);
                    Ok(())
                }
                None => {
                    values.push(0.0);
                    validity.push(false);
                    Err("invalid float".to_string())
                }
            },
            Column::Str { values, validity } => {
                let text = String::from_utf8_lossy(field);
                let quoted = raw.trim_ascii().first() == Some(&b'"');
                values.push(if quoted && text.contains("\"\"") {
                    text.replace("\"\"", "\"")
                } else {
                    text.into_owned()
                });
                validity.push(true);
                Ok(())
            }
        }
    }

    /// Converts an `Int64` column to `Float64` in place; other types are unchanged
    pub fn promote_to_f64(&mut self) {
        if let Column::Int64 { values, validity } = self {
            let values = values.iter().map(|&v| v as f64).collect();
            let validity = std::mem::take(validity);
            *self = Column::Float64 { values, validity };
        }
    }

    /// Appends another column of the same type.
    ///
    /// `Int64` and `Float64` mix by promoting the integer side, so chunks parsed
    /// with a late promotion still merge. Any other mismatch hands `other` back.
    pub fn append(&mut self, mut other: Column) -> Result<(), Column> {
        match (self.column_type(), other.column_type()) {
            (ColumnType::Int64, ColumnType::Float64) => self.promote_to_f64(),
            (ColumnType::Float64, ColumnType::Int64) => other.promote_to_f64(),
            _ => {}
        }

        match (self, other) {
            (
                Column::Int64 { values, validity },
                Column::Int64 {
                    values: mut v,
                    validity: mut m,
                },
            ) => {
                values.append(&mut v);
                validity.append(&mut m);
                Ok(())
            }
            (
                Column::Float64 { values, validity },
                Column::Float64 {
                    values: mut v,
                    validity: mut m,
                },
            ) => {
                values.append(&mut v);
                validity.append(&mut m);
                Ok(())
            }
            (
                Column::Str { values, validity },
                Column::Str {
                    values: mut v,
                    validity: mut m,
                },
            ) => {
                values.append(&mut v);
                validity.append(&mut m);
                Ok(())
            }
            (_, other) => Err(other),
        }
    }

    // Random access

    pub fn get_i64(&self, idx: usize) -> Option<i64> {
        match self {
            Column::Int64 { values, .. } if self.is_valid(idx) => Some(values[idx]),
            _ => None,
        }
    }

    /// Numeric value as f64; integers are widened
    pub fn get_f64(&self, idx: usize) -> Option<f64> {
        if !self.is_valid(idx) {
            return None;
        }
        match self {
            Column::Int64 { values, .. } => Some(values[idx] as f64),
            Column::Float64 { values, .. } => Some(values[idx]),
            Column::Str { .. } => None,
        }
    }

    pub fn get_str(&self, idx: usize) -> Option<&str> {
        match self {
            Column::Str { values, .. } if self.is_valid(idx) => Some(values[idx].as_str()),
            _ => None,
        }
    }

    pub fn value(&self, idx: usize) -> Option<Value> {
        if !self.is_valid(idx) {
            return None;
        }
        Some(match self {
            Column::Int64 { values, .. } => Value::Int(values[idx]),
            Column::Float64 { values, .. } => Value::Float(values[idx]),
            Column::Str { values, .. } => Value::Str(values[idx].clone()),
        })
    }

    /// Grouping key for a row. Float columns have no key.
    pub fn group_key(&self, idx: usize) -> Option<GroupKey> {
        if !self.is_valid(idx) {
            return None;
        }
        match self {
            Column::Int64 { values, .. } => Some(GroupKey::Int(values[idx])),
            Column::Str { values, .. } => Some(GroupKey::Str(values[idx].clone())),
            Column::Float64 { .. } => None,
        }
    }

    // Efficient iteration

    pub fn iter_i64(&self) -> impl Iterator<Item = Option<i64>> + '_ {
        (0..self.len()).map(move |i| self.get_i64(i))
    }

    pub fn iter_f64(&self) -> impl Iterator<Item = Option<f64>> + '_ {
        (0..self.len()).map(move |i| self.get_f64(i))
    }

    pub fn iter_str(&self) -> impl Iterator<Item = Option<&str>> + '_ {
        (0..self.len()).map(move |i| self.get_str(i))
    }

    /// Gathers the given rows, in the given order, into a new column
    pub fn take(&self, rows: &[usize]) -> Column {
        let validity: Vec<bool> = rows.iter().map(|&i| self.is_valid(i)).collect();
        match self {
            Column::Int64 { values, .. } => Column::Int64 {
                values: rows.iter().map(|&i| values[i]).collect(),
                validity,
            },
            Column::Float64 { values, .. } => Column::Float64 {
                values: rows.iter().map(|&i| values[i]).collect(),
                validity,
            },
            Column::Str { values, .. } => Column::Str {
                values: rows.iter().map(|&i| values[i].clone()).collect(),
                validity,
            },
        }
    }
}

impl Serialize for Column {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for i in 0..self.len() {
            match self {
                Column::Int64 { .. } => seq.serialize_element(&self.get_i64(i))?,
                Column::Float64 { .. } => seq.serialize_element(&self.get_f64(i))?,
                Column::Str { .. } => seq.serialize_element(&self.get_str(i))?,
            }
        }
        seq.end()
    }
}

fn parse_finite(field: &[u8]) -> Option<f64> {
    fast_float::parse::<f64, _>(field)
        .ok()
        .filter(|v: &f64| v.is_finite())
}

/// Trims ASCII whitespace and one pair of surrounding double quotes
pub(crate) fn clean_field(raw: &[u8]) -> &[u8] {
    let field = raw.trim_ascii();
    if field.len() >= 2 && field[0] == b'"' && field[field.len() - 1] == b'"' {
        &field[1..field.len() - 1]
    } else {
        field
    }
}
