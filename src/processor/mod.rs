use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub mod aggregate;
pub mod column;
pub mod correlate;
pub mod derive;
pub mod filter;
pub mod listings_table;
pub mod rank;
pub mod report;
pub mod schema;
pub mod table_cache;

/// Error type used across the crate
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("UTF8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Schema/parse error: {0}")]
    Parse(String),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),

    #[error("Column '{column}' has {actual} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Column '{column}' must be {expected}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(String),
}

/// A row that violated a precondition, with its district when the table has one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowRef {
    pub row: usize,
    pub district: Option<String>,
}

impl fmt::Display for RowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.district {
            Some(district) => write!(f, "row {} (district {})", self.row, district),
            None => write!(f, "row {}", self.row),
        }
    }
}

/// Precondition failures on input data. Callers stop the pipeline and surface the message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("column '{column}' is missing")]
    MissingColumn { column: String },

    #[error("column '{column}' is not numeric")]
    NonNumeric { column: String },

    #[error("column '{column}' has {count} null value(s), first at {first}")]
    NullValues {
        column: String,
        count: usize,
        first: RowRef,
    },

    #[error("column '{column}' has {count} non-positive value(s), first at {first}")]
    NonPositiveValues {
        column: String,
        count: usize,
        first: RowRef,
    },
}

#[derive(Debug, Default)]
pub struct ParseSummary {
    pub rows_processed: usize,
    pub errors: Vec<ParseError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    /// 1-based line number in the source file (the header is line 1)
    pub row: usize,
    pub column: String,
    pub value: String,
    pub error: Option<String>,
}

/// Value helper for predicates (owned for simplicity)
#[derive(Debug, Clone)]
pub enum Value {
    /// Integer column
    Int(i64),
    /// Float column
    Float(f64),
    /// String column
    Str(String),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Str(_) => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

/// Single-column filter predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterPredicate {
    Equals(Value),
    GreaterThan(Value),
    LessThan(Value),
    /// Inclusive on both ends
    Between(Value, Value),
}

impl FilterPredicate {
    /// Same predicate with numeric operands widened to floats.
    pub(crate) fn to_float(&self) -> Option<FilterPredicate> {
        let f = |v: &Value| v.as_f64().map(Value::Float);
        Some(match self {
            FilterPredicate::Equals(v) => FilterPredicate::Equals(f(v)?),
            FilterPredicate::GreaterThan(v) => FilterPredicate::GreaterThan(f(v)?),
            FilterPredicate::LessThan(v) => FilterPredicate::LessThan(f(v)?),
            FilterPredicate::Between(a, b) => FilterPredicate::Between(f(a)?, f(b)?),
        })
    }
}

/// Aggregate operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateOp {
    /// Arithmetic mean of the non-null values
    #[default]
    Mean,
    /// Sum of the non-null values
    Sum,
    /// Count of the non-null values
    Count,
    /// Minimum value
    Min,
    /// Maximum value
    Max,
}

/// Key of a group in an aggregation.
///
/// Integer keys order numerically, so room counts come out as 1, 2, 10 rather than 1, 10, 2.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupKey {
    Int(i64),
    Str(String),
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Int(v) => write!(f, "{}", v),
            GroupKey::Str(v) => f.write_str(v),
        }
    }
}

impl From<i64> for GroupKey {
    fn from(v: i64) -> Self {
        GroupKey::Int(v)
    }
}

impl From<&str> for GroupKey {
    fn from(v: &str) -> Self {
        GroupKey::Str(v.to_string())
    }
}

impl From<String> for GroupKey {
    fn from(v: String) -> Self {
        GroupKey::Str(v)
    }
}

impl Serialize for GroupKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            GroupKey::Int(v) => serializer.serialize_i64(*v),
            GroupKey::Str(v) => serializer.serialize_str(v),
        }
    }
}

/// Whether a listing is for sale or for rent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NegotiationType {
    #[default]
    Sale,
    Rent,
}

impl NegotiationType {
    /// Value as stored in the dataset
    pub fn as_str(&self) -> &'static str {
        match self {
            NegotiationType::Sale => "sale",
            NegotiationType::Rent => "rent",
        }
    }
}

impl fmt::Display for NegotiationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NegotiationType {
    type Err = ProcessorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sale" => Ok(NegotiationType::Sale),
            "rent" => Ok(NegotiationType::Rent),
            other => Err(ProcessorError::Parse(format!(
                "unknown negotiation type '{}'",
                other
            ))),
        }
    }
}
