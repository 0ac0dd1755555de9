//! Cell values and column kinds

use serde::{Deserialize, Serialize, Serializer};

/// A single scalar cell.
///
/// `Missing` and `NotATime` are the sentinel "no data" markers produced by the
/// loader. Together with non-finite floats they are unified into [`Value::Null`]
/// during normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Canonical null
    Null,
    /// Missing-value marker (empty cell, `NaN`, `NULL`, ...)
    Missing,
    /// Not-a-time marker in a timestamp or date column
    NotATime,
    Bool(bool),
    Integer(i64),
    /// May hold `inf`/`-inf` before normalization
    Float(f64),
    Text(String),
}

impl Value {
    /// Create a text value
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    /// True only for the canonical null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True for any "no data" marker that is not yet the canonical null
    pub fn is_sentinel(&self) -> bool {
        match self {
            Value::Missing | Value::NotATime => true,
            Value::Float(f) => !f.is_finite(),
            _ => false,
        }
    }

    /// True for the canonical null or any sentinel
    pub fn is_absent(&self) -> bool {
        self.is_null() || self.is_sentinel()
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null | Value::Missing | Value::NotATime => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Float(f) if f.is_finite() => serializer.serialize_f64(*f),
            Value::Float(_) => serializer.serialize_none(),
            Value::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Missing => write!(f, "<missing>"),
            Value::NotATime => write!(f, "NaT"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Semantic type of a column, decided once when the table is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    /// Free text
    Text,
    Integer,
    Float,
    Boolean,
    /// Timestamp text, subject to the minimum-length filter
    Timestamp,
    /// Date-only text, reformatted to `YYYY-MM-DD`
    Date,
    /// Row identifier, backfilled with a UUID when missing
    Identifier,
}

impl ColumnKind {
    /// Whether the normalizer treats cells in this column as strings
    pub fn is_textual(self) -> bool {
        matches!(
            self,
            ColumnKind::Text | ColumnKind::Timestamp | ColumnKind::Date | ColumnKind::Identifier
        )
    }

    /// Whether `NaT` is read as a not-a-time marker in this column
    pub fn is_temporal(self) -> bool {
        matches!(self, ColumnKind::Timestamp | ColumnKind::Date)
    }
}

impl std::fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnKind::Text => write!(f, "text"),
            ColumnKind::Integer => write!(f, "integer"),
            ColumnKind::Float => write!(f, "float"),
            ColumnKind::Boolean => write!(f, "boolean"),
            ColumnKind::Timestamp => write!(f, "timestamp"),
            ColumnKind::Date => write!(f, "date"),
            ColumnKind::Identifier => write!(f, "identifier"),
        }
    }
}
