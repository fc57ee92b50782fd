//! Values written into cells

use std::fmt;

use indexmap::IndexMap;
use serde::Deserialize;

/// One input row: column letters mapped to the value written into that column.
///
/// Iteration order is insertion order, which is also the order in which
/// cells are touched.
pub type Record = IndexMap<String, CellValue>;

/// A value written into a cell
///
/// Deserializes from a bare JSON number or string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    /// Integer literal
    Integer(i64),
    /// Floating-point literal
    Number(f64),
    /// Any other text
    Text(String),
}

impl CellValue {
    /// Create a text value
    pub fn text<S: Into<String>>(s: S) -> Self {
        CellValue::Text(s.into())
    }

    /// Whether the value is written as a numeric cell
    pub fn is_numeric(&self) -> bool {
        match self {
            CellValue::Integer(_) => true,
            CellValue::Number(n) => n.is_finite(),
            CellValue::Text(_) => false,
        }
    }

    /// The `t` attribute written for this value
    pub fn cell_type(&self) -> &'static str {
        if self.is_numeric() {
            "n"
        } else {
            "str"
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Integer(i) => write!(f, "{}", i),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Integer(value)
    }
}

impl From<i32> for CellValue {
    fn from(value: i32) -> Self {
        CellValue::Integer(value.into())
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}
