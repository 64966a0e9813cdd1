//! Type definitions for grid records and export rows

use indexmap::IndexMap;
use std::fmt;

/// One raw model instance, keyed by field name
pub type SourceRecord = IndexMap<String, Value>;

/// Resolved output columns: key to display label, in output order
pub type Headings = IndexMap<String, String>;

/// A field value inside a source record
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Value {
    /// Absent or null field
    #[default]
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Float value
    Float(f64),
    /// String value, possibly containing markup
    String(String),
    /// Ordered list of values
    List(Vec<Value>),
    /// Nested mapping (relations, JSON columns)
    Map(IndexMap<String, Value>),
}

impl Value {
    /// Render a scalar as cell text.
    ///
    /// Returns `None` for null, `false`, and nested values, which all export
    /// as empty cells.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Bool(true) => Some("1".to_string()),
            Value::Bool(false) => None,
            Value::Int(i) => Some(itoa::Buffer::new().format(*i).to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::String(s) => Some(s.clone()),
            Value::List(_) | Value::Map(_) => None,
        }
    }

    /// Look up one path segment: a key for maps, a decimal index for lists
    pub fn get(&self, segment: &str) -> Option<&Value> {
        match self {
            Value::Map(map) => map.get(segment),
            Value::List(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    /// Check if value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_text().unwrap_or_default())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(map: IndexMap<String, Value>) -> Self {
        Value::Map(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Value::Map(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Build a [`SourceRecord`] from key/value pairs
pub fn record<K, V, I>(fields: I) -> SourceRecord
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    fields
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// A visible grid column: field key (possibly a dotted path) and label
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ColumnSpec {
    /// Field key, e.g. `name` or `profile.address.city`
    pub key: String,
    /// Display label used as the heading
    pub label: String,
}

impl ColumnSpec {
    /// Create a new column spec
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        ColumnSpec {
            key: key.into(),
            label: label.into(),
        }
    }
}

/// One exported row: sanitized values keyed by column label
///
/// Entries are kept in column order. Duplicate labels keep separate entries,
/// so the entry count always equals the resolved column count.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutputRow {
    cells: Vec<(String, String)>,
}

impl OutputRow {
    /// Create an empty row with room for `columns` cells
    pub fn with_capacity(columns: usize) -> Self {
        OutputRow {
            cells: Vec::with_capacity(columns),
        }
    }

    /// Append a cell
    pub fn push(&mut self, label: impl Into<String>, value: impl Into<String>) {
        self.cells.push((label.into(), value.into()));
    }

    /// Get the first value stored under `label`
    pub fn get(&self, label: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v.as_str())
    }

    /// Labels in column order
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(l, _)| l.as_str())
    }

    /// Values in column order
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(_, v)| v.as_str())
    }

    /// Iterate `(label, value)` pairs in column order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cells.iter().map(|(l, v)| (l.as_str(), v.as_str()))
    }

    /// Get number of cells
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Check if row has no cells
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<L: Into<String>, V: Into<String>> FromIterator<(L, V)> for OutputRow {
    fn from_iter<I: IntoIterator<Item = (L, V)>>(iter: I) -> Self {
        OutputRow {
            cells: iter
                .into_iter()
                .map(|(l, v)| (l.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_to_text() {
        assert_eq!(Value::Int(42).to_text().as_deref(), Some("42"));
        assert_eq!(Value::Float(1.5).to_text().as_deref(), Some("1.5"));
        assert_eq!(Value::Float(2.0).to_text().as_deref(), Some("2"));
        assert_eq!(Value::Bool(true).to_text().as_deref(), Some("1"));
        assert_eq!(Value::Bool(false).to_text(), None);
        assert_eq!(Value::Null.to_text(), None);
        assert_eq!(Value::from(vec![Value::Int(1)]).to_text(), None);
    }

    #[test]
    fn test_value_get_segment() {
        let v: Value = [("city", "NYC")].into_iter().collect();
        assert_eq!(v.get("city"), Some(&Value::from("NYC")));
        assert_eq!(v.get("zip"), None);

        let list = Value::from(vec![Value::from("a"), Value::from("b")]);
        assert_eq!(list.get("1"), Some(&Value::from("b")));
        assert_eq!(list.get("x"), None);
        assert_eq!(Value::from("scalar").get("0"), None);
    }

    #[test]
    fn test_output_row_keeps_duplicate_labels() {
        let mut row = OutputRow::with_capacity(2);
        row.push("Name", "Ann");
        row.push("Name", "Smith");

        assert_eq!(row.len(), 2);
        assert_eq!(row.get("Name"), Some("Ann"));
        assert_eq!(row.values().collect::<Vec<_>>(), vec!["Ann", "Smith"]);
    }
}
