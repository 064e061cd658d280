//! Scalar values, rows and row sets.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Text layout used when a timestamp is written to a store.
///
/// Fixed width with microsecond precision, so lexicographic order on the
/// stored text matches chronological order.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// A nullable scalar column value.
///
/// Equality is null-safe (`Null == Null`) and, together with ordering and
/// hashing, total: floats compare by their bit pattern. This lets a `Value`
/// key a [`RowSet`].
#[derive(Debug, Clone)]
pub enum Value {
    /// SQL `NULL`.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer.
    Integer(i64),
    /// Floating point number.
    Float(f64),
    /// Text string.
    Text(String),
    /// Point in time, normalized to UTC.
    Timestamp(DateTime<Utc>),
}

impl Value {
    /// Returns true if this is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the timestamp if this is a `Timestamp` value.
    ///
    /// Text is never parsed here; only store-native timestamps count.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    /// Returns the text if this is a `Text` value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer if this is an `Integer` value.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the boolean if this is a `Bool` value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Rank of the variant, used to order values of different kinds.
    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Integer(_) => 2,
            Value::Float(_) => 3,
            Value::Text(_) => 4,
            Value::Timestamp(_) => 5,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Integer(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Text(s) => s.hash(state),
            Value::Timestamp(ts) => ts.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Timestamp(ts) => write!(f, "{}", format_timestamp(ts)),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(ts: DateTime<Utc>) -> Self {
        Value::Timestamp(ts)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Null, Into::into)
    }
}

/// Formats a timestamp the way it is written to a store.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parses a store-native timestamp or date representation.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.fff]` (space or `T` separator,
/// interpreted as UTC) and bare `YYYY-MM-DD` dates. Anything else is `None`.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Shared `Null` returned for absent columns.
static NULL: Value = Value::Null;

/// One fetched row: lowercase column name to value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    columns: BTreeMap<String, Value>,
}

impl Row {
    /// Creates an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a column, lowercasing its name.
    pub fn insert(&mut self, column: impl AsRef<str>, value: impl Into<Value>) {
        self.columns
            .insert(column.as_ref().to_lowercase(), value.into());
    }

    /// Builder form of [`Row::insert`].
    pub fn with(mut self, column: impl AsRef<str>, value: impl Into<Value>) -> Self {
        self.insert(column, value);
        self
    }

    /// Gets a column value by (case-insensitive) name.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(&column.to_lowercase())
    }

    /// Gets a column value, reading an absent column as `Null`.
    pub fn get_or_null(&self, column: &str) -> &Value {
        self.get(column).unwrap_or(&NULL)
    }

    /// Returns true if the row has the column.
    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains_key(&column.to_lowercase())
    }

    /// Iterates over columns in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterates over column names in order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (column, value) in iter {
            row.insert(column, value);
        }
        row
    }
}

/// All rows of one table from one store, keyed by primary-key value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    rows: BTreeMap<Value, Row>,
}

impl RowSet {
    /// Creates an empty row set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes rows by the given primary-key column.
    ///
    /// A row lacking the column is keyed by `Null`; duplicates keep the
    /// last row seen.
    pub fn from_rows(rows: impl IntoIterator<Item = Row>, primary_key: &str) -> Self {
        let mut set = RowSet::new();
        for row in rows {
            let key = row.get_or_null(primary_key).clone();
            set.rows.insert(key, row);
        }
        set
    }

    /// Inserts a row under an explicit key.
    pub fn insert(&mut self, key: impl Into<Value>, row: Row) {
        self.rows.insert(key.into(), row);
    }

    /// Looks up a row by key.
    pub fn get(&self, key: &Value) -> Option<&Row> {
        self.rows.get(key)
    }

    /// Iterates over keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.rows.keys()
    }

    /// Iterates over `(key, row)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Row)> {
        self.rows.iter()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;

    #[test]
    fn null_safe_equality() {
        assert_eq!(Value::Null, Value::Null);
        assert_ne!(Value::Null, Value::Text(String::new()));
        assert_ne!(Value::Integer(1), Value::Float(1.0));
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
    }

    #[test]
    fn values_hash_consistently_with_eq() {
        let mut set = HashSet::new();
        set.insert(Value::Integer(7));
        set.insert(Value::Integer(7));
        set.insert(Value::Text("7".into()));
        set.insert(Value::Float(0.5));
        set.insert(Value::Float(0.5));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn ordering_groups_by_kind() {
        let mut values = vec![
            Value::Text("a".into()),
            Value::Integer(3),
            Value::Null,
            Value::Integer(-1),
            Value::Bool(true),
        ];
        values.sort();
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Bool(true),
                Value::Integer(-1),
                Value::Integer(3),
                Value::Text("a".into()),
            ]
        );
    }

    #[test]
    fn parse_store_timestamps() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-03-01 12:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T12:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T12:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01 12:30:00.000000"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-03-01"),
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn formatted_timestamps_parse_back() {
        let ts = Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(parse_timestamp(&format_timestamp(&ts)), Some(ts));
    }

    #[test]
    fn row_lowercases_column_names() {
        let row = Row::new().with("Email", "a@b").with("ID", 1);
        assert_eq!(row.get("email"), Some(&Value::Text("a@b".into())));
        assert_eq!(row.get("EMAIL"), Some(&Value::Text("a@b".into())));
        assert_eq!(row.column_names().collect::<Vec<_>>(), vec!["email", "id"]);
        assert!(row.get_or_null("missing").is_null());
    }

    #[test]
    fn row_set_indexes_by_primary_key() {
        let rows = vec![
            Row::new().with("id", 2).with("name", "Bob"),
            Row::new().with("id", 1).with("name", "Alice"),
            Row::new().with("name", "nobody"),
        ];
        let set = RowSet::from_rows(rows, "ID");
        assert_eq!(set.len(), 3);
        assert_eq!(
            set.keys().cloned().collect::<Vec<_>>(),
            vec![Value::Null, Value::Integer(1), Value::Integer(2)]
        );
        assert_eq!(
            set.get(&Value::Integer(1)).unwrap().get("name"),
            Some(&Value::Text("Alice".into()))
        );
    }
}
