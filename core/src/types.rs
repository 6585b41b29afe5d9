//! Value, row and migration descriptor definitions.
//!
//! These are the driver-independent shapes exchanged with the connection
//! wrapper: scalars bound as parameters or read back from result columns,
//! rows as ordered column-to-value mappings, and the versioned statement
//! groups applied by the migrator.

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Pragma holding the persisted schema version.
pub const USER_VERSION_PRAGMA: &str = "user_version";

/// When the connection wrapper reports executed statements to its sink.
///
/// # Examples
///
/// ```
/// use sqlmigrate_core::TraceMode;
///
/// let mode: TraceMode = serde_json::from_str("\"finish\"").unwrap();
/// assert_eq!(mode, TraceMode::Finish);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceMode {
    /// Report each statement before it runs.
    Run,
    /// Report each statement after it finishes, with its duration.
    Finish,
}

/// A single SQL scalar.
///
/// Serializes untagged, so JSON `1` is an [`Integer`](Value::Integer),
/// `1.5` a [`Real`](Value::Real), `"x"` a [`Text`](Value::Text) and `null`
/// [`Null`](Value::Null).
///
/// # Examples
///
/// ```
/// use sqlmigrate_core::Value;
///
/// assert_eq!(Value::from(0), Value::Integer(0));
/// assert_eq!(Value::from(""), Value::Text(String::new()));
/// assert_eq!(Value::from(None::<i64>), Value::Null);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    /// SQL `NULL`.
    #[default]
    Null,
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit float.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Blob(Vec<u8>),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the integer payload, if any.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as a float; integers are widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Real(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the text payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the blob payload, if any.
    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Value::Blob(v) => Some(v),
            _ => None,
        }
    }

    /// SQLite storage class name of the value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
            Value::Blob(_) => "blob",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Real(v) => write!(f, "{v}"),
            Value::Text(v) => f.write_str(v),
            Value::Blob(v) => write!(f, "<blob {} bytes>", v.len()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// One result row: column names mapped to values, in column order.
///
/// A row behaves like a mapping: pushing a column name that already exists
/// replaces its value in place. An empty `Row` (a statement returning a row
/// with no columns) is distinct from the absence of a row, which the
/// connection wrapper reports as `None`.
///
/// # Examples
///
/// ```
/// use sqlmigrate_core::{Row, Value};
///
/// let mut row = Row::new();
/// row.push("id", Value::Integer(1));
/// row.push("name", Value::from("alice"));
///
/// assert_eq!(row.get("id"), Some(&Value::Integer(1)));
/// assert_eq!(row.columns().collect::<Vec<_>>(), vec!["id", "name"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    /// Creates an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column, or replaces the value of an existing one.
    pub fn push(&mut self, column: impl Into<String>, value: Value) {
        let column = column.into();
        match self.columns.iter().position(|c| *c == column) {
            Some(index) => self.values[index] = value,
            None => {
                self.columns.push(column);
                self.values.push(value);
            }
        }
    }

    /// Looks up a value by column name.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|index| &self.values[index])
    }

    /// Looks up a value by column position.
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Column names in order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(String::as_str)
    }

    /// Values in column order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// `(column, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(String::as_str).zip(self.values.iter())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (column, value) in iter {
            row.push(column, value);
        }
        row
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// A versioned group of statements applied as one migration step.
///
/// Versions are positive integers; the migrator applies every descriptor
/// whose version is greater than the database's persisted `user_version`
/// and stamps the descriptor's version as part of the same batch.
///
/// # Examples
///
/// ```
/// use sqlmigrate_core::MigrationDescriptor;
///
/// let m = MigrationDescriptor::new(2)
///     .with_name("add_email")
///     .with_statement("ALTER TABLE users ADD COLUMN email TEXT");
///
/// assert_eq!(
///     m.batch_sql(),
///     "ALTER TABLE users ADD COLUMN email TEXT;\nPRAGMA user_version = 2;"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationDescriptor {
    /// Version stamped into `user_version` once applied.
    pub version: u32,
    /// Optional label used in logs and status output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Statements executed in order.
    #[serde(default)]
    pub statements: Vec<String>,
}

impl MigrationDescriptor {
    /// Creates a descriptor with no statements.
    pub fn new(version: u32) -> Self {
        Self {
            version,
            name: None,
            statements: Vec::new(),
        }
    }

    /// Builder method to set the label.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builder method to append one statement.
    pub fn with_statement(mut self, sql: impl Into<String>) -> Self {
        self.statements.push(sql.into());
        self
    }

    /// Builder method to append several statements.
    pub fn with_statements<I, S>(mut self, statements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.statements.extend(statements.into_iter().map(Into::into));
        self
    }

    /// Label for logs: the name when present, otherwise `v<version>`.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("v{} ({name})", self.version),
            None => format!("v{}", self.version),
        }
    }

    /// `true` when a statement opens its own transaction with `BEGIN`.
    ///
    /// Such a batch cannot be nested inside another transaction. Leading
    /// `--` comment lines are skipped; `BEGIN` inside a `CREATE TRIGGER`
    /// body does not count.
    pub fn manages_transaction(&self) -> bool {
        self.statements
            .iter()
            .flat_map(|s| s.split(';'))
            .any(|fragment| {
                let code = fragment
                    .lines()
                    .map(str::trim)
                    .find(|line| !line.is_empty() && !line.starts_with("--"))
                    .unwrap_or_default();
                code.split_whitespace()
                    .next()
                    .is_some_and(|word| word.eq_ignore_ascii_case("BEGIN"))
            })
    }

    /// Builds the batch executed for this descriptor.
    ///
    /// Statements are joined with `;` and a newline, then followed by the
    /// `user_version` bump on its own line, so a statement ending in a `--`
    /// comment cannot swallow the next one. Trailing semicolons and blank
    /// statements are dropped so the batch never contains empty statements.
    pub fn batch_sql(&self) -> String {
        let mut parts: Vec<&str> = self
            .statements
            .iter()
            .map(|s| s.trim().trim_end_matches(';').trim_end())
            .filter(|s| !s.is_empty())
            .collect();
        let bump = format!("PRAGMA {USER_VERSION_PRAGMA} = {}", self.version);
        parts.push(&bump);
        let mut sql = parts.join(";\n");
        sql.push(';');
        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_untagged_json() {
        let values: Vec<Value> = serde_json::from_str(r#"[null, 1, 1.5, "x"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Integer(1),
                Value::Real(1.5),
                Value::Text("x".into())
            ]
        );
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(Value::Integer(3).as_i64(), Some(3));
        assert_eq!(Value::Integer(3).as_f64(), Some(3.0));
        assert_eq!(Value::Text("a".into()).as_i64(), None);
        assert_eq!(Value::from("a").as_str(), Some("a"));
        assert_eq!(Value::from(vec![1u8, 2]).as_blob(), Some(&[1u8, 2][..]));
        assert!(Value::from(None::<&str>).is_null());
        assert_eq!(Value::from(true), Value::Integer(1));
    }

    #[test]
    fn test_row_push_replaces_existing_column() {
        let mut row = Row::new();
        row.push("a", Value::Integer(1));
        row.push("b", Value::Integer(2));
        row.push("a", Value::Integer(3));

        assert_eq!(row.len(), 2);
        assert_eq!(row.get("a"), Some(&Value::Integer(3)));
        assert_eq!(row.get_index(1), Some(&Value::Integer(2)));
        assert_eq!(row.get("missing"), None);
    }

    #[test]
    fn test_row_serializes_as_ordered_map() {
        let row: Row = [("z", Value::Integer(1)), ("a", Value::from("x"))]
            .into_iter()
            .collect();
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"z":1,"a":"x"}"#);
    }

    #[test]
    fn test_empty_row_is_empty() {
        let row = Row::new();
        assert!(row.is_empty());
        assert_eq!(serde_json::to_string(&row).unwrap(), "{}");
    }

    #[test]
    fn test_batch_sql_joins_and_bumps_version() {
        let m = MigrationDescriptor::new(1).with_statements([
            "CREATE TABLE a (id INTEGER);",
            "  ",
            "CREATE TABLE b (id INTEGER)",
        ]);
        assert_eq!(
            m.batch_sql(),
            "CREATE TABLE a (id INTEGER);\nCREATE TABLE b (id INTEGER);\nPRAGMA user_version = 1;"
        );
    }

    #[test]
    fn test_batch_sql_keeps_bump_off_trailing_comment() {
        let m = MigrationDescriptor::new(1)
            .with_statement("CREATE TABLE a (id INTEGER);\n-- add indexes later\n");
        let sql = m.batch_sql();
        assert_eq!(sql.lines().last(), Some("PRAGMA user_version = 1;"));
        assert!(sql.contains("-- add indexes later;\n"));
    }

    #[test]
    fn test_manages_transaction() {
        let own = MigrationDescriptor::new(1).with_statement(
            "-- move rows\nBEGIN;\nINSERT INTO b SELECT * FROM a;\nCOMMIT;",
        );
        assert!(own.manages_transaction());
        assert!(MigrationDescriptor::new(1)
            .with_statement("begin immediate")
            .manages_transaction());

        let trigger = MigrationDescriptor::new(2).with_statement(
            "CREATE TRIGGER t AFTER INSERT ON a BEGIN UPDATE a SET n = 1; END;",
        );
        assert!(!trigger.manages_transaction());
        assert!(!MigrationDescriptor::new(3)
            .with_statement("CREATE TABLE beginnings (id INTEGER)")
            .manages_transaction());
    }

    #[test]
    fn test_batch_sql_without_statements_only_bumps() {
        assert_eq!(
            MigrationDescriptor::new(7).batch_sql(),
            "PRAGMA user_version = 7;"
        );
    }

    #[test]
    fn test_descriptor_deserializes_without_name() {
        let m: MigrationDescriptor =
            serde_json::from_str(r#"{"version": 3, "statements": ["SELECT 1"]}"#).unwrap();
        assert_eq!(m.version, 3);
        assert!(m.name.is_none());
        assert_eq!(m.label(), "v3");
    }
}
