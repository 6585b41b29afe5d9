//! Conversion between [`sqlmigrate_core`] values and `rusqlite` values.
//!
//! Parameters are always bound by index: named entries are resolved to
//! their slot with `parameter_index`, and slots no entry names stay `NULL`.

use rusqlite::Statement;
use rusqlite::types::{Value as SqlValue, ValueRef};
use sqlmigrate_core::{Params, Row, Value};

/// Converts a core value to its owned `rusqlite` form.
pub(crate) fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(v) => SqlValue::Integer(*v),
        Value::Real(v) => SqlValue::Real(*v),
        Value::Text(v) => SqlValue::Text(v.clone()),
        Value::Blob(v) => SqlValue::Blob(v.clone()),
    }
}

/// Converts a borrowed column value into a core value.
///
/// Text that is not valid UTF-8 is decoded lossily.
pub(crate) fn from_value_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Integer(v),
        ValueRef::Real(v) => Value::Real(v),
        ValueRef::Text(v) => Value::Text(String::from_utf8_lossy(v).into_owned()),
        ValueRef::Blob(v) => Value::Blob(v.to_vec()),
    }
}

/// Produces the values to bind for `stmt`, one per parameter slot.
///
/// # Errors
///
/// Returns [`rusqlite::Error::InvalidParameterName`] when a named entry
/// does not occur in the statement.
pub(crate) fn bind_values(
    stmt: &Statement<'_>,
    params: &Params,
) -> rusqlite::Result<Vec<SqlValue>> {
    match params {
        Params::None => Ok(vec![SqlValue::Null; stmt.parameter_count()]),
        Params::Positional(values) => Ok(values.iter().map(to_sql_value).collect()),
        Params::Named(entries) => {
            let mut slots = vec![SqlValue::Null; stmt.parameter_count()];
            for (name, value) in entries {
                let index = stmt
                    .parameter_index(name)?
                    .ok_or_else(|| rusqlite::Error::InvalidParameterName(name.clone()))?;
                slots[index - 1] = to_sql_value(value);
            }
            Ok(slots)
        }
    }
}

/// Reads every column of `row` into a [`Row`] keyed by `columns`.
pub(crate) fn read_row(row: &rusqlite::Row<'_>, columns: &[String]) -> rusqlite::Result<Row> {
    let mut out = Row::new();
    for (index, column) in columns.iter().enumerate() {
        out.push(column.as_str(), from_value_ref(row.get_ref(index)?));
    }
    Ok(out)
}

/// Owned column names of a prepared statement.
pub(crate) fn column_names(stmt: &Statement<'_>) -> Vec<String> {
    stmt.column_names().into_iter().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_value_conversion_preserves_zero_and_empty() {
        assert_eq!(to_sql_value(&Value::Integer(0)), SqlValue::Integer(0));
        assert_eq!(
            to_sql_value(&Value::Text(String::new())),
            SqlValue::Text(String::new())
        );
        assert_eq!(to_sql_value(&Value::Null), SqlValue::Null);
    }

    #[test]
    fn test_from_value_ref() {
        assert_eq!(from_value_ref(ValueRef::Integer(7)), Value::Integer(7));
        assert_eq!(from_value_ref(ValueRef::Text(b"hi")), Value::from("hi"));
        assert_eq!(from_value_ref(ValueRef::Blob(&[1, 2])), Value::Blob(vec![1, 2]));
        assert_eq!(from_value_ref(ValueRef::Null), Value::Null);
    }

    #[test]
    fn test_named_params_resolve_to_slots() {
        let conn = Connection::open_in_memory().unwrap();
        let stmt = conn.prepare("SELECT $b, $a, $c").unwrap();
        let params = Params::Named(vec![
            ("$a".into(), Value::Integer(1)),
            ("$b".into(), Value::Integer(2)),
        ]);
        let values = bind_values(&stmt, &params).unwrap();
        assert_eq!(
            values,
            vec![SqlValue::Integer(2), SqlValue::Integer(1), SqlValue::Null]
        );
    }

    #[test]
    fn test_unknown_named_param_is_an_error() {
        let conn = Connection::open_in_memory().unwrap();
        let stmt = conn.prepare("SELECT $a").unwrap();
        let params = Params::Named(vec![("$missing".into(), Value::Null)]);
        assert!(matches!(
            bind_values(&stmt, &params),
            Err(rusqlite::Error::InvalidParameterName(name)) if name == "$missing"
        ));
    }

    #[test]
    fn test_read_row_keeps_column_order() {
        let conn = Connection::open_in_memory().unwrap();
        let mut stmt = conn.prepare("SELECT 2 AS z, 'x' AS a, NULL AS n").unwrap();
        let columns = column_names(&stmt);
        let row = stmt
            .query_row([], |row| read_row(row, &columns))
            .unwrap();
        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["z", "a", "n"]);
        assert_eq!(row.get("a"), Some(&Value::from("x")));
        assert_eq!(row.get("n"), Some(&Value::Null));
    }
}
