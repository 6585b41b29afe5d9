//! `PRAGMA` statement rendering.
//!
//! Pragmas cannot be bound as parameters, so the name is validated and the
//! value is rendered as a SQL literal before interpolation.

use sqlmigrate_core::Value;

use crate::error::{Result, SqliteError};

fn is_identifier(part: &str) -> bool {
    let mut chars = part.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Checks `name` is `pragma` or `schema.pragma` made of identifier
/// characters.
pub(crate) fn validate_pragma_name(name: &str) -> Result<()> {
    let valid = match name.split_once('.') {
        Some((schema, pragma)) => is_identifier(schema) && is_identifier(pragma),
        None => is_identifier(name),
    };
    if valid {
        Ok(())
    } else {
        Err(SqliteError::InvalidPragma(format!(
            "'{name}' is not a valid pragma name"
        )))
    }
}

/// Renders `value` as a SQL literal.
pub(crate) fn render_literal(value: &Value) -> Result<String> {
    match value {
        Value::Null => Ok("NULL".to_string()),
        Value::Integer(v) => Ok(v.to_string()),
        Value::Real(v) if v.is_finite() => Ok(v.to_string()),
        Value::Real(v) => Err(SqliteError::InvalidPragma(format!(
            "non-finite value {v}"
        ))),
        Value::Text(v) => Ok(format!("'{}'", v.replace('\'', "''"))),
        Value::Blob(bytes) => {
            let hex: String = bytes.iter().map(|b| format!("{b:02X}")).collect();
            Ok(format!("X'{hex}'"))
        }
    }
}

/// Builds the read form `PRAGMA name` or the write form
/// `PRAGMA name = literal`.
///
/// A present value is always written, including `0` and `''`.
pub(crate) fn pragma_sql(name: &str, value: Option<&Value>) -> Result<String> {
    validate_pragma_name(name)?;
    match value {
        Some(value) => Ok(format!("PRAGMA {name} = {}", render_literal(value)?)),
        None => Ok(format!("PRAGMA {name}")),
    }
}
