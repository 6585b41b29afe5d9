//! Statement parameters and LIKE-pattern helpers.
//!
//! [`Params`] is what the connection wrapper binds: nothing, an ordered list
//! of positional values, or named values whose keys carry the SQLite marker
//! (`$name`, `@name` or `:name`). [`to_query_param`] turns a plain mapping
//! into named parameters and [`escape_like`] makes user text safe inside a
//! `LIKE ... ESCAPE '/'` pattern.

use thiserror::Error;

use crate::Value;

/// Prefixes SQLite accepts for named parameters.
pub const PARAMETER_MARKERS: [char; 3] = ['$', '@', ':'];

/// Escape character used by [`escape_like`]; pair it with `ESCAPE '/'`.
pub const LIKE_ESCAPE: char = '/';

/// Invalid named-parameter keys.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParameterError {
    /// Key does not start with `$`, `@` or `:`.
    #[error("parameter '{0}' must start with one of '$', '@', ':'")]
    MissingMarker(String),
    /// Key is only a marker.
    #[error("parameter '{0}' has no name after its marker")]
    EmptyName(String),
}

/// Values bound to a statement.
///
/// # Examples
///
/// ```
/// use sqlmigrate_core::{Params, Value};
///
/// let positional = Params::positional(["t"]);
/// assert_eq!(positional.len(), 1);
///
/// let named = Params::named([("$id", Value::Integer(1))]).unwrap();
/// assert!(matches!(named, Params::Named(_)));
///
/// assert!(Params::named([("id", Value::Integer(1))]).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Params {
    /// No parameters.
    #[default]
    None,
    /// Values bound to `?`/`?N` in order.
    Positional(Vec<Value>),
    /// Values bound by marker-prefixed name.
    Named(Vec<(String, Value)>),
}

impl Params {
    /// Positional parameters from any sequence of scalars.
    pub fn positional<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Params::Positional(values.into_iter().map(Into::into).collect())
    }

    /// Named parameters; every key must already carry its marker.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError`] for the first key without a marker or
    /// without a name.
    pub fn named<I, K, V>(entries: I) -> Result<Self, ParameterError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut named = Vec::new();
        for (key, value) in entries {
            let key = key.into();
            validate_parameter_name(&key)?;
            named.push((key, value.into()));
        }
        Ok(Params::Named(named))
    }

    pub fn len(&self) -> usize {
        match self {
            Params::None => 0,
            Params::Positional(values) => values.len(),
            Params::Named(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<()> for Params {
    fn from(_: ()) -> Self {
        Params::None
    }
}

impl From<Vec<Value>> for Params {
    fn from(values: Vec<Value>) -> Self {
        Params::Positional(values)
    }
}

impl<V: Into<Value>, const N: usize> From<[V; N]> for Params {
    fn from(values: [V; N]) -> Self {
        Params::positional(values)
    }
}

/// Checks that a named-parameter key is `<marker><name>`.
pub fn validate_parameter_name(key: &str) -> Result<(), ParameterError> {
    let mut chars = key.chars();
    match chars.next() {
        Some(marker) if PARAMETER_MARKERS.contains(&marker) => {
            if chars.as_str().is_empty() {
                Err(ParameterError::EmptyName(key.to_string()))
            } else {
                Ok(())
            }
        }
        _ => Err(ParameterError::MissingMarker(key.to_string())),
    }
}

/// Rewrites every key of a plain mapping to `$key`.
///
/// Keys are prefixed unconditionally and entry order is kept.
///
/// # Examples
///
/// ```
/// use sqlmigrate_core::{Params, Value, to_query_param};
///
/// let params = to_query_param([("id", Value::Integer(0)), ("name", Value::from("x"))]);
/// assert_eq!(
///     params,
///     Params::Named(vec![
///         ("$id".into(), Value::Integer(0)),
///         ("$name".into(), Value::from("x")),
///     ])
/// );
/// ```
pub fn to_query_param<I, K, V>(entries: I) -> Params
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<Value>,
{
    Params::Named(
        entries
            .into_iter()
            .map(|(key, value)| (format!("${}", key.as_ref()), value.into()))
            .collect(),
    )
}

/// Escapes `/`, `%` and `_` for use inside a `LIKE` pattern with
/// `ESCAPE '/'`.
///
/// `/` is doubled first so the escape markers added for `%` and `_` are
/// never escaped again.
///
/// # Examples
///
/// ```
/// use sqlmigrate_core::escape_like;
///
/// assert_eq!(escape_like("/"), "//");
/// assert_eq!(escape_like("50%_off"), "50/%/_off");
/// ```
pub fn escape_like(text: &str) -> String {
    text.replace(LIKE_ESCAPE, "//")
        .replace('%', "/%")
        .replace('_', "/_")
}
