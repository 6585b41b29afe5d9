//! Asynchronous connection wrapper.
//!
//! [`Database`] owns at most one `tokio-rusqlite` connection. Every
//! operation is sent to the connection's executor thread and resolves
//! exactly once; the calling task is parked, never blocked.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::LoadExtensionGuard;
use sqlmigrate_core::{Params, Row, TraceMode, Value};
use tracing::{debug, warn};

use crate::error::{Result, SqliteError};
use crate::log::{LogEvent, LogSink, Tracer, TracingSink, engine_profile, engine_trace};
use crate::scope::{PreparedStatement, RunResult, Scope};

pub use rusqlite::OpenFlags;

/// Target naming a private in-memory database.
pub const MEMORY: &str = ":memory:";

/// Flags used by [`Database::open_default`].
pub fn default_open_flags() -> OpenFlags {
    OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX
        | OpenFlags::SQLITE_OPEN_URI
}

/// Tracing behavior of a [`Database`].
#[derive(Clone)]
pub struct ConnectionOptions {
    /// Forward the engine's trace and profile hooks to `tracing`.
    pub verbose: bool,
    /// Report each statement to the sink before it runs or after it finishes.
    pub trace: Option<TraceMode>,
    /// Receiver of statement and error events.
    pub sink: Arc<dyn LogSink>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            verbose: false,
            trace: None,
            sink: Arc::new(TracingSink),
        }
    }
}

impl fmt::Debug for ConnectionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionOptions")
            .field("verbose", &self.verbose)
            .field("trace", &self.trace)
            .finish_non_exhaustive()
    }
}

impl ConnectionOptions {
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_trace(mut self, trace: Option<TraceMode>) -> Self {
        self.trace = trace;
        self
    }

    pub fn with_sink(mut self, sink: impl LogSink + 'static) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    pub fn with_shared_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }
}

/// A database target plus the connection opened on it, if any.
///
/// Operations other than [`open`](Self::open) and [`prepare`](Self::prepare)
/// fail with [`SqliteError::NotOpen`] while no connection is held.
///
/// # Examples
///
/// ```
/// use sqlmigrate_sqlite::{Database, Value};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> sqlmigrate_sqlite::Result<()> {
/// let mut db = Database::in_memory();
/// db.open_default().await?;
///
/// db.exec("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)").await?;
/// let result = db.run("INSERT INTO t (name) VALUES (?)", ["a"]).await?;
/// assert_eq!(result.last_insert_id, 1);
///
/// let row = db.get("SELECT name FROM t", ()).await?.unwrap();
/// assert_eq!(row.get("name"), Some(&Value::from("a")));
///
/// db.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct Database {
    filename: String,
    options: ConnectionOptions,
    tracer: Tracer,
    conn: Option<tokio_rusqlite::Connection>,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("filename", &self.filename)
            .field("options", &self.options)
            .field("open", &self.is_open())
            .finish()
    }
}

impl Database {
    /// Creates a closed wrapper for `filename`.
    ///
    /// `filename` is a path, `""` for an anonymous on-disk database, or
    /// [`MEMORY`].
    pub fn new(filename: impl Into<String>) -> Self {
        Self::with_options(filename, ConnectionOptions::default())
    }

    pub fn with_options(filename: impl Into<String>, options: ConnectionOptions) -> Self {
        let tracer = Tracer::new(options.trace, Arc::clone(&options.sink));
        Self {
            filename: filename.into(),
            options,
            tracer,
            conn: None,
        }
    }

    /// Creates a closed wrapper for a private in-memory database.
    pub fn in_memory() -> Self {
        Self::new(MEMORY)
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// `true` iff the target is exactly [`MEMORY`].
    pub fn is_in_memory(&self) -> bool {
        self.filename == MEMORY
    }

    /// Final path segment of the target.
    pub fn name(&self) -> String {
        Path::new(&self.filename)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.filename.clone())
    }

    /// Opens the target with `flags`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::AlreadyOpen`] when a connection is already
    /// held, or [`SqliteError::DatabaseError`] when the engine refuses the
    /// target.
    pub async fn open(&mut self, flags: OpenFlags) -> Result<()> {
        if self.conn.is_some() {
            return Err(SqliteError::AlreadyOpen(self.filename.clone()));
        }

        let conn = match tokio_rusqlite::Connection::open_with_flags(&self.filename, flags).await
        {
            Ok(conn) => conn,
            Err(e) => {
                let err = SqliteError::from(e);
                self.tracer
                    .report(LogEvent::error("open", Some(&self.filename), &err));
                return Err(err);
            }
        };

        if self.options.verbose {
            conn.call(|c| {
                c.trace(Some(engine_trace as fn(&str)));
                c.profile(Some(engine_profile as fn(&str, std::time::Duration)));
                Ok(())
            })
            .await?;
        }

        debug!(database = %self.filename, "database opened");
        self.conn = Some(conn);
        Ok(())
    }

    /// Opens the target with [`default_open_flags`].
    pub async fn open_default(&mut self) -> Result<()> {
        self.open(default_open_flags()).await
    }

    /// Releases the connection.
    ///
    /// On failure the connection is kept so the close can be retried.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::NotOpen`] when no connection is held.
    pub async fn close(&mut self) -> Result<()> {
        let conn = self.conn.take().ok_or(SqliteError::NotOpen)?;
        match conn.close().await {
            Ok(()) => {
                debug!(database = %self.filename, "database closed");
                Ok(())
            }
            Err(tokio_rusqlite::Error::Close((conn, e))) => {
                self.conn = Some(conn);
                let err = SqliteError::DatabaseError(e);
                self.tracer
                    .report(LogEvent::error("close", Some(&self.filename), &err));
                Err(err)
            }
            Err(e) => {
                let err = SqliteError::from(e);
                self.tracer
                    .report(LogEvent::error("close", Some(&self.filename), &err));
                Err(err)
            }
        }
    }

    fn connection(&self) -> Result<&tokio_rusqlite::Connection> {
        self.conn.as_ref().ok_or(SqliteError::NotOpen)
    }

    /// Runs `body` with a [`Scope`] on the executor thread.
    pub(crate) async fn scoped<T, F>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&Scope<'_>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.connection()?;
        let tracer = self.tracer.clone();
        conn.call(move |c| Ok(body(&Scope::new(c, &tracer)))).await?
    }

    /// Executes a `;`-separated batch with no binding and no results.
    pub async fn exec(&self, sql: impl Into<String>) -> Result<()> {
        let sql = sql.into();
        self.scoped(move |scope| scope.exec(&sql)).await
    }

    /// Runs one statement to completion.
    pub async fn run(&self, sql: impl Into<String>, params: impl Into<Params>) -> Result<RunResult> {
        let sql = sql.into();
        let params = params.into();
        self.scoped(move |scope| scope.run(&sql, params)).await
    }

    /// First result row, or `None` when the statement yields no rows.
    pub async fn get(&self, sql: impl Into<String>, params: impl Into<Params>) -> Result<Option<Row>> {
        let sql = sql.into();
        let params = params.into();
        self.scoped(move |scope| scope.get(&sql, params)).await
    }

    /// Every result row, in engine order.
    pub async fn all(&self, sql: impl Into<String>, params: impl Into<Params>) -> Result<Vec<Row>> {
        let sql = sql.into();
        let params = params.into();
        self.scoped(move |scope| scope.all(&sql, params)).await
    }

    /// Reads (`value == None`) or writes a pragma.
    ///
    /// A present value is always applied, including `0` and `""`. Returns
    /// the row the engine reports, if any.
    pub async fn pragma(&self, name: impl Into<String>, value: Option<Value>) -> Result<Option<Row>> {
        let name = name.into();
        self.scoped(move |scope| scope.pragma(&name, value.as_ref()))
            .await
    }

    /// Loads a SQLite extension library.
    pub async fn load_extension(&self, path: impl AsRef<Path>) -> Result<()> {
        let path: PathBuf = path.as_ref().to_path_buf();
        self.scoped(move |scope| {
            let conn = scope.raw();
            let display = path.display().to_string();
            scope.tracer().observe("load_extension", Some(&display), || {
                // SAFETY: loading is enabled only for the duration of this call
                // and the path comes from the caller.
                unsafe {
                    let _guard = LoadExtensionGuard::new(conn)?;
                    conn.load_extension(&path, None::<&str>)
                }
            })?;
            Ok(())
        })
        .await
    }

    /// Runs `body` inside `BEGIN` ... `COMMIT`.
    ///
    /// Statements issued on the [`Scope`] run in issue order before the
    /// commit. When `body` fails the transaction is rolled back and the
    /// body's error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::NotOpen`] when closed, the body's error, or
    /// the `BEGIN`/`COMMIT` failure.
    pub async fn transaction<T, F>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&Scope<'_>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.scoped(move |scope| {
            scope.exec_traced("transaction", "BEGIN")?;
            let value = match body(scope) {
                Ok(value) => value,
                Err(err) => {
                    rollback(scope);
                    return Err(err);
                }
            };
            if let Err(err) = scope.exec_traced("transaction", "COMMIT") {
                rollback(scope);
                return Err(err);
            }
            Ok(value)
        })
        .await
    }

    /// Compiles `sql` once and hands the statement to `body`.
    ///
    /// The statement is finalized after `body` returns; finalize failures
    /// are reported to the sink. Returns `Ok(None)` without running `body`
    /// when no connection is held.
    pub async fn prepare<T, F>(&self, sql: impl Into<String>, body: F) -> Result<Option<T>>
    where
        F: FnOnce(&mut PreparedStatement<'_>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        if self.conn.is_none() {
            return Ok(None);
        }
        let sql = sql.into();
        self.scoped(move |scope| {
            let mut stmt = scope.prepare(&sql)?;
            let result = body(&mut stmt);
            let finalized = stmt.finalize();
            settle_prepared(scope.tracer(), &sql, result, finalized)
        })
        .await
    }

    /// See [`sqlmigrate_core::escape_like`].
    pub fn escape_like(text: &str) -> String {
        sqlmigrate_core::escape_like(text)
    }

    /// See [`sqlmigrate_core::to_query_param`].
    pub fn to_query_param<I, K, V>(entries: I) -> Params
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        sqlmigrate_core::to_query_param(entries)
    }
}

/// Combines a prepared body's result with its finalize outcome. Finalize
/// failures go to the sink only.
fn settle_prepared<T>(
    tracer: &Tracer,
    sql: &str,
    result: Result<T>,
    finalized: Result<()>,
) -> Result<Option<T>> {
    if let Err(err) = finalized {
        tracer.report(LogEvent::error("finalize", Some(sql), &err));
    }
    result.map(Some)
}

fn rollback(scope: &Scope<'_>) {
    if let Err(err) = scope.exec_traced("transaction", "ROLLBACK") {
        warn!(error = %err, "rollback failed");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::log::LogLevel;

    fn busy() -> SqliteError {
        SqliteError::DatabaseError(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        ))
    }

    fn capturing_tracer() -> (Tracer, Arc<Mutex<Vec<LogEvent>>>) {
        let events: Arc<Mutex<Vec<LogEvent>>> = Arc::default();
        let captured = Arc::clone(&events);
        let sink = move |event: &LogEvent| captured.lock().unwrap().push(event.clone());
        (Tracer::new(None, Arc::new(sink)), events)
    }

    #[test]
    fn test_finalize_failure_goes_to_sink_and_keeps_value() {
        let (tracer, events) = capturing_tracer();
        let value = settle_prepared(&tracer, "SELECT 1", Ok(42), Err(busy())).unwrap();
        assert_eq!(value, Some(42));

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].level, LogLevel::Error);
        assert_eq!(events[0].channel, "finalize");
        assert_eq!(events[0].sql.as_deref(), Some("SELECT 1"));
        assert!(events[0].error.is_some());
    }

    #[test]
    fn test_body_error_wins_over_finalize_failure() {
        let (tracer, events) = capturing_tracer();
        let err =
            settle_prepared::<i32>(&tracer, "SELECT 1", Err(SqliteError::NotOpen), Err(busy()))
                .unwrap_err();
        assert!(err.is_not_open());
        assert_eq!(events.lock().unwrap()[0].channel, "finalize");
    }

    #[test]
    fn test_clean_finalize_reports_nothing() {
        let (tracer, events) = capturing_tracer();
        assert_eq!(settle_prepared(&tracer, "SELECT 1", Ok("x"), Ok(())).unwrap(), Some("x"));
        assert!(events.lock().unwrap().is_empty());
    }
}
