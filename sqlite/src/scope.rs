//! Synchronous statement issuer bound to the executor thread.
//!
//! A [`Scope`] is handed to [`Database::transaction`](crate::Database::transaction)
//! bodies. Statements issued through it run immediately, in issue order,
//! before the surrounding transaction commits.

use rusqlite::{Connection, Statement, params_from_iter};
use sqlmigrate_core::{Params, Row, Value};

use crate::convert::{bind_values, column_names, read_row};
use crate::error::Result;
use crate::log::Tracer;
use crate::pragma::pragma_sql;

/// Outcome of a data-modifying statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunResult {
    /// Rowid of the most recent successful insert on the connection.
    pub last_insert_id: i64,
    /// Rows changed by the statement.
    pub rows_changed: usize,
}

/// Statement issuer over a borrowed connection.
pub struct Scope<'c> {
    conn: &'c Connection,
    tracer: &'c Tracer,
}

impl<'c> Scope<'c> {
    pub(crate) fn new(conn: &'c Connection, tracer: &'c Tracer) -> Self {
        Self { conn, tracer }
    }

    /// Executes a `;`-separated batch without binding or results.
    pub fn exec(&self, sql: &str) -> Result<()> {
        self.exec_traced("exec", sql)
    }

    pub(crate) fn exec_traced(&self, channel: &'static str, sql: &str) -> Result<()> {
        self.tracer
            .observe(channel, Some(sql), || self.conn.execute_batch(sql))?;
        Ok(())
    }

    pub(crate) fn tracer(&self) -> &'c Tracer {
        self.tracer
    }

    /// Runs one statement to completion.
    pub fn run(&self, sql: &str, params: impl Into<Params>) -> Result<RunResult> {
        let params = params.into();
        let result = self.tracer.observe("run", Some(sql), || {
            let mut stmt = self.conn.prepare(sql)?;
            run_statement(self.conn, &mut stmt, &params)
        })?;
        Ok(result)
    }

    /// First result row, or `None` when the statement yields no rows.
    pub fn get(&self, sql: &str, params: impl Into<Params>) -> Result<Option<Row>> {
        let params = params.into();
        let row = self.tracer.observe("get", Some(sql), || {
            let mut stmt = self.conn.prepare(sql)?;
            first_row(&mut stmt, &params)
        })?;
        Ok(row)
    }

    /// Every result row.
    pub fn all(&self, sql: &str, params: impl Into<Params>) -> Result<Vec<Row>> {
        let params = params.into();
        let rows = self.tracer.observe("all", Some(sql), || {
            let mut stmt = self.conn.prepare(sql)?;
            all_rows(&mut stmt, &params)
        })?;
        Ok(rows)
    }

    /// Reads (`value == None`) or writes a pragma.
    ///
    /// Returns the row the engine reports, if any.
    pub fn pragma(&self, name: &str, value: Option<&Value>) -> Result<Option<Row>> {
        let sql = pragma_sql(name, value)?;
        let row = self.tracer.observe("pragma", Some(&sql), || {
            let mut stmt = self.conn.prepare(&sql)?;
            first_row(&mut stmt, &Params::None)
        })?;
        Ok(row)
    }

    /// Compiles `sql` once for repeated execution within this scope.
    pub fn prepare(&self, sql: &str) -> Result<PreparedStatement<'c>> {
        let stmt = self
            .tracer
            .observe("prepare", Some(sql), || self.conn.prepare(sql))?;
        Ok(PreparedStatement {
            stmt,
            conn: self.conn,
            tracer: self.tracer,
            sql: sql.to_string(),
        })
    }

    /// The underlying `rusqlite` connection.
    pub fn raw(&self) -> &'c Connection {
        self.conn
    }
}

/// A compiled statement that can be executed repeatedly.
pub struct PreparedStatement<'c> {
    stmt: Statement<'c>,
    conn: &'c Connection,
    tracer: &'c Tracer,
    sql: String,
}

impl PreparedStatement<'_> {
    pub fn run(&mut self, params: impl Into<Params>) -> Result<RunResult> {
        let params = params.into();
        let conn = self.conn;
        let result = self.tracer.observe("run", Some(self.sql.as_str()), || {
            run_statement(conn, &mut self.stmt, &params)
        })?;
        Ok(result)
    }

    pub fn get(&mut self, params: impl Into<Params>) -> Result<Option<Row>> {
        let params = params.into();
        let row = self
            .tracer
            .observe("get", Some(self.sql.as_str()), || first_row(&mut self.stmt, &params))?;
        Ok(row)
    }

    pub fn all(&mut self, params: impl Into<Params>) -> Result<Vec<Row>> {
        let params = params.into();
        let rows = self
            .tracer
            .observe("all", Some(self.sql.as_str()), || all_rows(&mut self.stmt, &params))?;
        Ok(rows)
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Releases the compiled statement, surfacing any deferred error.
    pub fn finalize(self) -> Result<()> {
        self.stmt.finalize()?;
        Ok(())
    }
}

/// Steps `stmt` through every row so statements that return rows still run
/// to completion.
pub(crate) fn run_statement(
    conn: &Connection,
    stmt: &mut Statement<'_>,
    params: &Params,
) -> rusqlite::Result<RunResult> {
    let values = bind_values(stmt, params)?;
    let mut rows = stmt.query(params_from_iter(values))?;
    while rows.next()?.is_some() {}
    drop(rows);
    Ok(RunResult {
        last_insert_id: conn.last_insert_rowid(),
        rows_changed: conn.changes() as usize,
    })
}

pub(crate) fn first_row(stmt: &mut Statement<'_>, params: &Params) -> rusqlite::Result<Option<Row>> {
    let columns = column_names(stmt);
    let values = bind_values(stmt, params)?;
    let mut rows = stmt.query(params_from_iter(values))?;
    match rows.next()? {
        Some(row) => Ok(Some(read_row(row, &columns)?)),
        None => Ok(None),
    }
}

pub(crate) fn all_rows(stmt: &mut Statement<'_>, params: &Params) -> rusqlite::Result<Vec<Row>> {
    let columns = column_names(stmt);
    let values = bind_values(stmt, params)?;
    let mut rows = stmt.query(params_from_iter(values))?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(read_row(row, &columns)?);
    }
    Ok(out)
}
