//! Scripted in-memory backend for unit and behaviour tests.
//!
//! Responses are registered against SQL fragments; the most recently
//! registered fragment contained in an executed statement decides its
//! result, so a test can override a fixture's response. Statements that
//! match nothing yield an empty result with no columns.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use strata_core::Value;

use crate::{BackendError, Connection, ConnectionCreator, ConnectionIdentity, CursorMode, ResultCursor};

/// Result a scripted statement produces.
#[derive(Debug, Clone)]
pub enum Scripted {
    /// Rows to stream back.
    Rows(ScriptedRows),
    /// Execution failure with the given message.
    Fail(String),
    /// Execution failure that also breaks every open connection, as when
    /// the server goes away mid-statement.
    Disconnect(String),
}

#[derive(Debug, Clone)]
struct ScriptedColumn {
    name: String,
    type_id: u32,
    length: Option<usize>,
}

/// Column metadata plus row values for one scripted result.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRows {
    columns: Vec<ScriptedColumn>,
    rows: Vec<Vec<Value>>,
    fail_after: Option<usize>,
}

impl ScriptedRows {
    /// Start an empty result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column description.
    #[must_use]
    pub fn column(mut self, name: impl Into<String>, type_id: u32, length: Option<usize>) -> Self {
        self.columns.push(ScriptedColumn {
            name: name.into(),
            type_id,
            length,
        });
        self
    }

    /// Append a row of values, in column order.
    #[must_use]
    pub fn row<I>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        self.rows.push(values.into_iter().collect());
        self
    }

    /// Make the fetch of row `index` (zero based) fail.
    #[must_use]
    pub const fn fail_after(mut self, index: usize) -> Self {
        self.fail_after = Some(index);
        self
    }
}

#[derive(Debug, Default)]
struct Shared {
    responses: Vec<(String, Scripted)>,
    executed: Vec<String>,
    connections_created: usize,
    cursors_closed: usize,
    generation: u64,
    refuse_connections: bool,
}

/// A [`ConnectionCreator`] whose connections replay scripted results.
///
/// Clones share state, so a test can keep a handle for inspection after
/// handing the backend to a pool.
#[derive(Debug, Clone)]
pub struct ScriptedBackend {
    identity: ConnectionIdentity,
    shared: Arc<Mutex<Shared>>,
}

impl ScriptedBackend {
    /// Backend with no scripted responses.
    #[must_use]
    pub fn new(identity: ConnectionIdentity) -> Self {
        Self {
            identity,
            shared: Arc::new(Mutex::new(Shared::default())),
        }
    }

    /// Builder form of [`respond`](Self::respond).
    #[must_use]
    pub fn with_rows(self, fragment: impl Into<String>, rows: ScriptedRows) -> Self {
        self.respond(fragment, rows);
        self
    }

    /// Builder form of [`fail`](Self::fail).
    #[must_use]
    pub fn with_failure(self, fragment: impl Into<String>, message: impl Into<String>) -> Self {
        self.fail(fragment, message);
        self
    }

    /// Answer statements containing `fragment` with `rows`.
    pub fn respond(&self, fragment: impl Into<String>, rows: ScriptedRows) {
        self.lock().responses.push((fragment.into(), Scripted::Rows(rows)));
    }

    /// Reject statements containing `fragment`.
    pub fn fail(&self, fragment: impl Into<String>, message: impl Into<String>) {
        self.lock()
            .responses
            .push((fragment.into(), Scripted::Fail(message.into())));
    }

    /// Drop the server while executing statements containing `fragment`.
    pub fn disconnect_on(&self, fragment: impl Into<String>, message: impl Into<String>) {
        self.lock()
            .responses
            .push((fragment.into(), Scripted::Disconnect(message.into())));
    }

    /// Every statement executed so far, in order.
    #[must_use]
    pub fn executed(&self) -> Vec<String> {
        self.lock().executed.clone()
    }

    /// Number of connections opened.
    #[must_use]
    pub fn connections_created(&self) -> usize {
        self.lock().connections_created
    }

    /// Number of cursors closed.
    #[must_use]
    pub fn cursors_closed(&self) -> usize {
        self.lock().cursors_closed
    }

    /// Make every connection opened so far fail its health check.
    pub fn break_existing_connections(&self) {
        self.lock().generation += 1;
    }

    /// Make subsequent connection attempts fail.
    pub fn refuse_connections(&self, refuse: bool) {
        self.lock().refuse_connections = refuse;
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        lock(&self.shared)
    }
}

impl ConnectionCreator for ScriptedBackend {
    fn identity(&self) -> &ConnectionIdentity {
        &self.identity
    }

    fn create(&self) -> Result<Box<dyn Connection>, BackendError> {
        let mut shared = self.lock();
        if shared.refuse_connections {
            return Err(BackendError::connect(&self.identity, "connection refused"));
        }
        shared.connections_created += 1;
        Ok(Box::new(ScriptedConnection {
            shared: Arc::clone(&self.shared),
            generation: shared.generation,
        }))
    }
}

/// Connection handed out by [`ScriptedBackend`].
#[derive(Debug)]
pub struct ScriptedConnection {
    shared: Arc<Mutex<Shared>>,
    generation: u64,
}

impl Connection for ScriptedConnection {
    fn execute(&mut self, sql: &str, _mode: CursorMode) -> Result<Box<dyn ResultCursor>, BackendError> {
        let mut shared = lock(&self.shared);
        shared.executed.push(sql.to_owned());
        let scripted = shared
            .responses
            .iter()
            .rev()
            .find(|(fragment, _)| sql.contains(fragment.as_str()))
            .map(|(_, scripted)| scripted.clone());
        match scripted {
            Some(Scripted::Fail(message)) => Err(BackendError::execute(message)),
            Some(Scripted::Disconnect(message)) => {
                shared.generation += 1;
                Err(BackendError::execute(message))
            }
            Some(Scripted::Rows(rows)) => Ok(Box::new(ScriptedCursor::new(rows, Arc::clone(&self.shared)))),
            None => Ok(Box::new(ScriptedCursor::new(
                ScriptedRows::new(),
                Arc::clone(&self.shared),
            ))),
        }
    }

    fn is_healthy(&mut self) -> bool {
        lock(&self.shared).generation == self.generation
    }
}

/// Cursor replaying one [`ScriptedRows`] value.
#[derive(Debug)]
pub struct ScriptedCursor {
    rows: ScriptedRows,
    current: Option<usize>,
    closed: bool,
    shared: Arc<Mutex<Shared>>,
}

impl ScriptedCursor {
    const fn new(rows: ScriptedRows, shared: Arc<Mutex<Shared>>) -> Self {
        Self {
            rows,
            current: None,
            closed: false,
            shared,
        }
    }

    fn column(&self, index: usize) -> Option<&ScriptedColumn> {
        self.rows.columns.get(index)
    }
}

impl ResultCursor for ScriptedCursor {
    fn advance(&mut self) -> Result<bool, BackendError> {
        let next = self.current.map_or(0, |index| index + 1);
        if self.rows.fail_after == Some(next) {
            return Err(BackendError::fetch("scripted fetch failure"));
        }
        if next < self.rows.rows.len() {
            self.current = Some(next);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn field_count(&self) -> usize {
        self.rows.columns.len()
    }

    fn field_name(&self, index: usize) -> Option<&str> {
        self.column(index).map(|column| column.name.as_str())
    }

    fn field_length(&self, index: usize) -> Option<usize> {
        self.column(index).and_then(|column| column.length)
    }

    fn field_type_id(&self, index: usize) -> Option<u32> {
        self.column(index).map(|column| column.type_id)
    }

    fn value(&self, index: usize) -> Value {
        self.current
            .and_then(|row| self.rows.rows.get(row))
            .and_then(|row| row.get(index))
            .cloned()
            .unwrap_or_default()
    }

    fn close(&mut self) -> Result<(), BackendError> {
        if !self.closed {
            self.closed = true;
            lock(&self.shared).cursors_closed += 1;
        }
        Ok(())
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn backend() -> ScriptedBackend {
        ScriptedBackend::new(ConnectionIdentity::new("db", "gis", "render"))
            .with_rows(
                "from roads",
                ScriptedRows::new()
                    .column("gid", 23, Some(4))
                    .row([Value::Integer(1)])
                    .row([Value::Integer(2)])
                    .fail_after(1),
            )
            .with_failure("from missing", "relation does not exist")
    }

    #[rstest]
    fn replays_rows_until_the_scripted_failure() {
        let backend = backend();
        let mut conn = backend.create().expect("connection");
        let mut cursor = conn
            .execute("select gid from roads", CursorMode::Eager)
            .expect("scripted rows");
        assert_eq!(cursor.field_type_id(0), Some(23));
        assert!(cursor.advance().expect("first row"));
        assert_eq!(cursor.value_by_name("gid"), Value::Integer(1));
        assert!(cursor.advance().is_err());
        cursor.close().expect("close");
        cursor.close().expect("second close");
        assert_eq!(backend.cursors_closed(), 1);
    }

    #[rstest]
    fn scripted_failures_surface_as_execute_errors() {
        let backend = backend();
        let mut conn = backend.create().expect("connection");
        let result = conn.execute("select * from missing", CursorMode::Eager);
        assert!(matches!(result, Err(BackendError::Execute { .. })));
        assert_eq!(backend.executed(), vec!["select * from missing".to_owned()]);
    }

    #[rstest]
    fn breaking_connections_fails_health_checks() {
        let backend = backend();
        let mut old = backend.create().expect("connection");
        backend.break_existing_connections();
        let mut new = backend.create().expect("connection");
        assert!(!old.is_healthy());
        assert!(new.is_healthy());
    }

    #[rstest]
    fn disconnecting_statements_break_the_connection() {
        let backend = backend();
        backend.disconnect_on("from roads", "server closed the connection unexpectedly");
        let mut conn = backend.create().expect("connection");
        assert!(conn.execute("select gid from roads", CursorMode::Eager).is_err());
        assert!(!conn.is_healthy());
    }
}
