//! Backend built on the blocking `postgres` driver.
//!
//! Eager statements are prepared and run in one round trip. Server cursors
//! open a read-only transaction, declare a named cursor, and fetch it in
//! batches; closing the cursor commits the transaction.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, warn};
use postgres::types::FromSql;
use postgres::{Client, Config, NoTls, Row};
use strata_core::Value;
use strata_pool::{BackendError, Connection, ConnectionCreator, ConnectionIdentity, CursorMode, ResultCursor};

use crate::settings::PostgisSettings;
use crate::types::{fixed_length, oid};

const CURSOR_NAME: &str = "strata_features";
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(2);
const APPLICATION_NAME: &str = "strata";

/// Opens `postgres` connections for one identity.
#[derive(Clone)]
pub struct PgConnectionCreator {
    identity: ConnectionIdentity,
    config: Config,
}

impl PgConnectionCreator {
    /// Build the driver configuration from datasource settings.
    #[must_use]
    pub fn new(settings: &PostgisSettings) -> Self {
        let mut config = Config::new();
        config
            .host(&settings.host)
            .user(&settings.user)
            .application_name(APPLICATION_NAME);
        if !settings.dbname.is_empty() {
            config.dbname(&settings.dbname);
        }
        if let Some(port) = settings.port {
            config.port(port);
        }
        if let Some(password) = &settings.password {
            config.password(password);
        }
        if let Some(timeout) = settings.connect_timeout {
            config.connect_timeout(timeout);
        }
        Self {
            identity: settings.identity(),
            config,
        }
    }
}

impl fmt::Debug for PgConnectionCreator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgConnectionCreator")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl ConnectionCreator for PgConnectionCreator {
    fn identity(&self) -> &ConnectionIdentity {
        &self.identity
    }

    fn create(&self) -> Result<Box<dyn Connection>, BackendError> {
        let client = self
            .config
            .connect(NoTls)
            .map_err(|error| BackendError::connect(&self.identity, error))?;
        debug!("postgres: connected to {}", self.identity);
        Ok(Box::new(PgConnection {
            client: Arc::new(Mutex::new(client)),
        }))
    }
}

/// One driver session. Cursors share the client with the connection that
/// opened them; the pool guarantees only one of them is in use at a time.
struct PgConnection {
    client: Arc<Mutex<Client>>,
}

impl PgConnection {
    fn open_server_cursor(client: &mut Client, sql: &str) -> Result<Vec<(String, u32)>, postgres::Error> {
        client.batch_execute("BEGIN READ ONLY")?;
        let opened = client.prepare(sql).and_then(|statement| {
            client.batch_execute(&format!("DECLARE {CURSOR_NAME} NO SCROLL CURSOR FOR {sql}"))?;
            Ok(describe(statement.columns()))
        });
        if opened.is_err()
            && let Err(error) = client.batch_execute("ROLLBACK")
        {
            warn!("postgres: rollback after failed cursor declaration failed: {error}");
        }
        opened
    }
}

impl Connection for PgConnection {
    fn execute(&mut self, sql: &str, mode: CursorMode) -> Result<Box<dyn ResultCursor>, BackendError> {
        let mut client = lock(&self.client);
        let cursor = match mode {
            CursorMode::Eager => {
                let statement = client.prepare(sql).map_err(BackendError::execute)?;
                let rows = client.query(&statement, &[]).map_err(BackendError::execute)?;
                PgCursor {
                    client: Arc::clone(&self.client),
                    columns: describe(statement.columns()),
                    buffered: rows.into(),
                    current: None,
                    server: None,
                    closed: false,
                }
            }
            CursorMode::Server { fetch_size } => {
                let columns = Self::open_server_cursor(&mut client, sql).map_err(BackendError::execute)?;
                PgCursor {
                    client: Arc::clone(&self.client),
                    columns,
                    buffered: VecDeque::new(),
                    current: None,
                    server: Some(ServerCursor {
                        fetch_sql: format!("FETCH FORWARD {} FROM {CURSOR_NAME}", fetch_size.max(1)),
                        fetch_size: fetch_size.max(1),
                        drained: false,
                    }),
                    closed: false,
                }
            }
        };
        Ok(Box::new(cursor))
    }

    fn is_healthy(&mut self) -> bool {
        let mut client = lock(&self.client);
        !client.is_closed() && client.is_valid(HEALTH_CHECK_TIMEOUT).is_ok()
    }
}

struct ServerCursor {
    fetch_sql: String,
    fetch_size: usize,
    drained: bool,
}

struct PgCursor {
    client: Arc<Mutex<Client>>,
    columns: Vec<(String, u32)>,
    buffered: VecDeque<Row>,
    current: Option<Row>,
    server: Option<ServerCursor>,
    closed: bool,
}

impl PgCursor {
    fn refill(&mut self) -> Result<(), BackendError> {
        let Some(server) = self.server.as_mut().filter(|server| !server.drained) else {
            return Ok(());
        };
        let rows = lock(&self.client)
            .query(server.fetch_sql.as_str(), &[])
            .map_err(BackendError::fetch)?;
        server.drained = rows.len() < server.fetch_size;
        self.buffered.extend(rows);
        Ok(())
    }
}

impl ResultCursor for PgCursor {
    fn advance(&mut self) -> Result<bool, BackendError> {
        if self.closed {
            return Ok(false);
        }
        if self.buffered.is_empty() {
            self.refill()?;
        }
        self.current = self.buffered.pop_front();
        Ok(self.current.is_some())
    }

    fn field_count(&self) -> usize {
        self.columns.len()
    }

    fn field_name(&self, index: usize) -> Option<&str> {
        self.columns.get(index).map(|(name, _)| name.as_str())
    }

    fn field_length(&self, index: usize) -> Option<usize> {
        self.field_type_id(index).and_then(fixed_length)
    }

    fn field_type_id(&self, index: usize) -> Option<u32> {
        self.columns.get(index).map(|(_, type_id)| *type_id)
    }

    fn value(&self, index: usize) -> Value {
        match (&self.current, self.field_type_id(index)) {
            (Some(row), Some(type_id)) => Decoder::for_type(type_id).read(row, index),
            _ => Value::Null,
        }
    }

    fn close(&mut self) -> Result<(), BackendError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.buffered.clear();
        self.current = None;
        if self.server.take().is_none() {
            return Ok(());
        }
        let mut client = lock(&self.client);
        let committed = client.batch_execute(&format!("CLOSE {CURSOR_NAME}; COMMIT"));
        if committed.is_err()
            && let Err(error) = client.batch_execute("ROLLBACK")
        {
            warn!("postgres: rollback after failed cursor close failed: {error}");
        }
        committed.map_err(BackendError::close)
    }
}

impl Drop for PgCursor {
    fn drop(&mut self) {
        if let Err(error) = self.close() {
            warn!("postgres: {error}");
        }
    }
}

fn describe(columns: &[postgres::Column]) -> Vec<(String, u32)> {
    columns
        .iter()
        .map(|column| (column.name().to_owned(), column.type_().oid()))
        .collect()
}

/// Rust type a column is read as. Types without a native decoding are
/// selected as `text` by the feature query and read here as strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decoder {
    Int2,
    Int4,
    Int8,
    Oid,
    Float4,
    Float8,
    Bytes,
    Text,
}

impl Decoder {
    const fn for_type(type_id: u32) -> Self {
        match type_id {
            oid::INT2 => Self::Int2,
            oid::INT4 => Self::Int4,
            oid::INT8 => Self::Int8,
            oid::OID => Self::Oid,
            oid::FLOAT4 => Self::Float4,
            oid::FLOAT8 => Self::Float8,
            oid::BYTEA => Self::Bytes,
            _ => Self::Text,
        }
    }

    /// Convert one cell, treating SQL `NULL` and undecodable values as
    /// [`Value::Null`].
    fn read(self, row: &Row, index: usize) -> Value {
        match self {
            Self::Int2 => read(row, index, |value: i16| Value::Integer(i64::from(value))),
            Self::Int4 => read(row, index, |value: i32| Value::Integer(i64::from(value))),
            Self::Int8 => read(row, index, Value::Integer),
            Self::Oid => read(row, index, |value: u32| Value::Integer(i64::from(value))),
            Self::Float4 => read(row, index, |value: f32| Value::Double(f64::from(value))),
            Self::Float8 => read(row, index, Value::Double),
            Self::Bytes => read(row, index, Value::Bytes),
            Self::Text => read(row, index, Value::String),
        }
    }
}

fn read<'a, T>(row: &'a Row, index: usize, wrap: impl FnOnce(T) -> Value) -> Value
where
    T: FromSql<'a>,
{
    match row.try_get::<_, Option<T>>(index) {
        Ok(Some(value)) => wrap(value),
        Ok(None) => Value::Null,
        Err(error) => {
            debug!("postgres: column {index} is not decodable: {error}");
            Value::Null
        }
    }
}

fn lock(client: &Mutex<Client>) -> MutexGuard<'_, Client> {
    client.lock().unwrap_or_else(PoisonError::into_inner)
}
