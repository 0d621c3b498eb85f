//! Capability surface a spatial SQL backend must provide.
//!
//! The traits are intentionally small: executing SQL into a forward-only
//! cursor, a health check, and reading column metadata and values. Any
//! engine exposing this surface can back a pool.

use std::error::Error as StdError;

use strata_core::Value;
use thiserror::Error;

use crate::ConnectionIdentity;

/// Boxed source error reported by a backend driver.
type DriverError = Box<dyn StdError + Send + Sync>;

/// Errors raised by backend connections and cursors.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Establishing a session failed.
    #[error("failed to connect to {identity}: {source}")]
    Connect {
        /// Pool identity of the target server.
        identity: String,
        /// Driver failure.
        #[source]
        source: DriverError,
    },
    /// The backend rejected or failed to run a statement.
    #[error("query execution failed: {source}")]
    Execute {
        /// Driver failure.
        #[source]
        source: DriverError,
    },
    /// Reading the next batch of rows failed.
    #[error("fetching rows failed: {source}")]
    Fetch {
        /// Driver failure.
        #[source]
        source: DriverError,
    },
    /// Closing a cursor failed.
    #[error("closing cursor failed: {source}")]
    Close {
        /// Driver failure.
        #[source]
        source: DriverError,
    },
    /// The connection was used after being handed back to its pool.
    #[error("connection already released to its pool")]
    Released,
}

impl BackendError {
    /// Wrap a driver failure that happened while connecting.
    #[must_use]
    pub fn connect(identity: &ConnectionIdentity, source: impl Into<DriverError>) -> Self {
        Self::Connect {
            identity: identity.to_string(),
            source: source.into(),
        }
    }

    /// Wrap a driver failure that happened while executing.
    #[must_use]
    pub fn execute(source: impl Into<DriverError>) -> Self {
        Self::Execute {
            source: source.into(),
        }
    }

    /// Wrap a driver failure that happened while fetching.
    #[must_use]
    pub fn fetch(source: impl Into<DriverError>) -> Self {
        Self::Fetch {
            source: source.into(),
        }
    }

    /// Wrap a driver failure that happened while closing.
    #[must_use]
    pub fn close(source: impl Into<DriverError>) -> Self {
        Self::Close {
            source: source.into(),
        }
    }
}

/// How a statement's rows are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorMode {
    /// Materialise the whole result client-side. Suitable for small
    /// metadata queries.
    Eager,
    /// Keep the result on the server and fetch it in batches so memory stays
    /// bounded for large results.
    Server {
        /// Rows per round trip; zero is treated as one.
        fetch_size: usize,
    },
}

/// A live session with the backend.
///
/// A connection is used by one borrower at a time; the pool enforces this,
/// so implementations need `Send` but not `Sync`.
pub trait Connection: Send {
    /// Execute `sql` and return a cursor positioned before the first row.
    fn execute(&mut self, sql: &str, mode: CursorMode) -> Result<Box<dyn ResultCursor>, BackendError>;

    /// Whether the session is still usable. May perform a round trip.
    fn is_healthy(&mut self) -> bool;
}

/// Forward-only view over a statement's result.
///
/// Metadata methods are valid as soon as the cursor exists; value accessors
/// refer to the row reached by the last successful [`advance`].
///
/// [`advance`]: ResultCursor::advance
pub trait ResultCursor: Send {
    /// Move to the next row. Returns `false` once the result is exhausted.
    fn advance(&mut self) -> Result<bool, BackendError>;

    /// Number of columns.
    fn field_count(&self) -> usize;

    /// Name of column `index`.
    fn field_name(&self, index: usize) -> Option<&str>;

    /// Storage size of column `index` in bytes; `None` for variable width.
    fn field_length(&self, index: usize) -> Option<usize>;

    /// Backend type identifier of column `index`.
    fn field_type_id(&self, index: usize) -> Option<u32>;

    /// Value of column `index` in the current row.
    fn value(&self, index: usize) -> Value;

    /// Value of the named column in the current row.
    fn value_by_name(&self, name: &str) -> Value {
        (0..self.field_count())
            .find(|index| self.field_name(*index) == Some(name))
            .map_or(Value::Null, |index| self.value(index))
    }

    /// Release server-side resources. Calling it twice is harmless.
    fn close(&mut self) -> Result<(), BackendError>;
}

/// Produces new connections for one identity on demand.
pub trait ConnectionCreator: Send + Sync {
    /// Identity shared by every connection this creator opens.
    fn identity(&self) -> &ConnectionIdentity;

    /// Open a new session.
    fn create(&self) -> Result<Box<dyn Connection>, BackendError>;
}

/// Placeholder left behind once a lease has handed its connection back.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ReleasedConnection;

impl Connection for ReleasedConnection {
    fn execute(&mut self, _sql: &str, _mode: CursorMode) -> Result<Box<dyn ResultCursor>, BackendError> {
        Err(BackendError::Released)
    }

    fn is_healthy(&mut self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    struct TwoColumns {
        row: Vec<Value>,
    }

    impl ResultCursor for TwoColumns {
        fn advance(&mut self) -> Result<bool, BackendError> {
            Ok(false)
        }

        fn field_count(&self) -> usize {
            2
        }

        fn field_name(&self, index: usize) -> Option<&str> {
            ["gid", "name"].get(index).copied()
        }

        fn field_length(&self, _index: usize) -> Option<usize> {
            None
        }

        fn field_type_id(&self, _index: usize) -> Option<u32> {
            None
        }

        fn value(&self, index: usize) -> Value {
            self.row.get(index).cloned().unwrap_or_default()
        }

        fn close(&mut self) -> Result<(), BackendError> {
            Ok(())
        }
    }

    #[rstest]
    fn value_by_name_resolves_column_position() {
        let cursor = TwoColumns {
            row: vec![Value::Integer(7), Value::from("Elm Street")],
        };
        assert_eq!(cursor.value_by_name("name"), Value::from("Elm Street"));
        assert_eq!(cursor.value_by_name("missing"), Value::Null);
    }

    #[rstest]
    fn released_connection_refuses_work() {
        let mut conn = ReleasedConnection;
        assert!(!conn.is_healthy());
        assert!(matches!(
            conn.execute("select 1", CursorMode::Eager),
            Err(BackendError::Released)
        ));
    }

    #[rstest]
    fn connect_errors_name_the_identity() {
        let identity = ConnectionIdentity::new("db", "gis", "render");
        let error = BackendError::connect(&identity, "connection refused");
        assert_eq!(
            error.to_string(),
            "failed to connect to render@db/gis: connection refused"
        );
    }
}
