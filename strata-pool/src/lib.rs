//! Pooled connections to a spatial SQL backend.
//!
//! The crate defines the minimal capability surface a backend must expose
//! ([`Connection`], [`ResultCursor`], [`ConnectionCreator`]) and a bounded,
//! non-blocking [`Pool`] of such connections. Pools are registered on a
//! [`PoolManager`] owned by the application, keyed by
//! [`ConnectionIdentity`].
//!
//! Borrowing yields a [`PooledConnection`] guard. The guard hands the
//! connection back exactly once when it is dropped, whichever way the
//! borrower's scope ends.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//!
//! use strata_pool::{
//!     BackendError, Connection, ConnectionCreator, ConnectionIdentity, CursorMode, PoolManager,
//!     PoolSizing, ResultCursor,
//! };
//!
//! struct Idle;
//!
//! impl Connection for Idle {
//!     fn execute(&mut self, _sql: &str, _mode: CursorMode) -> Result<Box<dyn ResultCursor>, BackendError> {
//!         Err(BackendError::execute("read-only example"))
//!     }
//!
//!     fn is_healthy(&mut self) -> bool {
//!         true
//!     }
//! }
//!
//! struct Creator(ConnectionIdentity);
//!
//! impl ConnectionCreator for Creator {
//!     fn identity(&self) -> &ConnectionIdentity {
//!         &self.0
//!     }
//!
//!     fn create(&self) -> Result<Box<dyn Connection>, BackendError> {
//!         Ok(Box::new(Idle))
//!     }
//! }
//!
//! # fn main() -> Result<(), strata_pool::PoolError> {
//! let identity = ConnectionIdentity::new("localhost", "gis", "render");
//! let manager = PoolManager::new();
//! let pool = manager.register(Arc::new(Creator(identity.clone())), PoolSizing::new(1, 2))?;
//!
//! {
//!     let _lease = pool.borrow()?;
//!     assert_eq!(pool.stats().borrowed, 1);
//! }
//! assert_eq!(pool.stats().borrowed, 0);
//! assert!(manager.get(&identity).is_some());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

mod backend;
mod identity;
mod manager;
mod pool;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use backend::{BackendError, Connection, ConnectionCreator, CursorMode, ResultCursor};
pub use identity::ConnectionIdentity;
pub use manager::PoolManager;
pub use pool::{Pool, PoolError, PoolSizing, PoolStats, PooledConnection};
