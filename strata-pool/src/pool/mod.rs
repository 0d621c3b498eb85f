//! Bounded, non-blocking connection pool.
//!
//! Bookkeeping lives behind a single mutex that is only held while counting
//! and moving connections in or out of the idle set. Opening connections,
//! health checks, and queries all run with the lock released, so a slow
//! server never stalls other borrowers' bookkeeping.
//!
//! Capacity is tracked by reservation: a borrower claims a slot (incrementing
//! `borrowed`) before it leaves the lock, and gives the slot back if it
//! cannot produce a healthy connection. `idle + borrowed` therefore never
//! exceeds `max_size`.

mod lease;

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, warn};
use thiserror::Error;

use crate::{BackendError, Connection, ConnectionCreator, ConnectionIdentity};

pub use lease::PooledConnection;

/// Errors raised by pool construction and borrowing.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The requested sizing can never be satisfied.
    #[error("invalid pool sizing: min_size {min_size}, max_size {max_size}")]
    InvalidSizing {
        /// Requested eager size.
        min_size: usize,
        /// Requested capacity.
        max_size: usize,
    },
    /// Every connection is borrowed and the pool is at capacity.
    #[error("connection pool {identity} is exhausted ({max_size} connections in use)")]
    Unavailable {
        /// Pool identity.
        identity: String,
        /// Pool capacity.
        max_size: usize,
    },
    /// A new connection could not be opened.
    #[error("failed to open pooled connection: {source}")]
    Connect {
        /// Backend failure.
        #[source]
        source: BackendError,
    },
    /// The pool has been shut down.
    #[error("connection pool {identity} is closed")]
    Closed {
        /// Pool identity.
        identity: String,
    },
}

/// Eager and maximum connection counts for a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSizing {
    /// Connections opened when the pool is registered.
    pub min_size: usize,
    /// Upper bound on idle plus borrowed connections.
    pub max_size: usize,
}

impl PoolSizing {
    /// Describe a pool opening `min_size` connections eagerly and never more
    /// than `max_size` in total.
    #[must_use]
    pub const fn new(min_size: usize, max_size: usize) -> Self {
        Self { min_size, max_size }
    }

    /// Reject sizings with no capacity or an eager size above capacity.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidSizing`] when `max_size` is zero or
    /// `min_size` exceeds it.
    pub const fn validate(self) -> Result<Self, PoolError> {
        if self.max_size == 0 || self.min_size > self.max_size {
            return Err(PoolError::InvalidSizing {
                min_size: self.min_size,
                max_size: self.max_size,
            });
        }
        Ok(self)
    }
}

impl Default for PoolSizing {
    fn default() -> Self {
        Self::new(10, 20)
    }
}

/// Point-in-time counters for a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Connections waiting to be borrowed.
    pub idle: usize,
    /// Connections currently lent out, including slots reserved for
    /// connections being opened.
    pub borrowed: usize,
    /// Eager size.
    pub min_size: usize,
    /// Capacity.
    pub max_size: usize,
}

#[derive(Default)]
struct PoolState {
    idle: Vec<Box<dyn Connection>>,
    borrowed: usize,
    closed: bool,
}

impl PoolState {
    const fn in_use(&self) -> usize {
        self.idle.len() + self.borrowed
    }
}

/// A claimed slot, either backed by an idle connection or still empty.
enum Reservation {
    Idle(Box<dyn Connection>),
    Fresh,
}

/// Connections for a single [`ConnectionIdentity`].
pub struct Pool {
    creator: Arc<dyn ConnectionCreator>,
    sizing: PoolSizing,
    state: Mutex<PoolState>,
}

impl Pool {
    /// Create an empty pool. Call [`Pool::fill`] to open the eager
    /// connections.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidSizing`] when `sizing` is unusable.
    pub fn new(creator: Arc<dyn ConnectionCreator>, sizing: PoolSizing) -> Result<Arc<Self>, PoolError> {
        let validated = sizing.validate()?;
        Ok(Arc::new(Self {
            creator,
            sizing: validated,
            state: Mutex::new(PoolState::default()),
        }))
    }

    /// Identity shared by every connection in the pool.
    #[must_use]
    pub fn identity(&self) -> &ConnectionIdentity {
        self.creator.identity()
    }

    /// Configured sizing.
    #[must_use]
    pub const fn sizing(&self) -> PoolSizing {
        self.sizing
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let state = self.state();
        PoolStats {
            idle: state.idle.len(),
            borrowed: state.borrowed,
            min_size: self.sizing.min_size,
            max_size: self.sizing.max_size,
        }
    }

    /// Open connections until `min_size` are held.
    ///
    /// Stops at the first connect failure, which is logged rather than
    /// returned: a database that is down at startup should not prevent the
    /// pool from being used once it comes back. Returns the number of
    /// connections opened.
    #[must_use = "the count shows whether the eager fill succeeded"]
    pub fn fill(&self) -> usize {
        let mut opened = 0;
        loop {
            {
                let mut state = self.state();
                if state.closed || state.in_use() >= self.sizing.min_size {
                    break;
                }
                state.borrowed += 1;
            }
            match self.creator.create() {
                Ok(conn) => {
                    self.release(conn, true);
                    opened += 1;
                }
                Err(error) => {
                    self.give_back_slot();
                    warn!("pool {}: eager connection failed: {error}", self.identity());
                    break;
                }
            }
        }
        opened
    }

    /// Borrow a healthy connection.
    ///
    /// Idle connections failing their health check are discarded and the
    /// next one tried; when none remain a new connection is opened within
    /// capacity. This never waits for another borrower.
    ///
    /// # Errors
    ///
    /// - [`PoolError::Unavailable`] when the pool is at capacity.
    /// - [`PoolError::Connect`] when a required new connection fails.
    /// - [`PoolError::Closed`] after [`Pool::close`].
    pub fn borrow(self: &Arc<Self>) -> Result<PooledConnection, PoolError> {
        let mut reservation = self.reserve()?;
        loop {
            match reservation {
                Reservation::Idle(mut conn) => {
                    if conn.is_healthy() {
                        return Ok(PooledConnection::new(Arc::clone(self), conn));
                    }
                    debug!("pool {}: discarding unhealthy connection", self.identity());
                    drop(conn);
                    reservation = self.next_idle();
                }
                Reservation::Fresh => {
                    return match self.creator.create() {
                        Ok(conn) => Ok(PooledConnection::new(Arc::clone(self), conn)),
                        Err(source) => {
                            self.give_back_slot();
                            Err(PoolError::Connect { source })
                        }
                    };
                }
            }
        }
    }

    /// Drop idle connections and refuse further borrows.
    ///
    /// Connections still on loan are discarded when their lease ends.
    pub fn close(&self) {
        let idle = {
            let mut state = self.state();
            state.closed = true;
            std::mem::take(&mut state.idle)
        };
        debug!("pool {}: closing {} idle connections", self.identity(), idle.len());
        drop(idle);
    }

    /// Whether [`Pool::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    /// Hand back a lent connection. Invoked by the lease guard.
    pub(crate) fn release(&self, conn: Box<dyn Connection>, reusable: bool) {
        let discarded = {
            let mut state = self.state();
            state.borrowed = state.borrowed.saturating_sub(1);
            if reusable && !state.closed {
                state.idle.push(conn);
                None
            } else {
                Some(conn)
            }
        };
        if discarded.is_some() {
            debug!("pool {}: discarding returned connection", self.identity());
        }
    }

    fn reserve(&self) -> Result<Reservation, PoolError> {
        let mut state = self.state();
        if state.closed {
            return Err(PoolError::Closed {
                identity: self.identity().to_string(),
            });
        }
        if let Some(conn) = state.idle.pop() {
            state.borrowed += 1;
            return Ok(Reservation::Idle(conn));
        }
        if state.in_use() < self.sizing.max_size {
            state.borrowed += 1;
            return Ok(Reservation::Fresh);
        }
        Err(PoolError::Unavailable {
            identity: self.identity().to_string(),
            max_size: self.sizing.max_size,
        })
    }

    /// Swap the caller's already-reserved slot onto another idle connection,
    /// or keep it empty for a fresh one.
    fn next_idle(&self) -> Reservation {
        self.state()
            .idle
            .pop()
            .map_or(Reservation::Fresh, Reservation::Idle)
    }

    fn give_back_slot(&self) {
        let mut state = self.state();
        state.borrowed = state.borrowed.saturating_sub(1);
    }

    fn state(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("identity", self.identity())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
