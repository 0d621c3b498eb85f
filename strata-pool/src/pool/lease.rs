//! Scoped ownership of a borrowed connection.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use super::Pool;
use crate::Connection;
use crate::backend::ReleasedConnection;

/// A connection on loan from a [`Pool`].
///
/// The connection goes back to its pool exactly once, when the guard is
/// dropped. A guard marked with [`mark_broken`](Self::mark_broken) discards
/// the connection instead, freeing its slot for a fresh one.
pub struct PooledConnection {
    pool: Arc<Pool>,
    conn: Box<dyn Connection>,
    reusable: bool,
}

impl PooledConnection {
    pub(super) const fn new(pool: Arc<Pool>, conn: Box<dyn Connection>) -> Self {
        Self {
            pool,
            conn,
            reusable: true,
        }
    }

    /// Discard the connection on release instead of returning it to the
    /// idle set.
    pub const fn mark_broken(&mut self) {
        self.reusable = false;
    }

    /// Whether [`mark_broken`](Self::mark_broken) has been called.
    #[must_use]
    pub const fn is_broken(&self) -> bool {
        !self.reusable
    }

    /// Pool the connection belongs to.
    #[must_use]
    pub const fn pool(&self) -> &Arc<Pool> {
        &self.pool
    }
}

impl Deref for PooledConnection {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref()
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let conn = std::mem::replace(&mut self.conn, Box::new(ReleasedConnection));
        self.pool.release(conn, self.reusable);
    }
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("pool", self.pool.identity())
            .field("broken", &self.is_broken())
            .finish_non_exhaustive()
    }
}
