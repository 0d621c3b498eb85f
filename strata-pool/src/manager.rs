//! Registry of pools keyed by connection identity.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use log::info;

use crate::{ConnectionCreator, ConnectionIdentity, Pool, PoolError, PoolSizing};

/// Owns every pool in the process.
///
/// Construct one at startup, hand it to each datasource, and call
/// [`shutdown`](Self::shutdown) on exit. Datasources sharing an identity
/// share a pool.
#[derive(Debug, Default)]
pub struct PoolManager {
    pools: DashMap<ConnectionIdentity, Arc<Pool>>,
}

impl PoolManager {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the pool for the creator's identity, creating it on first use.
    ///
    /// The first registration opens `sizing.min_size` connections before
    /// returning; connect failures during that fill are logged and leave the
    /// pool smaller. Later registrations for the same identity return the
    /// existing pool and ignore both `creator` and `sizing`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidSizing`] when a new pool would be created
    /// with an unusable sizing.
    pub fn register(&self, creator: Arc<dyn ConnectionCreator>, sizing: PoolSizing) -> Result<Arc<Pool>, PoolError> {
        let identity = creator.identity().clone();
        let (pool, created) = match self.pools.entry(identity) {
            Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
            Entry::Vacant(entry) => {
                let pool = Pool::new(creator, sizing)?;
                entry.insert(Arc::clone(&pool));
                (pool, true)
            }
        };
        // The shard lock is gone by now; filling may take a while.
        if created {
            let opened = pool.fill();
            info!(
                "registered pool {} with {opened}/{} eager connections",
                pool.identity(),
                sizing.min_size
            );
        }
        Ok(pool)
    }

    /// Look up an existing pool.
    #[must_use]
    pub fn get(&self, identity: &ConnectionIdentity) -> Option<Arc<Pool>> {
        self.pools.get(identity).map(|entry| Arc::clone(entry.value()))
    }

    /// Number of registered pools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pools.len()
    }

    /// Whether no pool has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Close every pool and empty the registry.
    pub fn shutdown(&self) {
        let pools: Vec<Arc<Pool>> = self.pools.iter().map(|entry| Arc::clone(entry.value())).collect();
        self.pools.clear();
        for pool in pools {
            pool.close();
        }
    }
}
