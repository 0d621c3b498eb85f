//! Lazy feature stream over a server-side cursor.

use std::fmt;

use log::warn;
use strata_core::{Feature, Value};
use strata_pool::{PooledConnection, ResultCursor};

/// Column position of the feature key in generated queries.
const KEY_COLUMN: usize = 0;
/// Column position of the WKB geometry in generated queries.
const GEOMETRY_COLUMN: usize = 1;
/// Column position of the first requested property.
const FIRST_PROPERTY_COLUMN: usize = 2;

/// Features read one row at a time from a cursor.
///
/// The featureset owns both the cursor and the lease it runs on. When rows
/// run out, a fetch fails, or the featureset is dropped early, the cursor is
/// closed and the lease returned to its pool, once. A failed fetch or close
/// marks the lease broken so the connection is not reused.
pub struct PostgisFeatureset {
    cursor: Box<dyn ResultCursor>,
    lease: Option<PooledConnection>,
    properties: Vec<String>,
    rows_read: i64,
}

impl PostgisFeatureset {
    /// Wrap a cursor produced by a feature query whose property columns are
    /// `properties`, in order.
    #[must_use]
    pub fn new(cursor: Box<dyn ResultCursor>, lease: PooledConnection, properties: Vec<String>) -> Self {
        Self {
            cursor,
            lease: Some(lease),
            properties,
            rows_read: 0,
        }
    }

    /// Whether the cursor has been closed and the lease released.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.lease.is_none()
    }

    fn read_feature(&self) -> Feature {
        let id = self
            .cursor
            .value(KEY_COLUMN)
            .parse_i64()
            .unwrap_or(self.rows_read);
        let geometry = match self.cursor.value(GEOMETRY_COLUMN) {
            Value::Bytes(bytes) => bytes,
            _ => Vec::new(),
        };
        let mut feature = Feature::new(id, geometry);
        for (offset, name) in self.properties.iter().enumerate() {
            let value = self.cursor.value(FIRST_PROPERTY_COLUMN + offset);
            feature.attributes.insert(name.clone(), value);
        }
        feature
    }

    fn finish(&mut self, broken: bool) {
        let Some(mut lease) = self.lease.take() else {
            return;
        };
        if broken {
            lease.mark_broken();
        }
        if let Err(error) = self.cursor.close() {
            warn!("postgis: closing feature cursor failed: {error}");
            lease.mark_broken();
        }
    }
}

impl Iterator for PostgisFeatureset {
    type Item = Feature;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_finished() {
            return None;
        }
        match self.cursor.advance() {
            Ok(true) => {
                self.rows_read += 1;
                Some(self.read_feature())
            }
            Ok(false) => {
                self.finish(false);
                None
            }
            Err(error) => {
                warn!("postgis: fetching features failed after {} rows: {error}", self.rows_read);
                self.finish(true);
                None
            }
        }
    }
}

impl Drop for PostgisFeatureset {
    fn drop(&mut self) {
        self.finish(false);
    }
}

impl fmt::Debug for PostgisFeatureset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgisFeatureset")
            .field("properties", &self.properties)
            .field("rows_read", &self.rows_read)
            .field("finished", &self.is_finished())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use std::sync::Arc;
    use strata_pool::test_support::{ScriptedBackend, ScriptedRows};
    use strata_pool::{ConnectionIdentity, CursorMode, Pool, PoolSizing};

    use crate::types::oid;

    fn rows() -> ScriptedRows {
        ScriptedRows::new()
            .column("gid", oid::INT4, Some(4))
            .column("geom", oid::BYTEA, None)
            .column("name", oid::VARCHAR, None)
            .row([Value::Integer(10), Value::Bytes(vec![1, 2]), Value::from("High Street")])
            .row([Value::Null, Value::Null, Value::Null])
    }

    #[fixture]
    fn backend() -> ScriptedBackend {
        ScriptedBackend::new(ConnectionIdentity::new("db", "gis", "render"))
            .with_rows("from roads", rows())
            .with_rows("from broken", rows().fail_after(1))
    }

    fn open(backend: &ScriptedBackend, pool: &Arc<Pool>, table: &str) -> PostgisFeatureset {
        let mut lease = pool.borrow().expect("connection");
        let cursor = lease
            .execute(&format!("select gid, geom, name from {table}"), CursorMode::Server { fetch_size: 1 })
            .expect("scripted rows");
        assert_eq!(backend.cursors_closed(), 0);
        PostgisFeatureset::new(cursor, lease, vec!["name".to_owned()])
    }

    fn pool(backend: &ScriptedBackend) -> Arc<Pool> {
        Pool::new(Arc::new(backend.clone()), PoolSizing::new(0, 1)).expect("valid sizing")
    }

    #[rstest]
    fn reads_rows_then_releases_the_lease(backend: ScriptedBackend) {
        let pool = pool(&backend);
        let mut features = open(&backend, &pool, "roads");

        let first = features.next().expect("first feature");
        assert_eq!(first.id, 10);
        assert_eq!(first.geometry, vec![1, 2]);
        assert_eq!(first.attribute("name"), Some(&Value::from("High Street")));

        let second = features.next().expect("second feature");
        assert_eq!(second.id, 2, "row number stands in for a missing key");
        assert!(second.geometry.is_empty());
        assert_eq!(second.attribute("name"), Some(&Value::Null));

        assert!(features.next().is_none());
        assert!(features.is_finished());
        assert_eq!(pool.stats().borrowed, 0);
        assert_eq!(pool.stats().idle, 1);
        assert_eq!(backend.cursors_closed(), 1);
        assert!(features.next().is_none());
        assert_eq!(backend.cursors_closed(), 1);
    }

    #[rstest]
    fn fetch_failure_discards_the_connection(backend: ScriptedBackend) {
        let pool = pool(&backend);
        let mut features = open(&backend, &pool, "broken");
        assert!(features.next().is_some());
        assert!(features.next().is_none());
        assert_eq!(pool.stats().borrowed, 0);
        assert_eq!(pool.stats().idle, 0);
        assert_eq!(backend.cursors_closed(), 1);
    }

    #[rstest]
    fn dropping_early_closes_and_releases(backend: ScriptedBackend) {
        let pool = pool(&backend);
        let mut features = open(&backend, &pool, "roads");
        assert!(features.next().is_some());
        drop(features);
        assert_eq!(backend.cursors_closed(), 1);
        assert_eq!(pool.stats().borrowed, 0);
        assert_eq!(pool.stats().idle, 1);
    }
}
