//! The PostGIS [`Datasource`] implementation.

use std::sync::Arc;

use geo::Rect;
use log::{debug, warn};
use strata_core::{Datasource, DatasourceKind, Degradation, Featureset, LayerDescriptor, Parameters, Query};
use strata_pool::{ConnectionCreator, CursorMode, Pool, PoolError, PoolManager};

use crate::diagnostics::Diagnostics;
use crate::error::DatasourceError;
use crate::featureset::PostgisFeatureset;
use crate::introspect::Introspection;
use crate::settings::PostgisSettings;
use crate::sql::FeatureSql;

/// Name under which a host registers this datasource.
pub const NAME: &str = "postgis";

/// Vector features from a PostGIS table or sub-select.
///
/// Construction introspects the layer once, on a pooled connection that is
/// released before the constructor returns. Every later query borrows from
/// the same pool.
#[derive(Debug)]
pub struct PostgisDatasource {
    settings: PostgisSettings,
    pool: Arc<Pool>,
    introspection: Introspection,
    diagnostics: Diagnostics,
}

impl PostgisDatasource {
    /// Build a datasource connecting with the `postgres` driver.
    ///
    /// # Errors
    ///
    /// Returns [`DatasourceError::Parameters`] for bad configuration and
    /// [`DatasourceError::Pool`] for an unusable pool sizing. An unreachable
    /// server is not an error; see [`diagnostics`](Self::diagnostics).
    #[cfg(feature = "backend-postgres")]
    pub fn new(params: &Parameters, pools: &PoolManager) -> Result<Self, DatasourceError> {
        let settings = PostgisSettings::from_parameters(params)?;
        let creator = Arc::new(crate::backend::PgConnectionCreator::new(&settings));
        Self::build(settings, pools, creator)
    }

    /// Build a datasource whose connections come from `creator`.
    ///
    /// The pool is keyed by the creator's identity.
    ///
    /// # Errors
    ///
    /// As for [`PostgisDatasource::new`].
    pub fn with_creator(
        params: &Parameters,
        pools: &PoolManager,
        creator: Arc<dyn ConnectionCreator>,
    ) -> Result<Self, DatasourceError> {
        let settings = PostgisSettings::from_parameters(params)?;
        Self::build(settings, pools, creator)
    }

    fn build(
        settings: PostgisSettings,
        pools: &PoolManager,
        creator: Arc<dyn ConnectionCreator>,
    ) -> Result<Self, DatasourceError> {
        let pool = pools.register(creator, settings.pool)?;
        let mut diagnostics = Diagnostics::default();
        let introspection = match pool.borrow() {
            Ok(mut lease) => Introspection::discover(&mut *lease, &settings, &mut diagnostics),
            Err(error) => {
                diagnostics.record("connection", error.to_string());
                Introspection::from_settings(&settings)
            }
        };
        debug!(
            "postgis: layer {} ready with {} attributes and {} diagnostics",
            settings.name,
            introspection.descriptor.attributes.len(),
            diagnostics.len()
        );
        Ok(Self {
            settings,
            pool,
            introspection,
            diagnostics,
        })
    }

    /// Problems recovered from during construction.
    #[must_use]
    pub const fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Effective settings.
    #[must_use]
    pub const fn settings(&self) -> &PostgisSettings {
        &self.settings
    }

    /// Pool shared by every datasource with the same identity.
    #[must_use]
    pub const fn pool(&self) -> &Arc<Pool> {
        &self.pool
    }

    /// Geometry column used in spatial predicates.
    #[must_use]
    pub fn geometry_field(&self) -> Option<&str> {
        self.introspection.geometry_field.as_deref()
    }

    /// SRID tagging every spatial predicate; `None` when unknown.
    #[must_use]
    pub const fn srid(&self) -> Option<i32> {
        self.introspection.srid
    }

    /// The statement [`features`](Datasource::features) would run for
    /// `query`.
    ///
    /// Requested properties the layer does not have are left out when the
    /// schema is known. A key column missing from a known schema is
    /// replaced by `NULL`, so features are numbered by row instead.
    ///
    /// # Errors
    ///
    /// Returns [`DatasourceError::MissingGeometryColumn`] when no geometry
    /// column is known.
    pub fn feature_sql(&self, query: &Query) -> Result<(String, Vec<String>), DatasourceError> {
        let geometry_field = self
            .geometry_field()
            .ok_or_else(|| DatasourceError::MissingGeometryColumn {
                layer: self.settings.name.clone(),
            })?;
        let properties = self.selectable_properties(query);
        let sql = FeatureSql {
            table_spec: &self.settings.table,
            key_field: self.key_field(),
            geometry_field,
            srid: self.srid(),
            text_columns: &self.introspection.text_columns,
        }
        .build(query.bbox(), properties.iter().map(String::as_str));
        Ok((sql, properties))
    }

    fn key_field(&self) -> Option<&str> {
        let descriptor = &self.introspection.descriptor;
        let key = self.settings.key_field.as_str();
        (descriptor.attributes.is_empty() || descriptor.attribute(key).is_some()).then_some(key)
    }

    fn selectable_properties(&self, query: &Query) -> Vec<String> {
        let descriptor = &self.introspection.descriptor;
        query
            .property_names()
            .iter()
            .filter(|name| {
                let known = descriptor.attributes.is_empty() || descriptor.attribute(name).is_some();
                if !known {
                    warn!("postgis: layer {} has no attribute `{name}`; skipping it", descriptor.name);
                }
                known
            })
            .cloned()
            .collect()
    }

    fn degraded(&self, error: &PoolError) -> Option<Featureset> {
        let degradation = match error {
            PoolError::Unavailable { identity, .. } => Degradation::PoolExhausted {
                pool: identity.clone(),
            },
            PoolError::Connect { .. } | PoolError::Closed { .. } => Degradation::ConnectionFailed {
                reason: error.to_string(),
            },
            PoolError::InvalidSizing { .. } => return None,
        };
        warn!("postgis: layer {} returns no features: {degradation}", self.settings.name);
        Some(Featureset::degraded(degradation))
    }
}

impl Datasource for PostgisDatasource {
    type Error = DatasourceError;

    fn name(&self) -> &'static str {
        NAME
    }

    fn kind(&self) -> DatasourceKind {
        DatasourceKind::Vector
    }

    fn descriptor(&self) -> &LayerDescriptor {
        &self.introspection.descriptor
    }

    fn envelope(&self) -> Option<Rect<f64>> {
        self.introspection.extent
    }

    fn features(&self, query: &Query) -> Result<Featureset, Self::Error> {
        let (sql, properties) = self.feature_sql(query)?;
        let mut lease = match self.pool.borrow() {
            Ok(lease) => lease,
            Err(error) => return self.degraded(&error).ok_or_else(|| DatasourceError::Pool(error)),
        };
        debug!("postgis: {sql}");
        let mode = CursorMode::Server {
            fetch_size: self.settings.cursor_size,
        };
        let source = match lease.execute(&sql, mode) {
            Ok(cursor) => return Ok(Featureset::new(PostgisFeatureset::new(cursor, lease, properties))),
            Err(source) => source,
        };
        if lease.is_healthy() {
            return Err(DatasourceError::Query { sql, source });
        }
        lease.mark_broken();
        let degradation = Degradation::ConnectionFailed {
            reason: source.to_string(),
        };
        warn!("postgis: layer {} returns no features: {degradation}", self.settings.name);
        Ok(Featureset::degraded(degradation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Coord;
    use rstest::{fixture, rstest};
    use strata_core::{AttributeType, Value};
    use strata_pool::ConnectionIdentity;
    use strata_pool::test_support::{ScriptedBackend, ScriptedRows};

    use crate::types::{DEFAULT_GEOMETRY_OID, oid};

    #[fixture]
    fn backend() -> ScriptedBackend {
        ScriptedBackend::new(ConnectionIdentity::new("db", "gis", "render"))
            .with_rows(
                "geometry_columns",
                ScriptedRows::new()
                    .column("f_geometry_column", oid::VARCHAR, None)
                    .column("srid", oid::INT4, Some(4))
                    .column("type", oid::VARCHAR, None)
                    .row([Value::from("way"), Value::Integer(4326), Value::from("POINT")]),
            )
            .with_rows(
                "limit 1",
                ScriptedRows::new()
                    .column("gid", oid::INT4, Some(4))
                    .column("way", DEFAULT_GEOMETRY_OID, None)
                    .column("name", oid::VARCHAR, None),
            )
            .with_rows(
                "ST_MakeEnvelope",
                ScriptedRows::new()
                    .column("gid", oid::INT4, Some(4))
                    .column("geom", oid::BYTEA, None)
                    .column("name", oid::VARCHAR, None)
                    .row([Value::Integer(1), Value::Bytes(vec![0x01]), Value::from("Mill Lane")])
                    .row([Value::Integer(2), Value::Bytes(vec![0x01]), Value::from("Bridge Road")]),
            )
    }

    fn params() -> Parameters {
        Parameters::new()
            .with("table", "roads")
            .with("initial_size", "1")
            .with("max_size", "1")
            .with("estimate_extent", "false")
    }

    fn datasource(backend: &ScriptedBackend, pools: &PoolManager, params: &Parameters) -> PostgisDatasource {
        PostgisDatasource::with_creator(params, pools, Arc::new(backend.clone())).expect("datasource")
    }

    fn query() -> Query {
        Query::new(Rect::new(Coord { x: -1.0, y: -1.0 }, Coord { x: 1.0, y: 1.0 }))
            .expect("finite bbox")
            .with_property("name")
    }

    #[rstest]
    fn construction_introspects_and_returns_the_connection(backend: ScriptedBackend) {
        let pools = PoolManager::new();
        let source = datasource(&backend, &pools, &params());
        assert_eq!(source.name(), "postgis");
        assert_eq!(source.kind(), DatasourceKind::Vector);
        assert_eq!(source.geometry_field(), Some("way"));
        assert_eq!(source.srid(), Some(4326));
        assert_eq!(
            source.descriptor().attribute("way").map(|attribute| attribute.kind),
            Some(AttributeType::Geometry)
        );
        assert_eq!(source.pool().stats().borrowed, 0);
        assert_eq!(source.pool().stats().idle, 1);
    }

    #[rstest]
    fn features_stream_requested_attributes(backend: ScriptedBackend) {
        let pools = PoolManager::new();
        let source = datasource(&backend, &pools, &params());
        let features = source.features(&query()).expect("query runs");
        assert!(!features.is_degraded());
        let names: Vec<_> = features
            .map(|feature| (feature.id, feature.attribute("name").cloned()))
            .collect();
        assert_eq!(
            names,
            vec![
                (1, Some(Value::from("Mill Lane"))),
                (2, Some(Value::from("Bridge Road"))),
            ]
        );
        assert_eq!(source.pool().stats().borrowed, 0);
        let sql = backend.executed().pop().expect("feature query");
        assert!(sql.ends_with("ST_MakeEnvelope(-1, -1, 1, 1, 4326)"), "{sql}");
    }

    #[rstest]
    fn unknown_properties_are_not_selected(backend: ScriptedBackend) {
        let pools = PoolManager::new();
        let source = datasource(&backend, &pools, &params());
        let (sql, properties) = source
            .feature_sql(&query().with_property("no_such_column"))
            .expect("geometry column known");
        assert_eq!(properties, vec!["name".to_owned()]);
        assert!(!sql.contains("no_such_column"));
    }

    #[rstest]
    fn exhausted_pool_degrades_to_empty(backend: ScriptedBackend) {
        let pools = PoolManager::new();
        let source = datasource(&backend, &pools, &params());
        let _held = source.pool().borrow().expect("only connection");
        let features = source.features(&query()).expect("degraded, not failed");
        assert!(matches!(
            features.degradation(),
            Some(Degradation::PoolExhausted { pool }) if pool == "render@db/gis"
        ));
        assert_eq!(features.count(), 0);
    }

    #[rstest]
    fn refused_connection_degrades_to_empty(backend: ScriptedBackend) {
        let pools = PoolManager::new();
        let source = datasource(&backend, &pools, &params());
        backend.break_existing_connections();
        backend.refuse_connections(true);
        let features = source.features(&query()).expect("degraded, not failed");
        assert!(matches!(
            features.degradation(),
            Some(Degradation::ConnectionFailed { .. })
        ));
    }

    #[rstest]
    fn unreachable_server_still_builds_from_parameters() {
        let backend = ScriptedBackend::new(ConnectionIdentity::new("db", "gis", "render"));
        backend.refuse_connections(true);
        let pools = PoolManager::new();
        let overrides = params().with("geometry_field", "geom").with("srid", "3857");
        let source = datasource(&backend, &pools, &overrides);
        assert!(source.diagnostics().mentions("connection"));
        assert_eq!(source.geometry_field(), Some("geom"));
        assert_eq!(source.srid(), Some(3857));
        assert!(source.descriptor().attributes.is_empty());
    }

    #[rstest]
    fn missing_geometry_column_is_an_error() {
        let backend = ScriptedBackend::new(ConnectionIdentity::new("db", "gis", "render"));
        let pools = PoolManager::new();
        let source = datasource(&backend, &pools, &params());
        let result = source.features(&query());
        assert!(matches!(result, Err(DatasourceError::MissingGeometryColumn { .. })));
    }

    #[rstest]
    fn rejected_sql_is_reported_and_the_connection_returned(backend: ScriptedBackend) {
        backend.fail("ST_AsBinary", "column \"way\" does not exist");
        let pools = PoolManager::new();
        let source = datasource(&backend, &pools, &params());
        let result = source.features(&query());
        assert!(matches!(result, Err(DatasourceError::Query { ref sql, .. }) if sql.contains("ST_AsBinary")));
        assert_eq!(source.pool().stats().borrowed, 0);
    }

    #[rstest]
    fn connection_lost_during_the_query_degrades_and_is_discarded(backend: ScriptedBackend) {
        let pools = PoolManager::new();
        let source = datasource(&backend, &pools, &params());
        backend.disconnect_on("ST_AsBinary", "server closed the connection unexpectedly");
        let features = source.features(&query()).expect("degraded, not failed");
        assert!(matches!(
            features.degradation(),
            Some(Degradation::ConnectionFailed { reason }) if reason.contains("server closed")
        ));
        assert_eq!(features.count(), 0);
        let stats = source.pool().stats();
        assert_eq!((stats.borrowed, stats.idle), (0, 0));
    }

    #[rstest]
    fn missing_key_column_is_replaced_by_row_numbers(#[from(backend)] scripted: ScriptedBackend) {
        let backend = scripted.with_rows(
            "limit 1",
            ScriptedRows::new()
                .column("osm_id", oid::INT8, Some(8))
                .column("way", DEFAULT_GEOMETRY_OID, None)
                .column("name", oid::VARCHAR, None),
        );
        let pools = PoolManager::new();
        let source = datasource(&backend, &pools, &params());
        assert!(source.diagnostics().mentions("key_field"));
        let bbox = Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 10.0, y: 10.0 });
        let (sql, _) = source
            .feature_sql(&Query::new(bbox).expect("finite bbox").with_property("name"))
            .expect("geometry column known");
        assert_eq!(
            sql,
            "SELECT NULL, ST_AsBinary(\"way\") AS \"geom\", \"name\" \
             FROM roads WHERE \"way\" && ST_MakeEnvelope(0, 0, 10, 10, 4326)"
        );
    }

    #[rstest]
    fn unknown_column_types_are_fetched_as_text(#[from(backend)] scripted: ScriptedBackend) {
        let backend = scripted.with_rows(
            "limit 1",
            ScriptedRows::new()
                .column("gid", oid::INT4, Some(4))
                .column("way", DEFAULT_GEOMETRY_OID, None)
                .column("surveyed", 16, Some(1)),
        );
        let pools = PoolManager::new();
        let source = datasource(&backend, &pools, &params());
        let (sql, _) = source
            .feature_sql(&query().with_property("surveyed"))
            .expect("geometry column known");
        assert!(
            sql.starts_with("SELECT \"gid\", ST_AsBinary(\"way\") AS \"geom\", \"surveyed\"::text AS \"surveyed\" "),
            "{sql}"
        );
    }

    #[rstest]
    fn layers_on_one_server_share_a_pool(backend: ScriptedBackend) {
        let pools = PoolManager::new();
        let roads = datasource(&backend, &pools, &params());
        let rivers = datasource(&backend, &pools, &params().with("table", "rivers"));
        assert!(Arc::ptr_eq(roads.pool(), rivers.pool()));
        assert_eq!(pools.len(), 1);
    }

    #[rstest]
    fn invalid_pool_sizing_is_fatal(backend: ScriptedBackend) {
        let pools = PoolManager::new();
        let result = PostgisDatasource::with_creator(
            &params().with("initial_size", "5"),
            &pools,
            Arc::new(backend),
        );
        assert!(matches!(result, Err(DatasourceError::Pool(PoolError::InvalidSizing { .. }))));
    }
}
