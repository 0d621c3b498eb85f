//! Facade crate for the Strata PostGIS feature connector.
//!
//! This crate re-exports the core domain types, the connection pool and the
//! PostGIS datasource. The bundled `postgres` driver sits behind the
//! `backend-postgres` feature.

#![forbid(unsafe_code)]

pub use strata_core::{
    AttributeDescriptor, AttributeType, Datasource, DatasourceKind, Degradation, Feature,
    Featureset, LayerDescriptor, ParameterError, Parameters, Query, QueryError, Value,
};

pub use strata_pool::{
    BackendError, Connection, ConnectionCreator, ConnectionIdentity, CursorMode, Pool, PoolError,
    PoolManager, PoolSizing, PoolStats, PooledConnection, ResultCursor,
};

pub use strata_postgis::{DatasourceError, Diagnostic, Diagnostics, PostgisDatasource, PostgisFeatureset};

#[cfg(feature = "backend-postgres")]
pub use strata_postgis::PgConnectionCreator;

#[cfg(feature = "test-support")]
pub use strata_core::test_support::MemoryDatasource;
#[cfg(feature = "test-support")]
pub use strata_pool::test_support::{ScriptedBackend, ScriptedRows};
