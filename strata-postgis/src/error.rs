//! Error types for the PostGIS datasource.

use strata_core::ParameterError;
use strata_pool::{BackendError, PoolError};
use thiserror::Error;

/// Errors raised while constructing or querying a [`PostgisDatasource`].
///
/// Backend unavailability is not an error: construction falls back to
/// defaults with diagnostics, and queries return a degraded, empty
/// featureset.
///
/// [`PostgisDatasource`]: crate::PostgisDatasource
#[derive(Debug, Error)]
pub enum DatasourceError {
    /// The parameters are incomplete or malformed.
    #[error(transparent)]
    Parameters(#[from] ParameterError),
    /// The pool could not be created with the configured sizing.
    #[error(transparent)]
    Pool(#[from] PoolError),
    /// Neither the configuration nor the catalog named a geometry column.
    #[error("layer `{layer}` has no geometry column; set `geometry_field`")]
    MissingGeometryColumn {
        /// Layer name.
        layer: String,
    },
    /// The backend rejected the feature query.
    #[error("feature query failed: {source}\n  sql: {sql}")]
    Query {
        /// Statement sent to the backend.
        sql: String,
        /// Backend failure.
        #[source]
        source: BackendError,
    },
}
