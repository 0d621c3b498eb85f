//! PostGIS vector datasource.
//!
//! [`PostgisDatasource`] turns flat parameters into a layer: it registers a
//! connection pool for the server, introspects the table once (geometry
//! column, SRID, estimated extent, attribute schema), and answers
//! rectangular queries with a lazy [`PostgisFeatureset`] streamed from a
//! server-side cursor.
//!
//! The database is reached through the `strata-pool` backend traits, so the
//! same datasource runs against the bundled `postgres` driver (feature
//! `backend-postgres`) or any other [`ConnectionCreator`].
//!
//! [`ConnectionCreator`]: strata_pool::ConnectionCreator

#![forbid(unsafe_code)]

mod backend;
mod datasource;
mod diagnostics;
mod error;
mod featureset;
mod introspect;
mod settings;
mod sql;
mod types;

#[cfg(feature = "backend-postgres")]
pub use backend::PgConnectionCreator;
pub use datasource::{NAME, PostgisDatasource};
pub use diagnostics::{Diagnostic, Diagnostics};
pub use error::DatasourceError;
pub use featureset::PostgisFeatureset;
pub use settings::{DEFAULT_CURSOR_SIZE, DEFAULT_INITIAL_SIZE, DEFAULT_MAX_SIZE, PostgisSettings};
pub use sql::{FeatureSql, quote_identifier, quote_literal, table_from_sql};
pub use types::{ColumnMapping, DEFAULT_GEOMETRY_OID, attribute_type, map_column, oid};
