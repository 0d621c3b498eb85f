//! Error types emitted by the Strata CLI.
//!
//! Keep this error type reasonably small, as every CLI helper returns
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::io;

use camino::Utf8PathBuf;
use strata_core::QueryError;
use strata_postgis::DatasourceError;
use thiserror::Error;

/// Errors emitted by the Strata CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// The parameter file could not be read.
    #[error("failed to read configuration at {path:?}: {source}")]
    ReadConfig {
        /// Path given with `--config`.
        path: Utf8PathBuf,
        /// Underlying IO failure.
        #[source]
        source: io::Error,
    },
    /// The parameter file is not a JSON object.
    #[error("failed to parse configuration JSON at {path:?}: {source}")]
    ParseConfig {
        /// Path given with `--config`.
        path: Utf8PathBuf,
        /// Decoder failure.
        #[source]
        source: serde_json::Error,
    },
    /// A parameter in the file holds an array or object.
    #[error("configuration key `{key}` in {path:?} must hold a scalar value")]
    ConfigValue {
        /// Path given with `--config`.
        path: Utf8PathBuf,
        /// Offending key.
        key: String,
    },
    /// The requested operation requires a missing compile-time feature.
    #[error("{action} requires the `{feature}` feature to be enabled")]
    MissingFeature {
        /// Cargo feature name.
        feature: &'static str,
        /// What the user asked for.
        action: &'static str,
    },
    /// The bounding box is not usable.
    #[error(transparent)]
    Query(#[from] QueryError),
    /// The datasource rejected its parameters or the query.
    #[error(transparent)]
    Datasource(#[from] DatasourceError),
    /// Serialising command output failed.
    #[error("failed to serialise output: {0}")]
    SerialiseOutput(#[source] serde_json::Error),
    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] io::Error),
}
