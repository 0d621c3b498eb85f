//! Datasource parameters layered from a JSON file and `--param` flags.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use serde_json::Value as Json;
use strata_core::Parameters;

use crate::{ARG_CONFIG, ARG_PARAM, CliError};

/// Arguments naming the layer to open.
#[derive(Debug, Clone, Default, Args)]
pub(crate) struct LayerArgs {
    /// JSON object of datasource parameters.
    #[arg(long = ARG_CONFIG, value_name = "path")]
    pub(crate) config: Option<Utf8PathBuf>,
    /// Datasource parameter, repeatable; overrides the configuration file.
    #[arg(long = ARG_PARAM, value_name = "key=value", value_parser = parse_param)]
    pub(crate) params: Vec<(String, String)>,
}

impl LayerArgs {
    /// Merge the configuration file, if any, with the flags.
    pub(crate) fn parameters(&self) -> Result<Parameters, CliError> {
        let mut params = match &self.config {
            Some(path) => load_parameters(path)?,
            None => Parameters::new(),
        };
        params.merge(self.params.iter().cloned().collect());
        Ok(params)
    }
}

/// Read a flat JSON object into [`Parameters`].
///
/// Numbers and booleans are kept in their JSON spelling; `null` leaves the
/// parameter unset.
pub(crate) fn load_parameters(path: &Utf8Path) -> Result<Parameters, CliError> {
    let text = fs::read_to_string(path).map_err(|source| CliError::ReadConfig {
        path: path.to_path_buf(),
        source,
    })?;
    let document: serde_json::Map<String, Json> =
        serde_json::from_str(&text).map_err(|source| CliError::ParseConfig {
            path: path.to_path_buf(),
            source,
        })?;
    document
        .into_iter()
        .map(|(key, value)| match value {
            Json::String(text) => Ok((key, text)),
            Json::Number(number) => Ok((key, number.to_string())),
            Json::Bool(flag) => Ok((key, flag.to_string())),
            Json::Null => Ok((key, String::new())),
            Json::Array(_) | Json::Object(_) => Err(CliError::ConfigValue {
                path: path.to_path_buf(),
                key,
            }),
        })
        .collect()
}

/// Parse a `key=value` flag. The value may itself contain `=`.
pub(crate) fn parse_param(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, found `{raw}`"))?;
    let name = key.trim();
    if name.is_empty() {
        return Err(format!("parameter name missing in `{raw}`"));
    }
    Ok((name.to_owned(), value.to_owned()))
}
