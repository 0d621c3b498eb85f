//! Command-line interface for inspecting and querying PostGIS layers.
#![forbid(unsafe_code)]

use std::io::Write;

use clap::{Args, Parser, Subcommand};
use geo::{Coord, Rect};
use log::debug;
use strata_core::{Datasource, Parameters, Query};
use strata_pool::PoolManager;
use strata_postgis::PostgisDatasource;

mod config;
mod error;
mod output;

use config::LayerArgs;
pub use error::CliError;

const ARG_CONFIG: &str = "config";
const ARG_PARAM: &str = "param";
const ARG_BBOX: &str = "bbox";
const ARG_PROPERTY: &str = "property";
const ARG_LIMIT: &str = "limit";

/// Run the Strata CLI with the current process arguments.
///
/// # Errors
///
/// Returns [`CliError`] when arguments, configuration, the datasource or
/// writing to stdout fail.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    let pools = PoolManager::new();
    let mut stdout = std::io::stdout().lock();
    let outcome = run_with(cli.command, &PostgresOpener, &pools, &mut stdout);
    pools.shutdown();
    outcome
}

fn run_with(
    command: Command,
    opener: &dyn LayerOpener,
    pools: &PoolManager,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    match command {
        Command::Describe(args) => {
            let layer = opener.open(&args.parameters()?, pools)?;
            output::write_description(writer, &layer)
        }
        Command::Features(args) => {
            let query = args.query()?;
            let layer = opener.open(&args.layer.parameters()?, pools)?;
            debug!("strata: querying {} within {:?}", layer.descriptor().name, query.bbox());
            let featureset = layer.features(&query)?;
            output::write_features(writer, featureset, args.limit)
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "strata",
    about = "Inspect and query PostGIS layers",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the layer's attributes, SRID, extent and diagnostics.
    Describe(LayerArgs),
    /// Print the features intersecting a bounding box.
    Features(FeaturesArgs),
}

/// CLI arguments for the `features` subcommand.
#[derive(Debug, Clone, Args)]
struct FeaturesArgs {
    #[command(flatten)]
    layer: LayerArgs,
    /// Query box as `minx,miny,maxx,maxy` in the layer's SRID.
    #[arg(
        long = ARG_BBOX,
        value_name = "minx,miny,maxx,maxy",
        value_parser = parse_bbox,
        allow_hyphen_values = true
    )]
    bbox: Rect<f64>,
    /// Attribute to include with each feature, repeatable.
    #[arg(long = ARG_PROPERTY, value_name = "name")]
    properties: Vec<String>,
    /// Stop after this many features.
    #[arg(long = ARG_LIMIT, value_name = "count")]
    limit: Option<usize>,
}

impl FeaturesArgs {
    fn query(&self) -> Result<Query, CliError> {
        Ok(Query::new(self.bbox)?.with_properties(self.properties.iter().cloned()))
    }
}

fn parse_bbox(raw: &str) -> Result<Rect<f64>, String> {
    let bounds = raw
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .map_err(|error| format!("`{}` is not a number: {error}", part.trim()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let [minx, miny, maxx, maxy] = bounds.as_slice() else {
        return Err(format!("expected minx,miny,maxx,maxy, found {} values", bounds.len()));
    };
    Ok(Rect::new(
        Coord { x: *minx, y: *miny },
        Coord { x: *maxx, y: *maxy },
    ))
}

/// Opens the datasource a command runs against.
trait LayerOpener {
    fn open(&self, params: &Parameters, pools: &PoolManager) -> Result<PostgisDatasource, CliError>;
}

/// Connects with the bundled `postgres` driver.
struct PostgresOpener;

impl LayerOpener for PostgresOpener {
    #[cfg(feature = "backend-postgres")]
    fn open(&self, params: &Parameters, pools: &PoolManager) -> Result<PostgisDatasource, CliError> {
        Ok(PostgisDatasource::new(params, pools)?)
    }

    #[cfg(not(feature = "backend-postgres"))]
    fn open(&self, _params: &Parameters, _pools: &PoolManager) -> Result<PostgisDatasource, CliError> {
        Err(CliError::MissingFeature {
            feature: "backend-postgres",
            action: "connecting to PostgreSQL",
        })
    }
}

#[cfg(test)]
mod tests;
