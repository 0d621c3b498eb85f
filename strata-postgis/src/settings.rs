//! Typed view of the datasource parameters.

use std::fmt;
use std::time::Duration;

use geo::{Coord, Rect};
use strata_core::{ParameterError, Parameters};
use strata_pool::{ConnectionIdentity, PoolSizing};

/// Default number of rows fetched per cursor round trip.
pub const DEFAULT_CURSOR_SIZE: usize = 200;
/// Default eager pool size.
pub const DEFAULT_INITIAL_SIZE: usize = 10;
/// Default pool capacity.
pub const DEFAULT_MAX_SIZE: usize = 20;

/// Connection and layer settings for a PostGIS datasource.
///
/// Only `table` is required; every other key falls back to a default.
#[derive(Clone, PartialEq)]
pub struct PostgisSettings {
    /// Table name or parenthesised sub-select.
    pub table: String,
    /// Layer name; defaults to `table`.
    pub name: String,
    /// Server host.
    pub host: String,
    /// Server port; the driver default when absent.
    pub port: Option<u16>,
    /// Database name.
    pub dbname: String,
    /// Login role.
    pub user: String,
    /// Login password. Never part of the pool identity or `Debug` output.
    pub password: Option<String>,
    /// Geometry column overriding the catalog.
    pub geometry_field: Option<String>,
    /// Column holding feature identifiers.
    pub key_field: String,
    /// SRID overriding the catalog.
    pub srid: Option<i32>,
    /// Extent overriding estimation.
    pub extent: Option<Rect<f64>>,
    /// Whether to ask the server for an estimated extent.
    pub estimate_extent: bool,
    /// Rows fetched per cursor round trip.
    pub cursor_size: usize,
    /// Pool sizing for the connection identity.
    pub pool: PoolSizing,
    /// Bound on connection establishment.
    pub connect_timeout: Option<Duration>,
}

impl PostgisSettings {
    /// Read settings from flat parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError::Missing`] without a `table`, and
    /// [`ParameterError::Invalid`] for values that do not parse.
    pub fn from_parameters(params: &Parameters) -> Result<Self, ParameterError> {
        let table = params.require("table")?.to_owned();
        let cursor_size = params.parse::<usize>("cursor_size")?.unwrap_or(DEFAULT_CURSOR_SIZE);
        if cursor_size == 0 {
            return Err(invalid("cursor_size", "0", "must be at least 1"));
        }
        let extent = params
            .get("extent")
            .map(|raw| parse_extent(raw).ok_or_else(|| invalid("extent", raw, "expected minx,miny,maxx,maxy")))
            .transpose()?;
        Ok(Self {
            name: params.get_or("name", &table).to_owned(),
            host: params.get_or("host", "localhost").to_owned(),
            port: params.parse("port")?,
            dbname: params.get_or("dbname", "").to_owned(),
            user: params.get_or("user", "").to_owned(),
            password: params.get("password").map(str::to_owned),
            geometry_field: params.get("geometry_field").map(str::to_owned),
            key_field: params.get_or("key_field", "gid").to_owned(),
            srid: params.parse("srid")?,
            extent,
            estimate_extent: params.flag("estimate_extent")?.unwrap_or(true),
            cursor_size,
            pool: PoolSizing::new(
                params.parse("initial_size")?.unwrap_or(DEFAULT_INITIAL_SIZE),
                params.parse("max_size")?.unwrap_or(DEFAULT_MAX_SIZE),
            ),
            connect_timeout: params.parse::<u64>("connect_timeout")?.map(Duration::from_secs),
            table,
        })
    }

    /// Pool key for these settings.
    #[must_use]
    pub fn identity(&self) -> ConnectionIdentity {
        let identity = ConnectionIdentity::new(&*self.host, &*self.dbname, &*self.user);
        match self.port {
            Some(port) => identity.with_port(port),
            None => identity,
        }
    }
}

impl fmt::Debug for PostgisSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgisSettings")
            .field("table", &self.table)
            .field("name", &self.name)
            .field("identity", &self.identity())
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("geometry_field", &self.geometry_field)
            .field("key_field", &self.key_field)
            .field("srid", &self.srid)
            .field("extent", &self.extent)
            .field("estimate_extent", &self.estimate_extent)
            .field("cursor_size", &self.cursor_size)
            .field("pool", &self.pool)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

fn invalid(name: &str, value: &str, reason: &str) -> ParameterError {
    ParameterError::Invalid {
        name: name.to_owned(),
        value: value.to_owned(),
        reason: reason.to_owned(),
    }
}

/// Parse `minx,miny,maxx,maxy` into a rectangle of finite coordinates.
fn parse_extent(raw: &str) -> Option<Rect<f64>> {
    let values: Vec<f64> = raw
        .split(',')
        .map(|part| part.trim().parse::<f64>().ok().filter(|value| value.is_finite()))
        .collect::<Option<_>>()?;
    let [minx, miny, maxx, maxy] = <[f64; 4]>::try_from(values).ok()?;
    Some(Rect::new(Coord { x: minx, y: miny }, Coord { x: maxx, y: maxy }))
}
