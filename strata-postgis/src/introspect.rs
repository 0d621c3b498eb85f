//! Schema, SRID and extent discovery for a configured table.
//!
//! Each step uses defaults when the server cannot answer and records why in
//! [`Diagnostics`]. Parameter overrides always beat what the catalog says.

use std::collections::BTreeSet;

use geo::{Coord, Rect};
use log::debug;
use strata_core::{AttributeType, LayerDescriptor, Value};
use strata_pool::{BackendError, Connection, CursorMode, ResultCursor};

use crate::diagnostics::Diagnostics;
use crate::settings::PostgisSettings;
use crate::sql::{GEOMETRY_TYPE_SQL, catalog_sql, extent_sql, nullability_sql, probe_sql, table_from_sql};
use crate::types::{DEFAULT_GEOMETRY_OID, map_column};

/// Everything learned about a layer at construction.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Introspection {
    pub(crate) geometry_oid: u32,
    pub(crate) geometry_field: Option<String>,
    pub(crate) srid: Option<i32>,
    pub(crate) extent: Option<Rect<f64>>,
    pub(crate) descriptor: LayerDescriptor,
    /// Columns of unrecognised type, fetched as text.
    pub(crate) text_columns: BTreeSet<String>,
}

impl Introspection {
    /// What is known without a connection: the parameter overrides only.
    pub(crate) fn from_settings(settings: &PostgisSettings) -> Self {
        let mut descriptor = LayerDescriptor::new(settings.name.clone());
        descriptor.srid = settings.srid;
        Self {
            geometry_oid: DEFAULT_GEOMETRY_OID,
            geometry_field: settings.geometry_field.clone(),
            srid: settings.srid,
            extent: settings.extent,
            descriptor,
            text_columns: BTreeSet::new(),
        }
    }

    /// Run every discovery step over `conn`.
    pub(crate) fn discover(conn: &mut dyn Connection, settings: &PostgisSettings, diagnostics: &mut Diagnostics) -> Self {
        let mut found = Self::from_settings(settings);
        let table = table_from_sql(&settings.table);
        found.resolve_geometry_oid(conn, diagnostics);
        if found.geometry_field.is_none() || found.srid.is_none() {
            found.read_catalog(conn, &table, diagnostics);
        }
        let not_null = read_not_null(conn, &table, diagnostics);
        found.probe_columns(conn, settings, &not_null, diagnostics);
        if found.extent.is_none() && settings.estimate_extent {
            found.estimate_extent(conn, &table, diagnostics);
        }
        found.descriptor.srid = found.srid;
        found
    }

    fn resolve_geometry_oid(&mut self, conn: &mut dyn Connection, diagnostics: &mut Diagnostics) {
        match first_row(conn, GEOMETRY_TYPE_SQL, |row| row.value(0)) {
            Ok(Some(value)) => match value.parse_i64().and_then(|oid| u32::try_from(oid).ok()) {
                Some(oid) => self.geometry_oid = oid,
                None => diagnostics.record(
                    "geometry_type",
                    format!("unreadable type identifier {value}; assuming {DEFAULT_GEOMETRY_OID}"),
                ),
            },
            Ok(None) => diagnostics.record(
                "geometry_type",
                format!("type `geometry` is not installed; assuming {DEFAULT_GEOMETRY_OID}"),
            ),
            Err(error) => diagnostics.record("geometry_type", format!("{error}; assuming {DEFAULT_GEOMETRY_OID}")),
        }
    }

    fn read_catalog(&mut self, conn: &mut dyn Connection, table: &str, diagnostics: &mut Diagnostics) {
        let row = first_row(conn, &catalog_sql(table), |row| {
            (
                row.value_by_name("f_geometry_column"),
                row.value_by_name("srid"),
                row.value_by_name("type"),
            )
        });
        let (column, srid, kind) = match row {
            Ok(Some(values)) => values,
            Ok(None) => {
                diagnostics.record("geometry_columns", format!("no entry for table `{table}`"));
                return;
            }
            Err(error) => {
                diagnostics.record("geometry_columns", error.to_string());
                return;
            }
        };
        debug!("postgis: catalog lists {table}.{column} as {kind}");
        if self.geometry_field.is_none() {
            self.geometry_field = column.as_str().map(str::to_owned);
        }
        if self.srid.is_none() {
            self.srid = parse_srid(&srid, diagnostics);
        }
    }

    fn estimate_extent(&mut self, conn: &mut dyn Connection, table: &str, diagnostics: &mut Diagnostics) {
        let Some(geometry_field) = self.geometry_field.as_deref() else {
            diagnostics.record("extent", "no geometry column to estimate from");
            return;
        };
        let bounds = first_row(conn, &extent_sql(table, geometry_field), |row| {
            [0, 1, 2, 3].map(|index| row.value(index).parse_f64())
        });
        match bounds {
            Ok(Some([Some(minx), Some(miny), Some(maxx), Some(maxy)])) => {
                self.extent = Some(Rect::new(Coord { x: minx, y: miny }, Coord { x: maxx, y: maxy }));
            }
            Ok(_) => diagnostics.record("extent", "estimated extent is missing or not numeric"),
            Err(error) => diagnostics.record("extent", error.to_string()),
        }
    }

    fn probe_columns(
        &mut self,
        conn: &mut dyn Connection,
        settings: &PostgisSettings,
        not_null: &BTreeSet<String>,
        diagnostics: &mut Diagnostics,
    ) {
        let mut cursor = match conn.execute(&probe_sql(&settings.table), CursorMode::Eager) {
            Ok(cursor) => cursor,
            Err(error) => {
                diagnostics.record("probe", error.to_string());
                return;
            }
        };
        for index in 0..cursor.field_count() {
            let Some(name) = cursor.field_name(index) else {
                continue;
            };
            let type_id = cursor.field_type_id(index).unwrap_or_default();
            let mapping = map_column(name, type_id, cursor.field_length(index), self.geometry_oid);
            if mapping.unknown {
                diagnostics.record(name, format!("unknown type identifier {type_id}; treated as string"));
                self.text_columns.insert(name.to_owned());
            }
            self.descriptor.push(mapping.descriptor.with_nullable(!not_null.contains(name)));
        }
        close(cursor.as_mut(), "probe", diagnostics);

        if self.descriptor.attributes.is_empty() {
            return;
        }
        if self.descriptor.attribute(&settings.key_field).is_none() {
            diagnostics.record(
                "key_field",
                format!("column `{}` not found; row numbers will be used", settings.key_field),
            );
        }
        if self.geometry_field.is_none() {
            self.geometry_field = self.descriptor.geometry_attribute().map(|attribute| attribute.name.clone());
            if let Some(column) = &self.geometry_field {
                debug!("postgis: using probed geometry column {column}");
            }
        }
        if let Some(column) = &self.geometry_field
            && self
                .descriptor
                .attribute(column)
                .is_none_or(|attribute| attribute.kind != AttributeType::Geometry)
        {
            diagnostics.record("geometry_field", format!("column `{column}` is not a geometry column"));
        }
    }
}

/// Execute `sql`, apply `read` to the first row, and close the cursor.
fn first_row<T>(
    conn: &mut dyn Connection,
    sql: &str,
    read: impl FnOnce(&dyn ResultCursor) -> T,
) -> Result<Option<T>, BackendError> {
    let mut cursor = conn.execute(sql, CursorMode::Eager)?;
    let found = cursor
        .advance()
        .map(|has_row| has_row.then(|| read(cursor.as_ref())));
    let closed = cursor.close();
    let row = found?;
    closed?;
    Ok(row)
}

fn close(cursor: &mut dyn ResultCursor, step: &str, diagnostics: &mut Diagnostics) {
    if let Err(error) = cursor.close() {
        diagnostics.record(step, error.to_string());
    }
}

/// Names of the columns declared `NOT NULL`. An unreadable schema leaves
/// every column nullable.
fn read_not_null(conn: &mut dyn Connection, table: &str, diagnostics: &mut Diagnostics) -> BTreeSet<String> {
    let mut not_null = BTreeSet::new();
    let mut cursor = match conn.execute(&nullability_sql(table), CursorMode::Eager) {
        Ok(cursor) => cursor,
        Err(error) => {
            diagnostics.record("nullability", error.to_string());
            return not_null;
        }
    };
    loop {
        match cursor.advance() {
            Ok(true) => {}
            Ok(false) => break,
            Err(error) => {
                diagnostics.record("nullability", error.to_string());
                break;
            }
        }
        let (name, nullable) = (cursor.value(0), cursor.value(1));
        if let (Some(name), Some("NO")) = (name.as_str(), nullable.as_str()) {
            not_null.insert(name.to_owned());
        }
    }
    close(cursor.as_mut(), "nullability", diagnostics);
    not_null
}

/// Read a catalog SRID; zero and negative values mean "unknown".
fn parse_srid(value: &Value, diagnostics: &mut Diagnostics) -> Option<i32> {
    if value.is_null() {
        return None;
    }
    match value.parse_i64().map(i32::try_from) {
        Some(Ok(srid)) if srid > 0 => Some(srid),
        Some(Ok(_)) => None,
        Some(Err(_)) | None => {
            diagnostics.record("srid", format!("catalog SRID {value} is not a valid integer"));
            None
        }
    }
}
