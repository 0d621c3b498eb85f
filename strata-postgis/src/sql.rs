//! SQL text built by the PostGIS datasource.
//!
//! Identifiers coming from configuration or a query are always quoted with
//! [`quote_identifier`]; values embedded as literals go through
//! [`quote_literal`]. The table specification itself is trusted
//! configuration and is spliced verbatim, because it may be a sub-select.

use std::collections::BTreeSet;

use geo::Rect;

/// Looks up the type identifier PostGIS registered for `geometry`.
pub const GEOMETRY_TYPE_SQL: &str = "select oid from pg_type where typname = 'geometry'";

/// Extract the bare table name from a table specification.
///
/// A plain name is returned lower-cased. For a sub-select such as
/// `(select * from Roads where kind = 'a') as r` the word following the last
/// `from` keyword is returned, stopping at whitespace or a closing
/// parenthesis. Quoted identifiers containing spaces are not supported.
///
/// # Examples
///
/// ```
/// use strata_postgis::table_from_sql;
///
/// assert_eq!(table_from_sql("Roads"), "roads");
/// assert_eq!(table_from_sql("(select * from   Planet_OSM_Line) as l"), "planet_osm_line");
/// ```
#[must_use]
pub fn table_from_sql(spec: &str) -> String {
    let lowered = spec.trim().to_lowercase();
    let Some(after) = last_from_keyword(&lowered) else {
        return lowered;
    };
    after
        .trim_start()
        .split(|c: char| c.is_whitespace() || c == ')')
        .next()
        .unwrap_or_default()
        .to_owned()
}

/// Text following the last stand-alone `from` keyword.
fn last_from_keyword(text: &str) -> Option<&str> {
    text.rmatch_indices("from").find_map(|(start, keyword)| {
        let end = start + keyword.len();
        let before = text.get(..start)?.chars().next_back();
        let after = text.get(end..)?;
        let opens = before.is_none_or(|c| c.is_whitespace() || c == '(' || c == ')');
        let closes = after.chars().next().is_some_and(char::is_whitespace);
        (opens && closes).then_some(after)
    })
}

/// Quote an identifier, doubling embedded double quotes.
///
/// ```
/// use strata_postgis::quote_identifier;
///
/// assert_eq!(quote_identifier("name"), "\"name\"");
/// assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
/// ```
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a string literal, doubling embedded single quotes.
#[must_use]
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Catalog lookup of the geometry column, SRID and geometry type.
#[must_use]
pub fn catalog_sql(table: &str) -> String {
    format!(
        "select f_geometry_column, srid, type from geometry_columns where f_table_name = {}",
        quote_literal(table)
    )
}

/// Statistics-based extent of a geometry column.
#[must_use]
pub fn extent_sql(table: &str, geometry_field: &str) -> String {
    format!(
        "select ST_XMin(ext), ST_YMin(ext), ST_XMax(ext), ST_YMax(ext) \
         from (select ST_EstimatedExtent({}, {}) as ext) as tmp",
        quote_literal(table),
        quote_literal(geometry_field)
    )
}

/// Declared nullability of every column of a table.
#[must_use]
pub fn nullability_sql(table: &str) -> String {
    format!(
        "select column_name::text, is_nullable::text from information_schema.columns where table_name = {}",
        quote_literal(table)
    )
}

/// Single-row probe used to read column metadata.
#[must_use]
pub fn probe_sql(table_spec: &str) -> String {
    format!("select * from {table_spec} limit 1")
}

/// Everything needed to turn a bounding box into a feature query.
#[derive(Debug, Clone, Copy)]
pub struct FeatureSql<'a> {
    /// Table name or sub-select, spliced verbatim.
    pub table_spec: &'a str,
    /// Column holding the feature identifier; `None` selects `NULL` so rows
    /// are numbered instead.
    pub key_field: Option<&'a str>,
    /// Geometry column.
    pub geometry_field: &'a str,
    /// SRID tagging the envelope; omitted when unknown.
    pub srid: Option<i32>,
    /// Columns without a native decoding, selected as `text`.
    pub text_columns: &'a BTreeSet<String>,
}

impl FeatureSql<'_> {
    /// Build the statement selecting key, WKB geometry and `properties` for
    /// rows whose bounding box overlaps `bbox`.
    ///
    /// The key is the first column and the geometry the second; properties
    /// follow in the order given.
    ///
    /// ```
    /// use std::collections::BTreeSet;
    ///
    /// use geo::{Coord, Rect};
    /// use strata_postgis::FeatureSql;
    ///
    /// let text_columns = BTreeSet::from(["opened".to_owned()]);
    /// let sql = FeatureSql {
    ///     table_spec: "roads",
    ///     key_field: Some("gid"),
    ///     geometry_field: "way",
    ///     srid: Some(3857),
    ///     text_columns: &text_columns,
    /// }
    /// .build(&Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 10.0, y: 5.0 }), ["name", "opened"]);
    /// assert_eq!(
    ///     sql,
    ///     "SELECT \"gid\", ST_AsBinary(\"way\") AS \"geom\", \"name\", \"opened\"::text AS \"opened\" \
    ///      FROM roads WHERE \"way\" && ST_MakeEnvelope(0, 0, 10, 5, 3857)"
    /// );
    /// ```
    #[must_use]
    pub fn build<'p, I>(&self, bbox: &Rect<f64>, properties: I) -> String
    where
        I: IntoIterator<Item = &'p str>,
    {
        let geometry = quote_identifier(self.geometry_field);
        let key = self.key_field.map_or_else(|| "NULL".to_owned(), |key| self.column(key));
        let mut sql = format!("SELECT {key}, ST_AsBinary({geometry}) AS \"geom\"");
        for property in properties {
            sql.push_str(", ");
            sql.push_str(&self.column(property));
        }
        let (min, max) = (bbox.min(), bbox.max());
        let srid = self.srid.map(|srid| format!(", {srid}")).unwrap_or_default();
        sql.push_str(&format!(
            " FROM {} WHERE {geometry} && ST_MakeEnvelope({}, {}, {}, {}{srid})",
            self.table_spec, min.x, min.y, max.x, max.y
        ));
        sql
    }

    fn column(&self, name: &str) -> String {
        let quoted = quote_identifier(name);
        if self.text_columns.contains(name) {
            format!("{quoted}::text AS {quoted}")
        } else {
            quoted
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Coord;
    use rstest::rstest;

    #[rstest]
    #[case("roads", "roads")]
    #[case("  Public.Roads ", "public.roads")]
    #[case("(select * from roads) as r", "roads")]
    #[case("(SELECT gid, way FROM Buildings WHERE height > 3) AS b", "buildings")]
    #[case("(select * from\n  lakes\n) as l", "lakes")]
    #[case("(select a.* from (select * from inner_t) as a) as outer_q", "inner_t")]
    #[case("(select * from rivers)", "rivers")]
    #[case("wildfires", "wildfires")]
    #[case("fromage", "fromage")]
    fn extracts_bare_table(#[case] spec: &str, #[case] expected: &str) {
        assert_eq!(table_from_sql(spec), expected);
    }

    #[rstest]
    fn literals_escape_quotes() {
        assert_eq!(quote_literal("o'brien"), "'o''brien'");
        assert_eq!(
            catalog_sql("o'brien"),
            "select f_geometry_column, srid, type from geometry_columns where f_table_name = 'o''brien'"
        );
    }

    #[rstest]
    fn extent_uses_estimated_extent() {
        let sql = extent_sql("roads", "way");
        assert!(sql.contains("ST_EstimatedExtent('roads', 'way')"));
        assert!(sql.starts_with("select ST_XMin(ext), ST_YMin(ext), ST_XMax(ext), ST_YMax(ext)"));
    }

    #[rstest]
    fn probe_keeps_sub_selects_verbatim() {
        assert_eq!(
            probe_sql("(select * from roads) as r"),
            "select * from (select * from roads) as r limit 1"
        );
    }

    #[rstest]
    fn envelope_omits_unknown_srid_and_quotes_properties() {
        let bbox = Rect::new(Coord { x: -1.5, y: -2.0 }, Coord { x: 3.25, y: 4.0 });
        let sql = FeatureSql {
            table_spec: "roads",
            key_field: Some("gid"),
            geometry_field: "the_geom",
            srid: None,
            text_columns: &BTreeSet::new(),
        }
        .build(&bbox, ["name", "odd\"col"]);
        assert_eq!(
            sql,
            "SELECT \"gid\", ST_AsBinary(\"the_geom\") AS \"geom\", \"name\", \"odd\"\"col\" \
             FROM roads WHERE \"the_geom\" && ST_MakeEnvelope(-1.5, -2, 3.25, 4)"
        );
    }

    #[rstest]
    fn missing_key_selects_null_and_unknown_types_are_cast_to_text() {
        let bbox = Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 10.0, y: 10.0 });
        let text_columns = BTreeSet::from(["surveyed".to_owned(), "width".to_owned()]);
        let sql = FeatureSql {
            table_spec: "roads",
            key_field: None,
            geometry_field: "way",
            srid: None,
            text_columns: &text_columns,
        }
        .build(&bbox, ["name", "surveyed", "width"]);
        assert_eq!(
            sql,
            "SELECT NULL, ST_AsBinary(\"way\") AS \"geom\", \"name\", \"surveyed\"::text AS \"surveyed\", \
             \"width\"::text AS \"width\" FROM roads WHERE \"way\" && ST_MakeEnvelope(0, 0, 10, 10)"
        );
    }

    #[rstest]
    fn nullability_reads_information_schema() {
        assert_eq!(
            nullability_sql("roads"),
            "select column_name::text, is_nullable::text from information_schema.columns where table_name = 'roads'"
        );
    }
}
