//! JSON rendering of layer descriptions and query results.

use std::io::Write;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use log::warn;
use serde::Serialize;
use serde_json::{Map, Number, Value as Json};
use strata_core::{Datasource, Feature, Featureset, LayerDescriptor, Value};
use strata_postgis::PostgisDatasource;

use crate::CliError;

#[derive(Debug, Serialize)]
struct Description<'a> {
    datasource: &'static str,
    kind: String,
    layer: &'a LayerDescriptor,
    geometry_field: Option<&'a str>,
    envelope: Option<[f64; 4]>,
    diagnostics: Vec<DiagnosticOutput<'a>>,
}

#[derive(Debug, Serialize)]
struct DiagnosticOutput<'a> {
    field: &'a str,
    issue: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct FeatureOutput {
    pub(crate) id: i64,
    /// Base64 of the WKB geometry.
    pub(crate) geometry: String,
    pub(crate) properties: Map<String, Json>,
}

#[derive(Debug, Serialize)]
struct FeatureCollection {
    features: Vec<FeatureOutput>,
    degraded: Option<String>,
}

/// Print the layer's schema, extent and introspection diagnostics.
pub(crate) fn write_description(writer: &mut dyn Write, layer: &PostgisDatasource) -> Result<(), CliError> {
    let description = Description {
        datasource: layer.name(),
        kind: layer.kind().to_string(),
        layer: layer.descriptor(),
        geometry_field: layer.geometry_field(),
        envelope: layer
            .envelope()
            .map(|extent| [extent.min().x, extent.min().y, extent.max().x, extent.max().y]),
        diagnostics: layer
            .diagnostics()
            .iter()
            .map(|diagnostic| DiagnosticOutput {
                field: &diagnostic.field,
                issue: &diagnostic.issue,
            })
            .collect(),
    };
    write_json(writer, &description)
}

/// Drain up to `limit` features and print them with any degradation cause.
pub(crate) fn write_features(
    writer: &mut dyn Write,
    featureset: Featureset,
    limit: Option<usize>,
) -> Result<(), CliError> {
    let degraded = featureset.degradation().map(ToString::to_string);
    if let Some(reason) = &degraded {
        warn!("strata: query returned no features: {reason}");
    }
    let features = featureset
        .take(limit.unwrap_or(usize::MAX))
        .map(|feature| feature_output(&feature))
        .collect();
    write_json(writer, &FeatureCollection { features, degraded })
}

pub(crate) fn feature_output(feature: &Feature) -> FeatureOutput {
    FeatureOutput {
        id: feature.id,
        geometry: STANDARD.encode(&feature.geometry),
        properties: feature
            .attributes
            .iter()
            .map(|(name, value)| (name.clone(), value_json(value)))
            .collect(),
    }
}

/// Attribute value as JSON. Bytes are base64 and non-finite doubles `null`.
pub(crate) fn value_json(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Integer(number) => Json::from(*number),
        Value::Double(number) => Number::from_f64(*number).map_or(Json::Null, Json::Number),
        Value::String(text) => Json::String(text.clone()),
        Value::Bytes(bytes) => Json::String(STANDARD.encode(bytes)),
    }
}

fn write_json(writer: &mut dyn Write, payload: &impl Serialize) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(payload).map_err(CliError::SerialiseOutput)?;
    writeln!(writer, "{text}").map_err(CliError::WriteOutput)
}
