//! Attribute schema exposed by a datasource.

use std::fmt;

/// Attribute model tag for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum AttributeType {
    /// Whole numbers.
    Integer,
    /// Floating point numbers.
    Double,
    /// Character data. Columns of unrecognised types also land here.
    String,
    /// The geometry column itself.
    Geometry,
}

impl AttributeType {
    /// Lower-case name used in logs and JSON output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Double => "double",
            Self::String => "string",
            Self::Geometry => "geometry",
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Describes a single attribute of a layer.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttributeDescriptor {
    /// Column name as reported by the backend.
    pub name: String,
    /// Attribute model tag.
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub kind: AttributeType,
    /// Whether the column may hold `NULL`.
    pub nullable: bool,
    /// Storage size in bytes for fixed-width types.
    pub length: Option<usize>,
}

impl AttributeDescriptor {
    /// Create a nullable descriptor without a known length.
    pub fn new(name: impl Into<String>, kind: AttributeType) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: true,
            length: None,
        }
    }

    /// Attach a byte length.
    #[must_use]
    pub const fn with_length(mut self, length: usize) -> Self {
        self.length = Some(length);
        self
    }

    /// Override nullability.
    #[must_use]
    pub const fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }
}

/// Ordered attribute schema of a layer together with its identity.
///
/// # Examples
///
/// ```
/// use strata_core::{AttributeDescriptor, AttributeType, LayerDescriptor};
///
/// let mut layer = LayerDescriptor::new("roads");
/// layer.srid = Some(4326);
/// layer.push(AttributeDescriptor::new("name", AttributeType::String));
/// layer.push(AttributeDescriptor::new("geom", AttributeType::Geometry));
///
/// assert_eq!(layer.attribute("name").map(|a| a.kind), Some(AttributeType::String));
/// assert_eq!(layer.geometry_attribute().map(|a| a.name.as_str()), Some("geom"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LayerDescriptor {
    /// Layer name used by the host.
    pub name: String,
    /// Spatial reference of the layer; `None` when unknown.
    pub srid: Option<i32>,
    /// Attributes in column order.
    pub attributes: Vec<AttributeDescriptor>,
}

impl LayerDescriptor {
    /// Create an empty descriptor with an unknown SRID.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            srid: None,
            attributes: Vec::new(),
        }
    }

    /// Append an attribute, keeping column order.
    pub fn push(&mut self, attribute: AttributeDescriptor) {
        self.attributes.push(attribute);
    }

    /// Look up an attribute by exact name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|attribute| attribute.name == name)
    }

    /// First attribute tagged [`AttributeType::Geometry`].
    #[must_use]
    pub fn geometry_attribute(&self) -> Option<&AttributeDescriptor> {
        self.attributes
            .iter()
            .find(|attribute| attribute.kind == AttributeType::Geometry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn descriptors_default_to_nullable_without_length() {
        let attribute = AttributeDescriptor::new("pop", AttributeType::Integer);
        assert!(attribute.nullable);
        assert_eq!(attribute.length, None);
    }

    #[rstest]
    fn layer_keeps_column_order() {
        let mut layer = LayerDescriptor::new("towns");
        layer.push(AttributeDescriptor::new("b", AttributeType::String));
        layer.push(AttributeDescriptor::new("a", AttributeType::Integer).with_length(4));
        let names: Vec<_> = layer.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(layer.attribute("a").and_then(|a| a.length), Some(4));
    }

    #[rstest]
    fn missing_attribute_is_none() {
        let layer = LayerDescriptor::new("empty");
        assert!(layer.attribute("anything").is_none());
        assert!(layer.geometry_attribute().is_none());
    }

    #[cfg(feature = "serde")]
    #[rstest]
    fn attribute_type_serialises_lowercase() {
        let attribute = AttributeDescriptor::new("geom", AttributeType::Geometry);
        let json = serde_json::to_value(&attribute).expect("serialise descriptor");
        assert_eq!(json["type"], "geometry");
    }
}
