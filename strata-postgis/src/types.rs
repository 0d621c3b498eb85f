//! Mapping from PostgreSQL type identifiers to attribute types.

use strata_core::{AttributeDescriptor, AttributeType};

/// Type identifier assumed for `geometry` when the catalog cannot be read.
pub const DEFAULT_GEOMETRY_OID: u32 = 17285;

/// Built-in PostgreSQL type identifiers the datasource understands.
pub mod oid {
    /// `bytea`
    pub const BYTEA: u32 = 17;
    /// `int8`
    pub const INT8: u32 = 20;
    /// `int2`
    pub const INT2: u32 = 21;
    /// `int4`
    pub const INT4: u32 = 23;
    /// `text`
    pub const TEXT: u32 = 25;
    /// `oid`
    pub const OID: u32 = 26;
    /// `float4`
    pub const FLOAT4: u32 = 700;
    /// `float8`
    pub const FLOAT8: u32 = 701;
    /// `bpchar`
    pub const BPCHAR: u32 = 1042;
    /// `varchar`
    pub const VARCHAR: u32 = 1043;
}

/// Attribute type for a column type, or `None` when the type is not
/// recognised.
#[must_use]
pub const fn attribute_type(type_id: u32, geometry_oid: u32) -> Option<AttributeType> {
    if type_id == geometry_oid {
        return Some(AttributeType::Geometry);
    }
    match type_id {
        oid::INT2 | oid::INT4 | oid::INT8 | oid::OID => Some(AttributeType::Integer),
        oid::FLOAT4 | oid::FLOAT8 => Some(AttributeType::Double),
        oid::BPCHAR | oid::VARCHAR | oid::TEXT => Some(AttributeType::String),
        _ => None,
    }
}

/// Storage size of fixed-width numeric types.
#[must_use]
pub const fn fixed_length(type_id: u32) -> Option<usize> {
    match type_id {
        oid::INT2 => Some(2),
        oid::INT4 | oid::OID | oid::FLOAT4 => Some(4),
        oid::INT8 | oid::FLOAT8 => Some(8),
        _ => None,
    }
}

/// Result of classifying one probed column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    /// Descriptor to publish.
    pub descriptor: AttributeDescriptor,
    /// Whether the type was unrecognised and defaulted to a string.
    pub unknown: bool,
}

/// Classify a column into an attribute descriptor.
///
/// Numeric columns carry their byte length. Unrecognised types become
/// strings and are flagged so the caller can report them.
#[must_use]
pub fn map_column(name: &str, type_id: u32, length: Option<usize>, geometry_oid: u32) -> ColumnMapping {
    match attribute_type(type_id, geometry_oid) {
        Some(kind @ (AttributeType::Integer | AttributeType::Double)) => {
            let mut descriptor = AttributeDescriptor::new(name, kind);
            descriptor.length = length.or_else(|| fixed_length(type_id));
            ColumnMapping {
                descriptor,
                unknown: false,
            }
        }
        Some(kind) => ColumnMapping {
            descriptor: AttributeDescriptor::new(name, kind),
            unknown: false,
        },
        None => ColumnMapping {
            descriptor: AttributeDescriptor::new(name, AttributeType::String),
            unknown: true,
        },
    }
}
