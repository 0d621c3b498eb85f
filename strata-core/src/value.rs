//! Attribute values read from a backend row.

use std::fmt;

/// A single attribute value.
///
/// Backends decode their native column types into this small model. Values
/// that arrive as text but describe numbers can be read leniently with
/// [`Value::parse_i64`] and [`Value::parse_f64`].
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Value {
    /// SQL `NULL` or a value the backend could not decode.
    #[default]
    Null,
    /// Signed integer.
    Integer(i64),
    /// Double-precision float.
    Double(f64),
    /// Character data.
    String(String),
    /// Raw bytes, such as an encoded geometry.
    Bytes(Vec<u8>),
}

impl Value {
    /// Whether the value is [`Value::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Borrow the value as text when it is a [`Value::String`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(text) => Some(text),
            _ => None,
        }
    }

    /// Borrow the value as bytes when it is a [`Value::Bytes`].
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Read the value as an integer, parsing text when necessary.
    ///
    /// # Examples
    ///
    /// ```
    /// use strata_core::Value;
    ///
    /// assert_eq!(Value::Integer(4326).parse_i64(), Some(4326));
    /// assert_eq!(Value::String(" 3857 ".into()).parse_i64(), Some(3857));
    /// assert_eq!(Value::String("EPSG:4326".into()).parse_i64(), None);
    /// ```
    #[must_use]
    pub fn parse_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            Self::String(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    /// Read the value as a finite float, parsing text when necessary.
    ///
    /// Integers are accepted within the `i32` range, where the conversion is
    /// exact; larger magnitudes read as `None`.
    #[must_use]
    pub fn parse_f64(&self) -> Option<f64> {
        let parsed = match self {
            Self::Double(value) => Some(*value),
            Self::Integer(value) => i32::try_from(*value).ok().map(f64::from),
            Self::String(text) => text.trim().parse::<f64>().ok(),
            _ => None,
        };
        parsed.filter(|value| value.is_finite())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Double(value) => write!(f, "{value}"),
            Self::String(text) => f.write_str(text),
            Self::Bytes(bytes) => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}
