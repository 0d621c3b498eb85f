//! Flat string parameters used to configure a datasource.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Keys whose values are never printed.
const REDACTED_KEYS: [&str; 1] = ["password"];

/// Errors raised while reading [`Parameters`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParameterError {
    /// A required parameter was absent or blank.
    #[error("missing required parameter `{name}`")]
    Missing {
        /// Parameter name.
        name: String,
    },
    /// A parameter was present but could not be interpreted.
    #[error("invalid value {value:?} for parameter `{name}`: {reason}")]
    Invalid {
        /// Parameter name.
        name: String,
        /// Raw value supplied.
        value: String,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Named string parameters, as produced by a map-file loader.
///
/// Blank values are treated as absent so that an empty attribute in a
/// configuration document falls back to the default.
///
/// # Examples
///
/// ```
/// use strata_core::Parameters;
///
/// let params = Parameters::new()
///     .with("table", "roads")
///     .with("srid", "4326")
///     .with("user", "");
///
/// assert_eq!(params.get("table"), Some("roads"));
/// assert_eq!(params.get("user"), None);
/// assert_eq!(params.parse::<i32>("srid"), Ok(Some(4326)));
/// assert!(params.require("host").is_err());
/// ```
#[derive(Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Parameters {
    values: BTreeMap<String, String>,
}

impl Parameters {
    /// Create an empty parameter set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace a parameter.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Fetch a parameter, treating blank values as absent.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// Fetch a parameter or fall back to `default`.
    #[must_use]
    pub fn get_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.get(name).unwrap_or(default)
    }

    /// Fetch a parameter that must be present.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError::Missing`] when the value is absent or blank.
    pub fn require(&self, name: &str) -> Result<&str, ParameterError> {
        self.get(name).ok_or_else(|| ParameterError::Missing {
            name: name.to_owned(),
        })
    }

    /// Parse an optional parameter with [`FromStr`].
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError::Invalid`] when a value is present but does
    /// not parse.
    pub fn parse<T>(&self, name: &str) -> Result<Option<T>, ParameterError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.get(name)
            .map(|raw| {
                raw.parse::<T>().map_err(|err| ParameterError::Invalid {
                    name: name.to_owned(),
                    value: raw.to_owned(),
                    reason: err.to_string(),
                })
            })
            .transpose()
    }

    /// Parse an optional boolean flag.
    ///
    /// Accepts `true/false`, `yes/no`, `on/off` and `1/0`, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError::Invalid`] for any other spelling.
    pub fn flag(&self, name: &str) -> Result<Option<bool>, ParameterError> {
        let Some(raw) = self.get(name) else {
            return Ok(None);
        };
        match raw.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(Some(true)),
            "false" | "no" | "off" | "0" => Ok(Some(false)),
            _ => Err(ParameterError::Invalid {
                name: name.to_owned(),
                value: raw.to_owned(),
                reason: "expected a boolean".to_owned(),
            }),
        }
    }

    /// Merge `other` into `self`; values in `other` win.
    pub fn merge(&mut self, other: Self) {
        self.values.extend(other.values);
    }

    /// Iterate over raw name/value pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Number of stored parameters, blank ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no parameters are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Parameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.values.iter().map(|(name, value)| {
                if REDACTED_KEYS.contains(&name.as_str()) {
                    (name.as_str(), "<redacted>")
                } else {
                    (name.as_str(), value.as_str())
                }
            }))
            .finish()
    }
}

impl<K, V> FromIterator<(K, V)> for Parameters
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}

impl<K, V> Extend<(K, V)> for Parameters
where
    K: Into<String>,
    V: Into<String>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.values.extend(
            iter.into_iter()
                .map(|(name, value)| (name.into(), value.into())),
        );
    }
}
