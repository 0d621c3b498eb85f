//! Features and lazy feature sequences.

use std::collections::BTreeMap;
use std::fmt;

use crate::Value;

/// A single feature returned by a datasource query.
///
/// The geometry is handed over in its encoded transport form (WKB for
/// PostGIS). Decoding it is the caller's concern.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Feature {
    /// Row identifier.
    pub id: i64,
    /// Opaque encoded geometry.
    pub geometry: Vec<u8>,
    /// Requested attribute values keyed by property name.
    pub attributes: BTreeMap<String, Value>,
}

impl Feature {
    /// Create a feature without attributes.
    #[must_use]
    pub const fn new(id: i64, geometry: Vec<u8>) -> Self {
        Self {
            id,
            geometry,
            attributes: BTreeMap::new(),
        }
    }

    /// Attach an attribute value.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Look up an attribute value by name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }
}

/// Why a featureset is empty even though the query itself was valid.
///
/// Renderers typically draw nothing for a degraded layer and carry on with
/// the rest of the composition; callers that care can tell this apart from a
/// genuinely empty result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Degradation {
    /// Every pooled connection was in use and the pool was at capacity.
    PoolExhausted {
        /// Human-readable pool identity.
        pool: String,
    },
    /// A connection could not be established or validated.
    ConnectionFailed {
        /// Backend failure message.
        reason: String,
    },
}

impl fmt::Display for Degradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PoolExhausted { pool } => write!(f, "connection pool {pool} is exhausted"),
            Self::ConnectionFailed { reason } => write!(f, "connection failed: {reason}"),
        }
    }
}

/// Lazy, single-pass sequence of features.
///
/// A featureset is not restartable: iterate it again by issuing a new query.
/// Dropping it releases whatever backend resources it holds.
pub struct Featureset {
    inner: Box<dyn Iterator<Item = Feature> + Send>,
    degradation: Option<Degradation>,
}

impl Featureset {
    /// Wrap an iterator of features.
    pub fn new<I>(features: I) -> Self
    where
        I: Iterator<Item = Feature> + Send + 'static,
    {
        Self {
            inner: Box::new(features),
            degradation: None,
        }
    }

    /// A legitimately empty result.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(std::iter::empty())
    }

    /// An empty result caused by an unavailable backend.
    #[must_use]
    pub fn degraded(degradation: Degradation) -> Self {
        Self {
            inner: Box::new(std::iter::empty()),
            degradation: Some(degradation),
        }
    }

    /// Cause of degradation, if any.
    #[must_use]
    pub const fn degradation(&self) -> Option<&Degradation> {
        self.degradation.as_ref()
    }

    /// Whether the featureset was degraded to empty.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        self.degradation.is_some()
    }
}

impl Iterator for Featureset {
    type Item = Feature;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl fmt::Debug for Featureset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Featureset")
            .field("degradation", &self.degradation)
            .finish_non_exhaustive()
    }
}
