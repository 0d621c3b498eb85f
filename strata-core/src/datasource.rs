//! The datasource seam between backends and the renderer.
//!
//! A [`Datasource`] is built once per configured layer and then queried with
//! rectangular [`Query`] values. Implementations are expected to degrade to
//! empty featuresets when their backend is unavailable, so that one broken
//! layer does not abort a whole composition.

use std::fmt;

use geo::Rect;

use crate::{Featureset, LayerDescriptor, Query};

/// Broad category of data a datasource produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasourceKind {
    /// Vector features with attributes.
    Vector,
    /// Gridded raster data.
    Raster,
}

impl fmt::Display for DatasourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Vector => "vector",
            Self::Raster => "raster",
        })
    }
}

/// Read-only access to the features of one layer.
///
/// # Examples
///
/// ```rust
/// use std::convert::Infallible;
///
/// use geo::{Coord, Rect};
/// use strata_core::{Datasource, DatasourceKind, Feature, Featureset, LayerDescriptor, Query};
///
/// struct Single {
///     descriptor: LayerDescriptor,
/// }
///
/// impl Datasource for Single {
///     type Error = Infallible;
///
///     fn name(&self) -> &'static str {
///         "single"
///     }
///
///     fn kind(&self) -> DatasourceKind {
///         DatasourceKind::Vector
///     }
///
///     fn descriptor(&self) -> &LayerDescriptor {
///         &self.descriptor
///     }
///
///     fn envelope(&self) -> Option<Rect<f64>> {
///         None
///     }
///
///     fn features(&self, _query: &Query) -> Result<Featureset, Self::Error> {
///         Ok(Featureset::new(std::iter::once(Feature::new(1, Vec::new()))))
///     }
/// }
///
/// let source = Single { descriptor: LayerDescriptor::new("one") };
/// let bbox = Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 1.0, y: 1.0 });
/// let query = Query::new(bbox).expect("finite bbox");
/// assert_eq!(source.features(&query).map(Iterator::count), Ok(1));
/// ```
pub trait Datasource {
    /// Error returned when a query cannot even be attempted.
    type Error: std::error::Error;

    /// Static name under which a host registers this implementation.
    fn name(&self) -> &'static str;

    /// Category of data produced.
    fn kind(&self) -> DatasourceKind;

    /// Attribute schema of the layer.
    fn descriptor(&self) -> &LayerDescriptor;

    /// Last known extent of the layer.
    ///
    /// The extent is advisory and may be approximate; `None` means unknown.
    /// It must never be relied upon to decide whether features exist.
    fn envelope(&self) -> Option<Rect<f64>>;

    /// Return the features intersecting the query's bounding box.
    fn features(&self, query: &Query) -> Result<Featureset, Self::Error>;
}
