//! Rectangular feature queries.

use std::collections::BTreeSet;

use geo::Rect;
use thiserror::Error;

/// Errors returned by [`Query::new`].
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum QueryError {
    /// A bounding box coordinate was NaN or infinite.
    #[error("bounding box coordinates must be finite (got {minx}, {miny}, {maxx}, {maxy})")]
    NonFiniteBounds {
        /// Minimum x.
        minx: f64,
        /// Minimum y.
        miny: f64,
        /// Maximum x.
        maxx: f64,
        /// Maximum y.
        maxy: f64,
    },
}

/// A request for the features intersecting a bounding box.
///
/// The box must be expressed in the datasource's spatial reference; no
/// reprojection happens here. Property names are kept ordered so that the
/// generated projection is deterministic.
///
/// # Examples
///
/// ```
/// use geo::{Coord, Rect};
/// use strata_core::Query;
///
/// # fn main() -> Result<(), strata_core::QueryError> {
/// let bbox = Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 10.0, y: 10.0 });
/// let query = Query::new(bbox)?.with_properties(["pop", "name"]);
/// let names: Vec<_> = query.property_names().iter().map(String::as_str).collect();
/// assert_eq!(names, vec!["name", "pop"]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    bbox: Rect<f64>,
    property_names: BTreeSet<String>,
}

impl Query {
    /// Validate the bounding box and create a query with no properties.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::NonFiniteBounds`] if any coordinate is NaN or
    /// infinite.
    pub fn new(bbox: Rect<f64>) -> Result<Self, QueryError> {
        let (min, max) = (bbox.min(), bbox.max());
        if [min.x, min.y, max.x, max.y].iter().any(|c| !c.is_finite()) {
            return Err(QueryError::NonFiniteBounds {
                minx: min.x,
                miny: min.y,
                maxx: max.x,
                maxy: max.y,
            });
        }
        Ok(Self {
            bbox,
            property_names: BTreeSet::new(),
        })
    }

    /// Request one more property.
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>) -> Self {
        self.property_names.insert(name.into());
        self
    }

    /// Request several properties.
    #[must_use]
    pub fn with_properties<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.property_names.extend(names.into_iter().map(Into::into));
        self
    }

    /// Bounding box, normalised so that `min <= max` on both axes.
    #[must_use]
    pub const fn bbox(&self) -> &Rect<f64> {
        &self.bbox
    }

    /// Requested property names in ascending order.
    #[must_use]
    pub const fn property_names(&self) -> &BTreeSet<String> {
        &self.property_names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Coord;
    use rstest::rstest;

    #[rstest]
    #[case(f64::NAN, 0.0)]
    #[case(0.0, f64::INFINITY)]
    #[case(f64::NEG_INFINITY, 1.0)]
    fn rejects_non_finite_bounds(#[case] x: f64, #[case] y: f64) {
        let bbox = Rect::new(Coord { x, y }, Coord { x: 1.0, y: 1.0 });
        assert!(matches!(
            Query::new(bbox),
            Err(QueryError::NonFiniteBounds { .. })
        ));
    }

    #[rstest]
    fn normalises_corners() {
        let bbox = Rect::new(Coord { x: 10.0, y: 10.0 }, Coord { x: 0.0, y: 0.0 });
        let query = Query::new(bbox).expect("finite bbox");
        assert_eq!(query.bbox().min(), Coord { x: 0.0, y: 0.0 });
        assert_eq!(query.bbox().max(), Coord { x: 10.0, y: 10.0 });
    }

    #[rstest]
    fn duplicate_properties_collapse() {
        let bbox = Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 1.0, y: 1.0 });
        let query = Query::new(bbox)
            .expect("finite bbox")
            .with_property("name")
            .with_properties(["name", "pop"]);
        assert_eq!(query.property_names().len(), 2);
    }
}
