//! Test-only, in-memory `Datasource` implementation used by unit and
//! behaviour tests.

use std::convert::Infallible;

use geo::{Coord, Intersects, Rect};

use crate::{Datasource, DatasourceKind, Feature, Featureset, LayerDescriptor, Query};

/// In-memory datasource keyed by point locations.
///
/// The datasource performs a linear scan and is intended only for small
/// datasets.
#[derive(Debug, Default)]
pub struct MemoryDatasource {
    descriptor: LayerDescriptor,
    features: Vec<(Coord<f64>, Feature)>,
}

impl MemoryDatasource {
    /// Create a datasource with the given descriptor and no features.
    #[must_use]
    pub const fn new(descriptor: LayerDescriptor) -> Self {
        Self {
            descriptor,
            features: Vec::new(),
        }
    }

    /// Add a feature anchored at `location`.
    #[must_use]
    pub fn with_feature(mut self, location: Coord<f64>, feature: Feature) -> Self {
        self.features.push((location, feature));
        self
    }
}

impl Datasource for MemoryDatasource {
    type Error = Infallible;

    fn name(&self) -> &'static str {
        "memory"
    }

    fn kind(&self) -> DatasourceKind {
        DatasourceKind::Vector
    }

    fn descriptor(&self) -> &LayerDescriptor {
        &self.descriptor
    }

    fn envelope(&self) -> Option<Rect<f64>> {
        let mut points = self.features.iter().map(|(location, _)| *location);
        let first = points.next()?;
        Some(points.fold(Rect::new(first, first), |rect, point| {
            Rect::new(
                Coord {
                    x: rect.min().x.min(point.x),
                    y: rect.min().y.min(point.y),
                },
                Coord {
                    x: rect.max().x.max(point.x),
                    y: rect.max().y.max(point.y),
                },
            )
        }))
    }

    fn features(&self, query: &Query) -> Result<Featureset, Self::Error> {
        let bbox = *query.bbox();
        let wanted = query.property_names().clone();
        let found: Vec<Feature> = self
            .features
            .iter()
            // `Intersects` treats boundary points as inside the rectangle.
            .filter(|(location, _)| bbox.intersects(location))
            .map(|(_, feature)| {
                let mut projected = Feature::new(feature.id, feature.geometry.clone());
                projected.attributes = feature
                    .attributes
                    .iter()
                    .filter(|(name, _)| wanted.contains(*name))
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect();
                projected
            })
            .collect();
        Ok(Featureset::new(found.into_iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn bbox(x1: f64, y1: f64, x2: f64, y2: f64) -> Rect<f64> {
        Rect::new(Coord { x: x1, y: y1 }, Coord { x: x2, y: y2 })
    }

    #[rstest]
    fn returns_only_requested_attributes() {
        let source = MemoryDatasource::new(LayerDescriptor::new("towns")).with_feature(
            Coord { x: 0.0, y: 0.0 },
            Feature::new(1, vec![1])
                .with_attribute("name", "Ely")
                .with_attribute("pop", 20_000_i64),
        );
        let query = Query::new(bbox(-1.0, -1.0, 1.0, 1.0))
            .expect("finite bbox")
            .with_property("name");
        let found: Vec<_> = source.features(&query).into_iter().flatten().collect();
        assert_eq!(found.len(), 1);
        assert!(found[0].attribute("name").is_some());
        assert!(found[0].attribute("pop").is_none());
    }

    #[rstest]
    fn envelope_covers_all_points() {
        let source = MemoryDatasource::new(LayerDescriptor::new("towns"))
            .with_feature(Coord { x: -2.0, y: 1.0 }, Feature::new(1, Vec::new()))
            .with_feature(Coord { x: 3.0, y: -4.0 }, Feature::new(2, Vec::new()));
        assert_eq!(source.envelope(), Some(bbox(-2.0, -4.0, 3.0, 1.0)));
    }

    #[rstest]
    fn empty_source_has_no_envelope() {
        let source = MemoryDatasource::default();
        assert_eq!(source.envelope(), None);
    }
}
