use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::{DelineationError, Result};
use crate::geometry::try_union;
use crate::projection::{CoordTransform, Crs};
use geo_types::{Geometry, Line, LineString, MultiLineString, MultiPolygon, Polygon, Rect};
use rstar::{RTree, RTreeObject, AABB};

/// One supplied layer of split-defining features (roads, rivers,
/// settlements...).
#[derive(Debug, Clone)]
pub struct BoundaryFeatures {
    pub name: String,
    pub crs: Option<Crs>,
    pub geometries: Vec<Geometry<f64>>,
}

impl BoundaryFeatures {
    pub fn new(name: impl Into<String>, crs: Option<Crs>, geometries: Vec<Geometry<f64>>) -> Self {
        Self {
            name: name.into(),
            crs,
            geometries,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct IndexedSegment(Line<f64>);

impl RTreeObject for IndexedSegment {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        let (a, b) = (self.0.start, self.0.end);
        AABB::from_corners([a.x.min(b.x), a.y.min(b.y)], [a.x.max(b.x), a.y.max(b.y)])
    }
}

/// Union of all boundary layers, in the working CRS. Carries no attributes
/// and no population.
pub struct BoundaryLayer {
    lines: MultiLineString<f64>,
    areas: MultiPolygon<f64>,
    index: RTree<IndexedSegment>,
}

impl BoundaryLayer {
    fn new(lines: MultiLineString<f64>, areas: MultiPolygon<f64>) -> Self {
        let segments = lines
            .iter()
            .chain(areas.iter().flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors())))
            .flat_map(|ls| ls.lines())
            .filter(|l| l.start != l.end)
            .map(IndexedSegment)
            .collect();
        Self {
            lines,
            areas,
            index: RTree::bulk_load(segments),
        }
    }

    /// Lineal features.
    pub fn lines(&self) -> &MultiLineString<f64> {
        &self.lines
    }

    /// Unioned areal features.
    pub fn areas(&self) -> &MultiPolygon<f64> {
        &self.areas
    }

    pub fn segment_count(&self) -> usize {
        self.index.size()
    }

    pub fn is_empty(&self) -> bool {
        self.index.size() == 0
    }

    /// Split segments (lines and area rings) whose envelope touches `rect`.
    pub fn segments_touching(&self, rect: Rect<f64>) -> Vec<Line<f64>> {
        let env = AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]);
        self.index
            .locate_in_envelope_intersecting(&env)
            .map(|s| s.0)
            .collect()
    }
}

pub struct BoundaryLoader {
    pub working_crs: Crs,
}

impl BoundaryLoader {
    pub fn new(working_crs: Crs) -> Self {
        Self { working_crs }
    }

    /// Reprojects every layer and coalesces them into one split layer.
    /// `None` when nothing was supplied.
    pub fn load(&self, layers: &[BoundaryFeatures], diagnostics: &mut Diagnostics) -> Result<Option<BoundaryLayer>> {
        let mut lines: Vec<LineString<f64>> = Vec::new();
        let mut areas = MultiPolygon::new(vec![]);

        for layer in layers {
            let crs = layer
                .crs
                .ok_or_else(|| DelineationError::MissingCrs(format!("boundary layer {}", layer.name)))?;
            let transform = CoordTransform::new(crs, self.working_crs, &layer.name)?;

            let mut polygons = Vec::new();
            let mut skipped = 0usize;
            for geom in &layer.geometries {
                skipped += collect(&transform.reproject(geom), &mut lines, &mut polygons);
            }
            if skipped > 0 {
                log::debug!("boundary layer {}: ignored {} point features", layer.name, skipped);
            }

            for poly in polygons {
                let single = MultiPolygon::new(vec![poly]);
                match try_union(&areas, &single) {
                    Ok(merged) => areas = merged,
                    Err(cause) => {
                        diagnostics.record(Diagnostic::BoundaryUnionFailed {
                            layer: layer.name.clone(),
                            cause,
                        });
                        for p in single {
                            lines.push(p.exterior().clone());
                            lines.extend(p.interiors().iter().cloned());
                        }
                    }
                }
            }
            log::info!("loaded boundary layer {} ({} features)", layer.name, layer.geometries.len());
        }

        let layer = BoundaryLayer::new(MultiLineString::new(lines), areas);
        if layer.is_empty() {
            return Ok(None);
        }
        log::info!(
            "boundary layer: {} split segments from {} layers",
            layer.segment_count(),
            layers.len()
        );
        Ok(Some(layer))
    }
}

// Sorts a geometry into lineal and areal parts; returns the number of point
// features it ignored.
fn collect(geom: &Geometry<f64>, lines: &mut Vec<LineString<f64>>, polygons: &mut Vec<Polygon<f64>>) -> usize {
    match geom {
        Geometry::Line(l) => lines.push(LineString::from(vec![l.start, l.end])),
        Geometry::LineString(ls) => lines.push(ls.clone()),
        Geometry::MultiLineString(mls) => lines.extend(mls.0.iter().cloned()),
        Geometry::Polygon(p) => polygons.push(p.clone()),
        Geometry::MultiPolygon(mp) => polygons.extend(mp.0.iter().cloned()),
        Geometry::Rect(r) => polygons.push(r.to_polygon()),
        Geometry::Triangle(t) => polygons.push(t.to_polygon()),
        Geometry::GeometryCollection(gc) => return gc.iter().map(|g| collect(g, lines, polygons)).sum(),
        Geometry::Point(_) => return 1,
        Geometry::MultiPoint(mp) => return mp.0.len(),
    }
    0
}
