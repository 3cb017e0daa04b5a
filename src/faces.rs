use crate::graph::PlanarGraph;
use crate::noding::SnapNoder;
use geo::{Area, BoundingRect, Contains};
use geo_types::{Geometry, Line, LineString, Polygon};
use rstar::{RTree, RTreeObject, AABB};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

// Shell indexed by its envelope for hole assignment.
struct IndexedShell {
    polygon: Polygon<f64>,
    area: f64,
    index: usize,
}

impl RTreeObject for IndexedShell {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        envelope_of(&self.polygon)
    }
}

fn envelope_of(poly: &Polygon<f64>) -> AABB<[f64; 2]> {
    match poly.bounding_rect() {
        Some(r) => AABB::from_corners([r.min().x, r.min().y], [r.max().x, r.max().y]),
        None => AABB::from_point([f64::NAN, f64::NAN]),
    }
}

/// Builds the bounded faces of a set of linework: every region enclosed by
/// the lines becomes one polygon, with nested rings attached as holes.
///
/// With `node_input` the segments are first split at their intersections;
/// without it they must already meet only at endpoints (raster lattice
/// edges, for instance).
pub struct FaceBuilder {
    pub node_input: bool,
    pub snap_grid: f64,
    /// Faces with less area than this are dropped as slivers.
    pub min_face_area: f64,
    segments: Vec<Line<f64>>,
}

impl Default for FaceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FaceBuilder {
    pub fn new() -> Self {
        Self {
            node_input: false,
            snap_grid: 0.0,
            min_face_area: 0.0,
            segments: Vec::new(),
        }
    }

    pub fn noded(snap_grid: f64) -> Self {
        Self {
            node_input: true,
            snap_grid,
            ..Self::new()
        }
    }

    pub fn add_segment(&mut self, seg: Line<f64>) {
        self.segments.push(seg);
    }

    pub fn add_segments<I: IntoIterator<Item = Line<f64>>>(&mut self, segs: I) {
        self.segments.extend(segs);
    }

    pub fn add_line_string(&mut self, ls: &LineString<f64>) {
        self.segments.extend(ls.lines());
    }

    pub fn add_geometry(&mut self, geom: &Geometry<f64>) {
        match geom {
            Geometry::Line(l) => self.add_segment(*l),
            Geometry::LineString(ls) => self.add_line_string(ls),
            Geometry::MultiLineString(mls) => mls.iter().for_each(|ls| self.add_line_string(ls)),
            Geometry::Polygon(poly) => self.add_polygon(poly),
            Geometry::MultiPolygon(mp) => mp.iter().for_each(|p| self.add_polygon(p)),
            Geometry::Rect(r) => self.add_polygon(&r.to_polygon()),
            Geometry::Triangle(t) => self.add_polygon(&t.to_polygon()),
            Geometry::GeometryCollection(gc) => gc.iter().for_each(|g| self.add_geometry(g)),
            Geometry::Point(_) | Geometry::MultiPoint(_) => {}
        }
    }

    pub fn add_polygon(&mut self, poly: &Polygon<f64>) {
        self.add_line_string(poly.exterior());
        for ring in poly.interiors() {
            self.add_line_string(ring);
        }
    }

    pub fn build(&self) -> Vec<Polygon<f64>> {
        let segments = if self.node_input {
            SnapNoder::new(self.snap_grid).node(self.segments.clone())
        } else {
            self.segments.clone()
        };

        let mut graph = PlanarGraph::from_segments(segments);
        graph.sort_edges();
        let dangles = graph.prune_dangles();
        let rings = graph.face_rings();
        log::trace!("{} face rings, {} dangling nodes pruned", rings.len(), dangles);

        let mut shells = Vec::new();
        let mut holes = Vec::new();
        for ring in rings {
            let poly = Polygon::new(ring, vec![]);
            let area = poly.signed_area();
            if area.abs() <= self.min_face_area {
                continue;
            }
            if area > 0.0 {
                shells.push(poly);
            } else {
                holes.push(poly);
            }
        }

        let tree = RTree::bulk_load(
            shells
                .iter()
                .enumerate()
                .map(|(index, p)| IndexedShell {
                    polygon: p.clone(),
                    area: p.unsigned_area(),
                    index,
                })
                .collect(),
        );

        // A clockwise ring is the outside of some connected component. It is
        // a hole of the smallest strictly larger face containing it; its own
        // CCW twin has the same area and never qualifies.
        let owner = |hole: &Polygon<f64>| -> Option<(usize, LineString<f64>)> {
            let hole_area = hole.unsigned_area();
            let slack = self.min_face_area.max(hole_area * 1e-9);
            tree.locate_in_envelope_intersecting(&envelope_of(hole))
                .filter(|shell| shell.area > hole_area + slack && shell.polygon.contains(hole))
                .min_by(|a, b| a.area.total_cmp(&b.area))
                .map(|shell| (shell.index, hole.exterior().clone()))
        };

        #[cfg(feature = "parallel")]
        let assignments: Vec<(usize, LineString<f64>)> = holes.par_iter().filter_map(owner).collect();
        #[cfg(not(feature = "parallel"))]
        let assignments: Vec<(usize, LineString<f64>)> = holes.iter().filter_map(owner).collect();

        let mut interiors: Vec<Vec<LineString<f64>>> = vec![Vec::new(); shells.len()];
        for (idx, ring) in assignments {
            interiors[idx].push(ring);
        }

        shells
            .into_iter()
            .zip(interiors)
            .map(|(shell, holes)| Polygon::new(shell.into_inner().0, holes))
            .collect()
    }
}

#[cfg(test)]
#[path = "faces_tests.rs"]
mod tests;
