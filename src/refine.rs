use crate::config::{DelineationConfig, EaConstraints};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::geometry::{area_km2, try_intersection, M2_PER_KM2};
use crate::index::{CellIndex, CellShares};
use crate::model::{AtomicUnit, EaSource, EnumerationArea};
use geo::{BoundingRect, Contains};
use geo_types::{coord, MultiPolygon, Point, Rect};

const RECOUNT_TOLERANCE: f64 = 1e-9;

/// Quadtree re-decomposition of sparse EAs.
///
/// A geometry whose area is already within the area cap is kept whole.
/// Otherwise its bounding box is quartered, quadrants whose centre falls
/// outside the geometry are dropped, the rest are clipped to it and
/// repopulated from the cell index. Quadrants still over a cap are split again
/// until `max_depth` or the `min_area_km2` floor stops the recursion.
///
/// Fragments only draw on the cells the parent was merged from, each with the
/// population the parent's units carried, so they never hold more people than
/// the parent.
pub struct QuadtreeRefiner<'a> {
    pub constraints: EaConstraints,
    pub sparse_ratio: f64,
    pub max_depth: u32,
    pub min_area_km2: f64,
    index: &'a CellIndex,
    units: &'a [AtomicUnit],
}

impl<'a> QuadtreeRefiner<'a> {
    pub fn new(constraints: EaConstraints, index: &'a CellIndex, units: &'a [AtomicUnit]) -> Self {
        let defaults = DelineationConfig::default();
        Self {
            constraints,
            sparse_ratio: defaults.sparse_ratio,
            max_depth: defaults.max_quad_depth,
            min_area_km2: defaults.min_quad_area_km2,
            index,
            units,
        }
    }

    pub fn from_config(config: &DelineationConfig, index: &'a CellIndex, units: &'a [AtomicUnit]) -> Self {
        Self {
            constraints: config.constraints,
            sparse_ratio: config.sparse_ratio,
            max_depth: config.max_quad_depth,
            min_area_km2: config.min_quad_area_km2,
            index,
            units,
        }
    }

    pub fn is_sparse(&self, ea: &EnumerationArea) -> bool {
        ea.population < self.sparse_ratio * self.constraints.max_population
            || ea.area_km2 < self.sparse_ratio * self.constraints.max_area_km2
    }

    /// Fragments replacing EA number `parent`. May be empty when every
    /// quadrant fails the centre test. A fragment total that differs from the
    /// parent's population is recorded as a `RefinementRecount`.
    pub fn refine(&self, parent: usize, ea: &EnumerationArea, diagnostics: &mut Diagnostics) -> Vec<EnumerationArea> {
        let shares = self.shares(ea);
        let mut fragments = Vec::new();
        let area = area_km2(&ea.geometry);
        if area <= self.constraints.max_area_km2 {
            let population = self.index.population_within(&ea.geometry, &shares);
            fragments.push(self.fragment(parent, ea.geometry.clone(), population, area, 0));
        } else {
            self.subdivide(parent, &ea.geometry, &shares, 0, &mut fragments, diagnostics);
        }

        let after = fragments.iter().map(|f| f.population).fold(0.0, |a, b| a + b);
        if (after - ea.population).abs() > RECOUNT_TOLERANCE * ea.population.abs().max(1.0) {
            diagnostics.record(Diagnostic::RefinementRecount {
                ea: parent,
                before: ea.population,
                after,
            });
        }
        log::debug!("EA {} refined into {} fragments", parent, fragments.len());
        fragments
    }

    /// Population per cell carried by the units `ea` was merged from.
    fn shares(&self, ea: &EnumerationArea) -> CellShares {
        let mut shares = CellShares::new();
        if let EaSource::Merged { units } = &ea.source {
            for unit in units.iter().filter_map(|&u| self.units.get(u)) {
                *shares.entry(unit.cell).or_insert(0.0) += unit.population;
            }
        }
        shares
    }

    fn subdivide(
        &self,
        parent: usize,
        geometry: &MultiPolygon<f64>,
        shares: &CellShares,
        depth: u32,
        out: &mut Vec<EnumerationArea>,
        diagnostics: &mut Diagnostics,
    ) {
        let Some(bbox) = geometry.bounding_rect() else {
            return;
        };
        let child_area = bbox.width() * bbox.height() / 4.0 / M2_PER_KM2;
        if depth >= self.max_depth || child_area < self.min_area_km2 {
            let population = self.index.population_within(geometry, shares);
            let area = area_km2(geometry);
            if self.constraints.exceeded_by(population, area) {
                diagnostics.record(Diagnostic::RefinementFloorReached {
                    ea: parent,
                    depth,
                    population,
                    area_km2: area,
                });
            }
            out.push(self.fragment(parent, geometry.clone(), population, area, depth));
            return;
        }

        for quad in quadrants(bbox) {
            if !geometry.contains(&Point::from(quad.center())) {
                continue;
            }
            let clipped = match try_intersection(&MultiPolygon::new(vec![quad.to_polygon()]), geometry) {
                Ok(clipped) => clipped,
                Err(cause) => {
                    diagnostics.record(Diagnostic::QuadrantClipFailed {
                        ea: parent,
                        depth: depth + 1,
                        cause,
                    });
                    continue;
                }
            };
            if clipped.0.is_empty() {
                continue;
            }
            let population = self.index.population_within(&clipped, shares);
            let area = area_km2(&clipped);
            if self.constraints.exceeded_by(population, area) {
                self.subdivide(parent, &clipped, shares, depth + 1, out, diagnostics);
            } else {
                out.push(self.fragment(parent, clipped, population, area, depth + 1));
            }
        }
    }

    fn fragment(
        &self,
        parent: usize,
        geometry: MultiPolygon<f64>,
        population: f64,
        area_km2: f64,
        depth: u32,
    ) -> EnumerationArea {
        EnumerationArea {
            geometry,
            population,
            area_km2,
            oversize: self.constraints.exceeded_by(population, area_km2),
            source: EaSource::Refined { parent, depth },
        }
    }
}

/// SW, SE, NW, NE.
fn quadrants(rect: Rect<f64>) -> [Rect<f64>; 4] {
    let (min, max, mid) = (rect.min(), rect.max(), rect.center());
    [
        Rect::new(min, mid),
        Rect::new(coord! { x: mid.x, y: min.y }, coord! { x: max.x, y: mid.y }),
        Rect::new(coord! { x: min.x, y: mid.y }, coord! { x: mid.x, y: max.y }),
        Rect::new(mid, max),
    ]
}

#[cfg(test)]
#[path = "refine_tests.rs"]
mod tests;
