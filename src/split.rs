use crate::boundary::BoundaryLayer;
use crate::config::{SplitPopulation, UnitOrder};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::faces::FaceBuilder;
use crate::geometry::{area_km2, snap_to_grid};
use crate::model::{AtomicUnit, PopulationCell};
use crate::utils::{parallel::map_ordered, z_order_index};
use geo::algorithm::orient::Direction;
use geo::{Area, BoundingRect, Contains, InteriorPoint, Orient};
use geo_types::{MultiPolygon, Polygon};

// Faces smaller than this (m2) are noding slivers.
const SLIVER_AREA: f64 = 1e-6;

/// Cuts population polygons along the boundary layer into atomic units.
pub struct UnitSplitter {
    pub population: SplitPopulation,
    pub snap_grid: f64,
}

impl UnitSplitter {
    pub fn new(population: SplitPopulation, snap_grid: f64) -> Self {
        Self { population, snap_grid }
    }

    pub fn split(
        &self,
        cells: &[PopulationCell],
        boundary: Option<&BoundaryLayer>,
        diagnostics: &mut Diagnostics,
    ) -> Vec<AtomicUnit> {
        let Some(boundary) = boundary else {
            return cells
                .iter()
                .enumerate()
                .map(|(i, cell)| AtomicUnit {
                    geometry: cell.geometry.clone(),
                    population: cell.population,
                    area_km2: area_km2(&cell.geometry),
                    cell: i,
                })
                .collect();
        };

        let per_cell = map_ordered(cells, |i, cell| self.split_cell(i, cell, boundary));
        let mut units = Vec::with_capacity(cells.len());
        for (fragments, local) in per_cell {
            units.extend(fragments);
            diagnostics.absorb(local);
        }
        log::debug!("{} cells split into {} atomic units", cells.len(), units.len());
        units
    }

    fn split_cell(&self, index: usize, cell: &PopulationCell, boundary: &BoundaryLayer) -> (Vec<AtomicUnit>, Diagnostics) {
        let mut local = Diagnostics::new();
        let whole = |geometry: MultiPolygon<f64>| {
            vec![AtomicUnit {
                area_km2: area_km2(&geometry),
                geometry,
                population: cell.population,
                cell: index,
            }]
        };

        let snapped = snap_to_grid(&cell.geometry, self.snap_grid);
        let Some(bbox) = cell.geometry.bounding_rect() else {
            return (whole(snapped), local);
        };
        let cutters = boundary.segments_touching(bbox);
        if cutters.is_empty() {
            return (whole(snapped), local);
        }

        let mut builder = FaceBuilder::noded(self.snap_grid);
        builder.min_face_area = SLIVER_AREA;
        for poly in &cell.geometry {
            builder.add_polygon(poly);
        }
        builder.add_segments(cutters);

        let faces: Vec<Polygon<f64>> = builder
            .build()
            .into_iter()
            .filter(|face| {
                face.interior_point()
                    .map(|p| cell.geometry.contains(&p))
                    .unwrap_or(false)
            })
            .collect();

        if faces.is_empty() {
            local.record(Diagnostic::SplitFallback { cell: index });
            return (whole(snapped), local);
        }
        if faces.len() == 1 {
            return (whole(snapped), local);
        }

        let areas: Vec<f64> = faces.iter().map(|f| f.unsigned_area()).collect();
        let total = areas.iter().fold(0.0, |a, b| a + b);
        let units = faces
            .into_iter()
            .zip(areas)
            .map(|(face, area)| {
                let population = match self.population {
                    SplitPopulation::Inherit => cell.population,
                    SplitPopulation::AreaWeighted => cell.population * area / total,
                };
                let geometry = MultiPolygon::new(vec![face]).orient(Direction::Default);
                AtomicUnit {
                    area_km2: area_km2(&geometry),
                    geometry,
                    population,
                    cell: index,
                }
            })
            .collect();
        (units, local)
    }
}

/// Reorders units before merging. `Input` keeps the order as given.
pub fn order_units(units: &mut [AtomicUnit], order: UnitOrder) {
    if order == UnitOrder::ZOrder {
        // Stable, so equal keys keep input order.
        units.sort_by_cached_key(|u| {
            u.geometry
                .interior_point()
                .map(|p| z_order_index(p.0))
                .unwrap_or(u64::MAX)
        });
    }
}

#[cfg(test)]
#[path = "split_tests.rs"]
mod tests;
