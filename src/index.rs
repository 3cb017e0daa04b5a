use crate::model::PopulationCell;
use geo::{BoundingRect, Centroid, Contains};
use geo_types::{MultiPolygon, Point};
use rstar::{RTree, RTreeObject, AABB};
use std::collections::HashMap;

/// Population an EA draws from each PopulationCell, keyed by cell index.
pub type CellShares = HashMap<usize, f64>;

#[derive(Clone, Copy, Debug)]
struct CellCentroid {
    point: Point<f64>,
    cell: usize,
}

impl RTreeObject for CellCentroid {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.point.x(), self.point.y()])
    }
}

/// R-tree over PopulationCell centroids. A cell belongs to a region when the
/// region contains its centroid.
pub struct CellIndex {
    tree: RTree<CellCentroid>,
}

impl CellIndex {
    pub fn new(cells: &[PopulationCell]) -> Self {
        let entries = cells
            .iter()
            .enumerate()
            .filter_map(|(cell, pc)| pc.geometry.centroid().map(|point| CellCentroid { point, cell }))
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Sums `shares` over the cells whose centroid lies in `region`. Cells
    /// without a share count for nothing.
    pub fn population_within(&self, region: &MultiPolygon<f64>, shares: &CellShares) -> f64 {
        let Some(bbox) = region.bounding_rect() else {
            return 0.0;
        };
        let env = AABB::from_corners([bbox.min().x, bbox.min().y], [bbox.max().x, bbox.max().y]);
        self.tree
            .locate_in_envelope(&env)
            .filter(|c| region.contains(&c.point))
            .filter_map(|c| shares.get(&c.cell))
            .fold(0.0, |a, b| a + b)
    }
}
