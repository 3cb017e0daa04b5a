//! Population raster to population polygons.

use crate::config::{Connectivity, ValueAggregation};
use crate::error::{DelineationError, Result};
use crate::faces::FaceBuilder;
use crate::model::PopulationCell;
use crate::projection::{CoordTransform, Crs};
use geo::algorithm::orient::Direction;
use geo::Orient;
use geo_types::{Coord, Line, LineString, MultiPolygon, Polygon};
use std::collections::VecDeque;

/// GDAL-ordered affine transform from (col, row) pixel space to CRS space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub pixel_width: f64,
    pub row_rotation: f64,
    pub origin_y: f64,
    pub col_rotation: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn from_gdal(c: [f64; 6]) -> Self {
        Self {
            origin_x: c[0],
            pixel_width: c[1],
            row_rotation: c[2],
            origin_y: c[3],
            col_rotation: c[4],
            pixel_height: c[5],
        }
    }

    /// North-up grid with square cells; `(origin_x, origin_y)` is the top-left corner.
    pub fn north_up(origin_x: f64, origin_y: f64, cell_size: f64) -> Self {
        Self::from_gdal([origin_x, cell_size, 0.0, origin_y, 0.0, -cell_size])
    }

    pub fn apply(&self, col: f64, row: f64) -> Coord<f64> {
        Coord {
            x: self.origin_x + col * self.pixel_width + row * self.row_rotation,
            y: self.origin_y + col * self.col_rotation + row * self.pixel_height,
        }
    }

    fn determinant(&self) -> f64 {
        self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation
    }
}

/// Single-band population grid, row-major from the top-left cell.
#[derive(Debug, Clone)]
pub struct PopulationGrid {
    width: usize,
    height: usize,
    values: Vec<f64>,
    pub transform: GeoTransform,
    pub crs: Option<Crs>,
    pub nodata: Option<f64>,
}

impl PopulationGrid {
    pub fn new(width: usize, height: usize, values: Vec<f64>, transform: GeoTransform, crs: Option<Crs>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(DelineationError::InvalidRaster(format!("empty grid {}x{}", width, height)));
        }
        if values.len() != width * height {
            return Err(DelineationError::InvalidRaster(format!(
                "{} values for a {}x{} grid",
                values.len(),
                width,
                height
            )));
        }
        let det = transform.determinant();
        if !det.is_finite() || det == 0.0 || !transform.origin_x.is_finite() || !transform.origin_y.is_finite() {
            return Err(DelineationError::InvalidRaster("degenerate geotransform".to_string()));
        }
        Ok(Self {
            width,
            height,
            values,
            transform,
            crs,
            nodata: None,
        })
    }

    pub fn with_nodata(mut self, nodata: Option<f64>) -> Self {
        self.nodata = nodata;
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn value(&self, col: usize, row: usize) -> f64 {
        self.values[row * self.width + col]
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Whether a cell value counts as population at all.
    pub fn is_populated(&self, v: f64) -> bool {
        v.is_finite() && v > 0.0 && self.nodata != Some(v)
    }

    pub fn cell_total(&self) -> f64 {
        self.values.iter().copied().filter(|&v| self.is_populated(v)).fold(0.0, |a, b| a + b)
    }
}

/// Groups equal-valued connected cells and outlines each group as a polygon
/// carrying a population.
pub struct RasterPopulationExtractor {
    pub working_crs: Crs,
    pub connectivity: Connectivity,
    pub value_tolerance: f64,
    pub aggregation: ValueAggregation,
}

impl RasterPopulationExtractor {
    pub fn new(working_crs: Crs) -> Self {
        Self {
            working_crs,
            connectivity: Connectivity::Four,
            value_tolerance: 0.0,
            aggregation: ValueAggregation::PerGroup,
        }
    }

    pub fn extract(&self, grid: &PopulationGrid) -> Result<Vec<PopulationCell>> {
        let crs = grid
            .crs
            .ok_or_else(|| DelineationError::MissingCrs("population raster".to_string()))?;
        let to_working = CoordTransform::new(crs, self.working_crs, "population raster")?;

        let groups = self.label(grid);
        log::debug!("{} populated cell groups in {}x{} raster", groups.len(), grid.width, grid.height);

        let mut labels = vec![usize::MAX; grid.width * grid.height];
        for (g, group) in groups.iter().enumerate() {
            for &cell in &group.cells {
                labels[cell] = g;
            }
        }

        let mut cells = Vec::with_capacity(groups.len());
        for (g, group) in groups.iter().enumerate() {
            let outline = outline_group(grid, &labels, g, &group.cells);
            if outline.0.is_empty() {
                log::warn!("cell group {} produced no outline, skipped", g);
                continue;
            }
            let geometry = to_working
                .reproject(&outline.map_pixels(&grid.transform))
                .orient(Direction::Default);
            let population = match self.aggregation {
                ValueAggregation::PerGroup => group.seed_value,
                ValueAggregation::PerCell => group.cells.iter().map(|&i| grid.values[i]).fold(0.0, |a, b| a + b),
            };
            cells.push(PopulationCell {
                geometry,
                population,
                cell_count: group.cells.len(),
            });
        }
        Ok(cells)
    }

    // Flood fill in row-major discovery order.
    fn label(&self, grid: &PopulationGrid) -> Vec<CellGroup> {
        let (w, h) = (grid.width, grid.height);
        let mut seen = vec![false; w * h];
        let mut groups = Vec::new();
        let mut queue = VecDeque::new();

        for start in 0..w * h {
            let seed_value = grid.values[start];
            if seen[start] || !grid.is_populated(seed_value) {
                continue;
            }
            seen[start] = true;
            queue.push_back(start);
            let mut members = Vec::new();

            while let Some(i) = queue.pop_front() {
                members.push(i);
                let (col, row) = ((i % w) as isize, (i / w) as isize);
                for (dc, dr) in self.neighbours() {
                    let (c, r) = (col + dc, row + dr);
                    if c < 0 || r < 0 || c >= w as isize || r >= h as isize {
                        continue;
                    }
                    let j = r as usize * w + c as usize;
                    let v = grid.values[j];
                    if !seen[j] && grid.is_populated(v) && self.same_value(seed_value, v) {
                        seen[j] = true;
                        queue.push_back(j);
                    }
                }
            }
            members.sort_unstable();
            groups.push(CellGroup {
                seed_value,
                cells: members,
            });
        }
        groups
    }

    fn neighbours(&self) -> &'static [(isize, isize)] {
        const FOUR: [(isize, isize); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
        const EIGHT: [(isize, isize); 8] = [(1, 0), (-1, 0), (0, 1), (0, -1), (1, 1), (1, -1), (-1, 1), (-1, -1)];
        match self.connectivity {
            Connectivity::Four => &FOUR,
            Connectivity::Eight => &EIGHT,
        }
    }

    fn same_value(&self, seed: f64, v: f64) -> bool {
        if self.value_tolerance == 0.0 {
            v == seed
        } else {
            (v - seed).abs() <= self.value_tolerance
        }
    }
}

struct CellGroup {
    seed_value: f64,
    cells: Vec<usize>,
}

/// Outline of one group in pixel space (x = col, y = row).
struct PixelOutline(Vec<Polygon<f64>>);

impl PixelOutline {
    fn map_pixels(&self, transform: &GeoTransform) -> MultiPolygon<f64> {
        let map_ring = |ring: &LineString<f64>| -> LineString<f64> {
            ring.coords().map(|c| transform.apply(c.x, c.y)).collect()
        };
        self.0
            .iter()
            .map(|p| Polygon::new(map_ring(p.exterior()), p.interiors().iter().map(map_ring).collect()))
            .collect()
    }
}

fn outline_group(grid: &PopulationGrid, labels: &[usize], group: usize, cells: &[usize]) -> PixelOutline {
    let w = grid.width;
    let h = grid.height;
    let inside = |col: isize, row: isize| -> bool {
        col >= 0 && row >= 0 && (col as usize) < w && (row as usize) < h && labels[row as usize * w + col as usize] == group
    };

    // Lattice edges between a member cell and anything else.
    let mut builder = FaceBuilder::new();
    for &i in cells {
        let (col, row) = ((i % w) as isize, (i / w) as isize);
        let (x0, y0, x1, y1) = (col as f64, row as f64, col as f64 + 1.0, row as f64 + 1.0);
        if !inside(col, row - 1) {
            builder.add_segment(Line::new((x0, y0), (x1, y0)));
        }
        if !inside(col, row + 1) {
            builder.add_segment(Line::new((x0, y1), (x1, y1)));
        }
        if !inside(col - 1, row) {
            builder.add_segment(Line::new((x0, y0), (x0, y1)));
        }
        if !inside(col + 1, row) {
            builder.add_segment(Line::new((x1, y0), (x1, y1)));
        }
    }

    // Faces of the outline are either group interiors or enclosed gaps. A
    // shell ring keeps its face on the left, so the cell left of its first
    // unit edge tells which one it is.
    let polygons = builder
        .build()
        .into_iter()
        .filter(|face| match face.exterior().lines().next() {
            Some(edge) => {
                let (dx, dy) = (edge.end.x - edge.start.x, edge.end.y - edge.start.y);
                let x = (edge.start.x + edge.end.x - dy) / 2.0;
                let y = (edge.start.y + edge.end.y + dx) / 2.0;
                inside(x.floor() as isize, y.floor() as isize)
            }
            None => false,
        })
        .map(|face| {
            let (exterior, interiors) = face.into_inner();
            Polygon::new(drop_collinear(exterior), interiors.into_iter().map(drop_collinear).collect())
        })
        .collect();
    PixelOutline(polygons)
}

/// Removes vertices lying on a straight run. Lattice coordinates are exact
/// integers, so the cross product test is exact.
fn drop_collinear(ring: LineString<f64>) -> LineString<f64> {
    if ring.0.len() < 5 {
        return ring;
    }
    let mut pts: Vec<Coord<f64>> = ring.0;
    if pts.first() == pts.last() {
        pts.pop();
    }

    let n = pts.len();
    let kept: Vec<Coord<f64>> = (0..n)
        .filter(|&i| {
            let (a, b, c) = (pts[(i + n - 1) % n], pts[i], pts[(i + 1) % n]);
            (b.x - a.x) * (c.y - b.y) - (b.y - a.y) * (c.x - b.x) != 0.0
        })
        .map(|i| pts[i])
        .collect();

    let mut out = if kept.len() >= 3 { kept } else { pts };
    out.push(out[0]);
    LineString::new(out)
}

#[cfg(test)]
#[path = "raster_tests.rs"]
mod tests;
