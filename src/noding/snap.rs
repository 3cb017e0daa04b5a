use crate::geometry::snap_coord;
use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo_types::{Coord, Line};
use rstar::{RTree, RTreeObject, AABB};
use std::cmp::Ordering;
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug)]
struct IndexedLine {
    line: Line<f64>,
    index: usize,
}

impl RTreeObject for IndexedLine {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        let (a, b) = (self.line.start, self.line.end);
        AABB::from_corners([a.x.min(b.x), a.y.min(b.y)], [a.x.max(b.x), a.y.max(b.y)])
    }
}

/// Splits segments at every mutual intersection, with all produced
/// coordinates rounded to a fixed grid. Rounding can introduce new
/// crossings, so noding repeats until stable or `max_iter` passes.
pub struct SnapNoder {
    pub grid_size: f64,
    pub max_iter: usize,
}

impl SnapNoder {
    pub fn new(grid_size: f64) -> Self {
        Self { grid_size, max_iter: 10 }
    }

    pub fn node(&self, lines: Vec<Line<f64>>) -> Vec<Line<f64>> {
        let mut lines: Vec<Line<f64>> = lines
            .into_iter()
            .map(|l| Line::new(self.snap(l.start), self.snap(l.end)))
            .filter(|l| l.start != l.end)
            .collect();
        normalize(&mut lines);

        for pass in 0..self.max_iter {
            let splits = self.find_splits(&lines);
            if splits.is_empty() {
                log::trace!("noding stable after {} passes", pass);
                break;
            }

            let mut next = Vec::with_capacity(lines.len() + splits.len() * 2);
            for (i, line) in lines.iter().enumerate() {
                match splits.get(&i) {
                    Some(points) => split_line(*line, points, &mut next),
                    None => next.push(*line),
                }
            }
            normalize(&mut next);
            lines = next;
        }
        lines
    }

    fn snap(&self, c: Coord<f64>) -> Coord<f64> {
        snap_coord(c, self.grid_size)
    }

    // BTreeMap keeps the split order independent of hashing.
    fn find_splits(&self, lines: &[Line<f64>]) -> BTreeMap<usize, Vec<Coord<f64>>> {
        let tree = RTree::bulk_load(
            lines
                .iter()
                .enumerate()
                .map(|(index, &line)| IndexedLine { line, index })
                .collect(),
        );

        let mut splits: BTreeMap<usize, Vec<Coord<f64>>> = BTreeMap::new();
        let mut push = |idx: usize, line: Line<f64>, p: Coord<f64>| {
            if p != line.start && p != line.end {
                splits.entry(idx).or_default().push(p);
            }
        };

        for (a, b) in tree.intersection_candidates_with_other_tree(&tree) {
            if a.index >= b.index {
                continue;
            }
            match line_intersection(a.line, b.line) {
                Some(LineIntersection::SinglePoint { intersection, .. }) => {
                    let p = self.snap(intersection);
                    push(a.index, a.line, p);
                    push(b.index, b.line, p);
                }
                Some(LineIntersection::Collinear { intersection }) => {
                    for p in [self.snap(intersection.start), self.snap(intersection.end)] {
                        push(a.index, a.line, p);
                        push(b.index, b.line, p);
                    }
                }
                None => {}
            }
        }
        splits
    }
}

fn split_line(line: Line<f64>, interior: &[Coord<f64>], out: &mut Vec<Line<f64>>) {
    let start = line.start;
    let dist = |p: &Coord<f64>| (p.x - start.x).powi(2) + (p.y - start.y).powi(2);

    let mut points = Vec::with_capacity(interior.len() + 2);
    points.push(line.start);
    points.extend_from_slice(interior);
    points.push(line.end);
    points.sort_by(|a, b| dist(a).partial_cmp(&dist(b)).unwrap_or(Ordering::Equal));
    points.dedup();

    out.extend(
        points
            .windows(2)
            .filter(|w| w[0] != w[1])
            .map(|w| Line::new(w[0], w[1])),
    );
}

/// Orients every segment left-to-right (then bottom-to-top), sorts and drops
/// exact duplicates.
fn normalize(lines: &mut Vec<Line<f64>>) {
    for seg in lines.iter_mut() {
        let (a, b) = (seg.start, seg.end);
        if (a.x, a.y) > (b.x, b.y) {
            *seg = Line::new(b, a);
        }
    }
    lines.sort_by(|a, b| {
        (a.start.x, a.start.y, a.end.x, a.end.y)
            .partial_cmp(&(b.start.x, b.start.y, b.end.x, b.end.y))
            .unwrap_or(Ordering::Equal)
    });
    lines.dedup();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(x0: f64, y0: f64, x1: f64, y1: f64) -> Line<f64> {
        Line::new(Coord { x: x0, y: y0 }, Coord { x: x1, y: y1 })
    }

    #[test]
    fn test_crossing_segments_split_at_shared_node() {
        let noded = SnapNoder::new(1e-6).node(vec![seg(0.0, 0.0, 10.0, 10.0), seg(0.0, 10.0, 10.0, 0.0)]);
        assert_eq!(noded.len(), 4);
        let center = Coord { x: 5.0, y: 5.0 };
        assert!(noded.iter().all(|l| l.start == center || l.end == center));
    }

    #[test]
    fn test_t_junction_splits_only_the_through_segment() {
        let noded = SnapNoder::new(1e-6).node(vec![seg(0.0, 0.0, 10.0, 0.0), seg(5.0, 0.0, 5.0, 5.0)]);
        assert_eq!(noded.len(), 3);
    }

    #[test]
    fn test_duplicates_and_reversed_duplicates_removed() {
        let noded = SnapNoder::new(1e-6).node(vec![
            seg(0.0, 0.0, 10.0, 0.0),
            seg(10.0, 0.0, 0.0, 0.0),
            seg(0.0, 0.0, 10.0, 0.0),
        ]);
        assert_eq!(noded, vec![seg(0.0, 0.0, 10.0, 0.0)]);
    }

    #[test]
    fn test_collinear_overlap_is_split_and_merged() {
        let noded = SnapNoder::new(1e-6).node(vec![seg(0.0, 0.0, 10.0, 0.0), seg(5.0, 0.0, 15.0, 0.0)]);
        assert_eq!(
            noded,
            vec![seg(0.0, 0.0, 5.0, 0.0), seg(5.0, 0.0, 10.0, 0.0), seg(10.0, 0.0, 15.0, 0.0)]
        );
    }
}
