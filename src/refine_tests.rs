use super::*;
use crate::diagnostics::DiagnosticKind;
use crate::model::PopulationCell;
use approx::assert_abs_diff_eq;
use geo::Area;
use geo_types::polygon;

fn square(x: f64, y: f64, size: f64) -> MultiPolygon<f64> {
    MultiPolygon::new(vec![polygon![
        (x: x, y: y), (x: x + size, y: y), (x: x + size, y: y + size), (x: x, y: y + size), (x: x, y: y)
    ]])
}

fn cell(x: f64, y: f64, size: f64, population: f64) -> PopulationCell {
    PopulationCell {
        geometry: square(x, y, size),
        population,
        cell_count: 1,
    }
}

/// One unsplit unit per cell, in cell order.
fn units_of(cells: &[PopulationCell]) -> Vec<AtomicUnit> {
    cells
        .iter()
        .enumerate()
        .map(|(i, c)| AtomicUnit {
            geometry: c.geometry.clone(),
            population: c.population,
            area_km2: area_km2(&c.geometry),
            cell: i,
        })
        .collect()
}

fn ea(geometry: MultiPolygon<f64>, population: f64, units: Vec<usize>) -> EnumerationArea {
    EnumerationArea {
        area_km2: area_km2(&geometry),
        geometry,
        population,
        oversize: false,
        source: EaSource::Merged { units },
    }
}

#[test]
fn test_sparse_check_uses_either_cap() {
    let index = CellIndex::new(&[]);
    let refiner = QuadtreeRefiner::new(EaConstraints::new(750.0, 9.0), &index, &[]);

    assert!(refiner.is_sparse(&ea(square(0.0, 0.0, 4000.0), 50.0, vec![])));
    assert!(!refiner.is_sparse(&ea(square(0.0, 0.0, 2000.0), 400.0, vec![])));
    assert!(refiner.is_sparse(&ea(square(0.0, 0.0, 1000.0), 400.0, vec![])));
}

#[test]
fn test_sparse_ea_is_quartered_without_inventing_population() {
    // 16 km2 parent with one 12.5-person cell in each quadrant.
    let cells = vec![
        cell(500.0, 500.0, 1000.0, 12.5),
        cell(2500.0, 500.0, 1000.0, 12.5),
        cell(500.0, 2500.0, 1000.0, 12.5),
        cell(2500.0, 2500.0, 1000.0, 12.5),
    ];
    let index = CellIndex::new(&cells);
    let units = units_of(&cells);
    let refiner = QuadtreeRefiner::new(EaConstraints::new(750.0, 9.0), &index, &units);
    let parent = ea(square(0.0, 0.0, 4000.0), 50.0, vec![0, 1, 2, 3]);
    let mut diags = Diagnostics::new();

    let fragments = refiner.refine(3, &parent, &mut diags);

    assert_eq!(fragments.len(), 4);
    let population: f64 = fragments.iter().map(|f| f.population).sum();
    let area: f64 = fragments.iter().map(|f| f.area_km2).sum();
    assert!(population <= 50.0);
    assert_abs_diff_eq!(population, 50.0, epsilon = 1e-9);
    assert_abs_diff_eq!(area, 16.0, epsilon = 1e-6);
    for fragment in &fragments {
        assert_eq!(fragment.source, EaSource::Refined { parent: 3, depth: 1 });
        assert_abs_diff_eq!(fragment.area_km2, 4.0, epsilon = 1e-6);
        assert!(!fragment.oversize);
    }
    assert!(diags.is_empty());
}

#[test]
fn test_small_sparse_ea_is_kept_whole() {
    let cells = [cell(100.0, 100.0, 100.0, 30.0)];
    let index = CellIndex::new(&cells);
    let units = units_of(&cells);
    let refiner = QuadtreeRefiner::new(EaConstraints::new(750.0, 9.0), &index, &units);
    let parent = ea(square(0.0, 0.0, 1000.0), 30.0, vec![0]);
    let mut diags = Diagnostics::new();

    let fragments = refiner.refine(0, &parent, &mut diags);

    assert_eq!(fragments.len(), 1);
    assert_eq!(fragments[0].geometry, parent.geometry);
    assert_eq!(fragments[0].population, 30.0);
    assert_eq!(fragments[0].source, EaSource::Refined { parent: 0, depth: 0 });
    assert!(diags.is_empty());
}

#[test]
fn test_dense_spot_recurses_until_area_floor() {
    let cells = [cell(3001.0, 3001.0, 1.0, 10_000.0)];
    let index = CellIndex::new(&cells);
    let units = units_of(&cells);
    let refiner = QuadtreeRefiner::new(EaConstraints::new(750.0, 9.0), &index, &units);
    let mut diags = Diagnostics::new();

    let fragments = refiner.refine(0, &ea(square(0.0, 0.0, 10_000.0), 10_000.0, vec![0]), &mut diags);

    let area: f64 = fragments.iter().map(|f| f.area_km2).sum();
    assert_abs_diff_eq!(area, 100.0, epsilon = 1e-6);
    let population: f64 = fragments.iter().map(|f| f.population).sum();
    assert_eq!(population, 10_000.0);

    for fragment in &fragments {
        assert!(fragment.area_km2 <= 9.0 || fragment.area_km2 >= refiner.min_area_km2);
    }
    let oversize: Vec<&EnumerationArea> = fragments.iter().filter(|f| f.oversize).collect();
    assert_eq!(oversize.len(), 1);
    assert_eq!(oversize[0].source, EaSource::Refined { parent: 0, depth: 6 });
    assert_eq!(diags.count(DiagnosticKind::RefinementFloorReached), 1);
    assert_eq!(diags.count(DiagnosticKind::RefinementRecount), 0);
}

#[test]
fn test_depth_cap_stops_recursion() {
    let index = CellIndex::new(&[]);
    let mut refiner = QuadtreeRefiner::new(EaConstraints::new(750.0, 9.0), &index, &[]);
    refiner.max_depth = 1;
    let mut diags = Diagnostics::new();

    // Each 25 km2 quadrant is still over the area cap.
    let fragments = refiner.refine(0, &ea(square(0.0, 0.0, 10_000.0), 0.0, vec![]), &mut diags);

    assert_eq!(fragments.len(), 4);
    assert!(fragments.iter().all(|f| f.oversize && f.population == 0.0));
    assert_eq!(diags.count(DiagnosticKind::RefinementFloorReached), 4);
}

#[test]
fn test_thin_diagonal_strip_terminates_and_drops_off_centre_quadrants() {
    let strip: MultiPolygon<f64> = MultiPolygon::new(vec![polygon![
        (x: 0.0, y: 0.0), (x: 20_000.0, y: 20_000.0), (x: 20_000.0, y: 20_500.0), (x: 0.0, y: 500.0), (x: 0.0, y: 0.0)
    ]]);
    let parent_area = strip.unsigned_area() / 1e6;
    let cells = [cell(4000.0, 4100.0, 10.0, 20.0), cell(15_000.0, 15_100.0, 10.0, 20.0)];
    let index = CellIndex::new(&cells);
    let units = units_of(&cells);
    let refiner = QuadtreeRefiner::new(EaConstraints::new(750.0, 9.0), &index, &units);
    let mut diags = Diagnostics::new();

    let fragments = refiner.refine(0, &ea(strip, 40.0, vec![0, 1]), &mut diags);

    assert!(!fragments.is_empty());
    let area: f64 = fragments.iter().map(|f| f.area_km2).sum();
    let population: f64 = fragments.iter().map(|f| f.population).sum();
    assert!(area <= parent_area + 1e-6);
    assert!(population <= 40.0);
    for fragment in &fragments {
        assert!(fragment.area_km2 <= 9.0 || fragment.area_km2 >= refiner.min_area_km2);
    }
}

#[test]
fn test_recount_ignores_cells_of_other_eas() {
    // The second cell's centroid lies inside the parent but the cell was
    // merged into another EA.
    let cells = [cell(0.0, 0.0, 100.0, 30.0), cell(400.0, 400.0, 100.0, 700.0)];
    let index = CellIndex::new(&cells);
    let units = units_of(&cells);
    let refiner = QuadtreeRefiner::new(EaConstraints::new(750.0, 9.0), &index, &units);
    let mut diags = Diagnostics::new();

    let fragments = refiner.refine(0, &ea(square(0.0, 0.0, 1000.0), 30.0, vec![0]), &mut diags);

    assert_eq!(fragments.len(), 1);
    assert_eq!(fragments[0].population, 30.0);
    assert!(!fragments[0].oversize);
    assert!(diags.is_empty());
}

#[test]
fn test_parent_population_is_shared_by_its_units() {
    // Both halves of one split cell landed in the parent, each inheriting 40.
    let cells = [cell(0.0, 0.0, 100.0, 40.0)];
    let index = CellIndex::new(&cells);
    let halves = vec![
        AtomicUnit {
            geometry: square(0.0, 0.0, 50.0),
            population: 40.0,
            area_km2: 0.0025,
            cell: 0,
        },
        AtomicUnit {
            geometry: square(50.0, 50.0, 50.0),
            population: 40.0,
            area_km2: 0.0025,
            cell: 0,
        },
    ];
    let refiner = QuadtreeRefiner::new(EaConstraints::new(750.0, 9.0), &index, &halves);
    let mut diags = Diagnostics::new();

    let fragments = refiner.refine(0, &ea(square(0.0, 0.0, 100.0), 80.0, vec![0, 1]), &mut diags);

    assert_eq!(fragments[0].population, 80.0);
    assert!(diags.is_empty());
}

#[test]
fn test_lost_centroid_is_recorded_as_recount() {
    // The parent covers only the lower strip of its cell; the cell centroid
    // lies above it.
    let cells = [cell(0.0, 0.0, 100.0, 25.0)];
    let index = CellIndex::new(&cells);
    let lower = MultiPolygon::new(vec![polygon![
        (x: 0.0, y: 0.0), (x: 100.0, y: 0.0), (x: 100.0, y: 40.0), (x: 0.0, y: 40.0), (x: 0.0, y: 0.0)
    ]]);
    let units = vec![AtomicUnit {
        area_km2: area_km2(&lower),
        geometry: lower.clone(),
        population: 25.0,
        cell: 0,
    }];
    let refiner = QuadtreeRefiner::new(EaConstraints::new(750.0, 9.0), &index, &units);
    let mut diags = Diagnostics::new();

    let fragments = refiner.refine(4, &ea(lower, 25.0, vec![0]), &mut diags);

    assert_eq!(fragments.len(), 1);
    assert_eq!(fragments[0].population, 0.0);
    assert_eq!(
        diags.iter().collect::<Vec<_>>(),
        vec![&Diagnostic::RefinementRecount {
            ea: 4,
            before: 25.0,
            after: 0.0
        }]
    );
    assert_eq!(diags.dropped_population(), 25.0);
}
