use crate::boundary::{BoundaryFeatures, BoundaryLoader};
use crate::config::DelineationConfig;
use crate::diagnostics::Diagnostics;
use crate::error::Result;
use crate::index::CellIndex;
use crate::merge::SequentialMerger;
use crate::model::{EnumerationArea, Partition, PartitionSummary};
use crate::projection::{CoordTransform, Crs};
use crate::raster::{PopulationGrid, RasterPopulationExtractor};
use crate::refine::QuadtreeRefiner;
use crate::split::{order_units, UnitSplitter};
use crate::utils::parallel::map_ordered;
use geo_types::MultiPolygon;

/// Everything a single delineation run consumes.
#[derive(Debug, Clone, Copy)]
pub struct PartitionInputs<'a> {
    pub population: &'a PopulationGrid,
    pub region: Option<(&'a MultiPolygon<f64>, Crs)>,
    pub boundaries: &'a [BoundaryFeatures],
}

impl<'a> PartitionInputs<'a> {
    pub fn new(population: &'a PopulationGrid) -> Self {
        Self {
            population,
            region: None,
            boundaries: &[],
        }
    }

    pub fn with_region(mut self, region: &'a MultiPolygon<f64>, crs: Crs) -> Self {
        self.region = Some((region, crs));
        self
    }

    pub fn with_boundaries(mut self, boundaries: &'a [BoundaryFeatures]) -> Self {
        self.boundaries = boundaries;
        self
    }
}

/// Runs extraction, boundary loading, splitting, merging and sparse-EA
/// refinement in that order.
///
/// Only input problems (missing or mismatched CRS, malformed raster, invalid
/// config) abort a run. Everything past loading is best effort, with each
/// altered or dropped contribution recorded as a diagnostic.
pub struct Delineator {
    config: DelineationConfig,
}

impl Delineator {
    pub fn new(config: DelineationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DelineationConfig {
        &self.config
    }

    pub fn delineate(&self, inputs: &PartitionInputs) -> Result<Partition> {
        let config = &self.config;
        config.validate()?;
        let crs = config.working_crs;

        let region = match inputs.region {
            Some((geometry, from)) => Some(CoordTransform::new(from, crs, "study region")?.reproject(geometry)),
            None => None,
        };

        let extractor = RasterPopulationExtractor {
            working_crs: crs,
            connectivity: config.connectivity,
            value_tolerance: config.value_tolerance,
            aggregation: config.aggregation,
        };
        let cells = extractor.extract(inputs.population)?;
        log::info!("extracted {} population polygons", cells.len());

        let mut diagnostics = Diagnostics::new();
        let boundary = BoundaryLoader::new(crs).load(inputs.boundaries, &mut diagnostics)?;

        let splitter = UnitSplitter::new(config.split_population, config.snap_grid);
        let mut units = splitter.split(&cells, boundary.as_ref(), &mut diagnostics);
        order_units(&mut units, config.unit_order);
        log::info!("split into {} atomic units", units.len());

        let merger = SequentialMerger {
            constraints: config.constraints,
            repair_geometry: config.repair_geometry,
        };
        let merged = merger.merge(&units, &mut diagnostics);
        log::info!("merged into {} EAs", merged.len());

        let index = CellIndex::new(&cells);
        let refiner = QuadtreeRefiner::from_config(config, &index, &units);
        let (sparse, dense): (Vec<usize>, Vec<usize>) = (0..merged.len()).partition(|&i| refiner.is_sparse(&merged[i]));

        let refined = map_ordered(&sparse, |_, &i| {
            let mut local = Diagnostics::new();
            let fragments = refiner.refine(i, &merged[i], &mut local);
            (fragments, local)
        });

        let mut eas: Vec<EnumerationArea> = Vec::with_capacity(dense.len() + sparse.len());
        eas.extend(dense.iter().map(|&i| merged[i].clone()));
        let mut refined_count = 0;
        for (fragments, local) in refined {
            refined_count += fragments.len();
            eas.extend(fragments);
            diagnostics.absorb(local);
        }
        log::info!(
            "refined {} sparse EAs into {} fragments",
            sparse.len(),
            refined_count
        );

        let summary = PartitionSummary {
            cell_count: cells.len(),
            unit_count: units.len(),
            ea_count: eas.len(),
            oversize_count: eas.iter().filter(|ea| ea.oversize).count(),
            sparse_count: sparse.len(),
            refined_count,
            diagnostic_count: diagnostics.len(),
            input_population: cells.iter().map(|c| c.population).fold(0.0, |a, b| a + b),
            unit_population: units.iter().map(|u| u.population).fold(0.0, |a, b| a + b),
            output_population: eas.iter().map(|ea| ea.population).fold(0.0, |a, b| a + b),
            dropped_population: diagnostics.dropped_population(),
        };
        log::info!(
            "{} EAs ({} oversize), population {} in / {} out, {} diagnostics",
            summary.ea_count,
            summary.oversize_count,
            summary.input_population,
            summary.output_population,
            summary.diagnostic_count
        );

        Ok(Partition {
            eas,
            diagnostics: diagnostics.into_vec(),
            summary,
            region,
        })
    }
}

/// Convenience wrapper over [`Delineator`].
pub fn delineate(config: DelineationConfig, inputs: &PartitionInputs) -> Result<Partition> {
    Delineator::new(config).delineate(inputs)
}
