use crate::diagnostics::Diagnostic;
use geo_types::MultiPolygon;
use serde::Serialize;

/// A maximal group of raster cells sharing a value, in the working CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationCell {
    pub geometry: MultiPolygon<f64>,
    pub population: f64,
    /// Number of raster cells in the group.
    pub cell_count: usize,
}

/// Smallest granule entering the merge. `cell` indexes the PopulationCell it
/// came from.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomicUnit {
    pub geometry: MultiPolygon<f64>,
    pub population: f64,
    pub area_km2: f64,
    pub cell: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EaSource {
    /// Produced by the sequential merge from these atomic units.
    Merged { units: Vec<usize> },
    /// A quadtree fragment of the sparse merged EA `parent`.
    Refined { parent: usize, depth: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumerationArea {
    pub geometry: MultiPolygon<f64>,
    pub population: f64,
    pub area_km2: f64,
    /// Set when the EA violates a cap, which the merge only allows for a
    /// unit that was already over a cap on its own.
    pub oversize: bool,
    pub source: EaSource,
}

impl EnumerationArea {
    pub fn is_refined(&self) -> bool {
        matches!(self.source, EaSource::Refined { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PartitionSummary {
    pub cell_count: usize,
    pub unit_count: usize,
    pub ea_count: usize,
    pub oversize_count: usize,
    pub sparse_count: usize,
    pub refined_count: usize,
    pub diagnostic_count: usize,
    pub input_population: f64,
    pub unit_population: f64,
    pub output_population: f64,
    /// Population lost to dropped units and to refinement recounts.
    pub dropped_population: f64,
}

/// Final output of a delineation run.
#[derive(Debug, Clone)]
pub struct Partition {
    pub eas: Vec<EnumerationArea>,
    pub diagnostics: Vec<Diagnostic>,
    pub summary: PartitionSummary,
    /// Study region in the working CRS, passed through untouched.
    pub region: Option<MultiPolygon<f64>>,
}

impl Partition {
    pub fn total_population(&self) -> f64 {
        self.eas.iter().map(|ea| ea.population).fold(0.0, |a, b| a + b)
    }
}
