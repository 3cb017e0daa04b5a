//! Partitions a gridded population surface into enumeration areas (EAs):
//! contiguous polygons that each stay under a population cap and an area cap.
//!
//! The pipeline runs raster extraction, boundary loading, splitting along the
//! boundaries, a greedy sequential merge, and quadtree refinement of sparse
//! EAs. See [`Delineator`].

pub mod boundary;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod faces;
pub mod geometry;
pub mod graph;
pub mod index;
pub mod io;
pub mod merge;
pub mod model;
pub mod noding;
pub mod pipeline;
pub mod projection;
pub mod raster;
pub mod refine;
pub mod split;
pub mod utils;
pub mod wasm;

pub use boundary::{BoundaryFeatures, BoundaryLayer, BoundaryLoader};
pub use config::{Connectivity, DelineationConfig, EaConstraints, SplitPopulation, UnitOrder, ValueAggregation};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use error::{DelineationError, GeometryError, Result};
pub use faces::FaceBuilder;
pub use index::{CellIndex, CellShares};
pub use merge::SequentialMerger;
pub use model::{AtomicUnit, EaSource, EnumerationArea, Partition, PartitionSummary, PopulationCell};
pub use pipeline::{delineate, Delineator, PartitionInputs};
pub use projection::{CoordTransform, Crs};
pub use raster::{GeoTransform, PopulationGrid, RasterPopulationExtractor};
pub use refine::QuadtreeRefiner;
pub use split::UnitSplitter;
