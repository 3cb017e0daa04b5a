use crate::error::GeometryError;
use serde::Serialize;
use thiserror::Error;

/// Recoverable events. Each one marks data that was altered or dropped on the
/// way to the final partition.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Diagnostic {
    #[error("unit {unit}: union failed ({cause}), merged after geometry repair")]
    UnionRepaired { unit: usize, cause: GeometryError },

    #[error("unit {unit}: union failed after repair ({cause}), dropped population {population}")]
    UnitDropped {
        unit: usize,
        population: f64,
        area_km2: f64,
        cause: GeometryError,
    },

    #[error("EA {ea}: population {population} / area {area_km2} km2 exceeds the configured caps")]
    ConstraintViolation {
        ea: usize,
        population: f64,
        area_km2: f64,
    },

    #[error("cell {cell}: boundary split produced no faces, kept unsplit")]
    SplitFallback { cell: usize },

    #[error("boundary layer {layer}: areal union failed ({cause}), rings used as-is")]
    BoundaryUnionFailed { layer: String, cause: GeometryError },

    #[error("EA {ea}: quadrant clip failed at depth {depth} ({cause})")]
    QuadrantClipFailed {
        ea: usize,
        depth: u32,
        cause: GeometryError,
    },

    #[error("EA {ea}: refinement floor reached at depth {depth} (population {population}, area {area_km2} km2)")]
    RefinementFloorReached {
        ea: usize,
        depth: u32,
        population: f64,
        area_km2: f64,
    },

    #[error("EA {ea}: refined fragments hold {after} of its {before} people")]
    RefinementRecount { ea: usize, before: f64, after: f64 },
}

impl Diagnostic {
    /// Population that left the partition because of this event.
    pub fn dropped_population(&self) -> f64 {
        match self {
            Diagnostic::UnitDropped { population, .. } => *population,
            Diagnostic::RefinementRecount { before, after, .. } => before - after,
            _ => 0.0,
        }
    }

    pub fn kind(&self) -> DiagnosticKind {
        match self {
            Diagnostic::UnionRepaired { .. } => DiagnosticKind::UnionRepaired,
            Diagnostic::UnitDropped { .. } => DiagnosticKind::UnitDropped,
            Diagnostic::ConstraintViolation { .. } => DiagnosticKind::ConstraintViolation,
            Diagnostic::SplitFallback { .. } => DiagnosticKind::SplitFallback,
            Diagnostic::BoundaryUnionFailed { .. } => DiagnosticKind::BoundaryUnionFailed,
            Diagnostic::QuadrantClipFailed { .. } => DiagnosticKind::QuadrantClipFailed,
            Diagnostic::RefinementFloorReached { .. } => DiagnosticKind::RefinementFloorReached,
            Diagnostic::RefinementRecount { .. } => DiagnosticKind::RefinementRecount,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    UnionRepaired,
    UnitDropped,
    ConstraintViolation,
    SplitFallback,
    BoundaryUnionFailed,
    QuadrantClipFailed,
    RefinementFloorReached,
    RefinementRecount,
}

/// Ordered sink for diagnostics. Every recorded event is also logged.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    events: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, diagnostic: Diagnostic) {
        log::warn!("{}", diagnostic);
        self.events.push(diagnostic);
    }

    /// Appends events already logged by a worker-local sink.
    pub fn absorb(&mut self, other: Diagnostics) {
        self.events.extend(other.events);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.events.iter().filter(|d| d.kind() == kind).count()
    }

    pub fn dropped_population(&self) -> f64 {
        self.events.iter().map(Diagnostic::dropped_population).fold(0.0, |a, b| a + b)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.events.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.events
    }
}
