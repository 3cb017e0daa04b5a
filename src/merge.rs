use crate::config::EaConstraints;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::GeometryError;
use crate::geometry::{area_km2, repair, try_union};
use crate::model::{AtomicUnit, EaSource, EnumerationArea};
use geo_types::MultiPolygon;

/// Running EA under construction.
struct Accumulator {
    geometry: MultiPolygon<f64>,
    population: f64,
    area_km2: f64,
    units: Vec<usize>,
}

impl Accumulator {
    fn start(index: usize, unit: &AtomicUnit) -> Self {
        Self {
            geometry: unit.geometry.clone(),
            population: unit.population,
            area_km2: unit.area_km2,
            units: vec![index],
        }
    }
}

#[derive(Default)]
struct MergeState {
    finished: Vec<EnumerationArea>,
    current: Option<Accumulator>,
}

/// Greedy, order-dependent merge of atomic units into EAs.
pub struct SequentialMerger {
    pub constraints: EaConstraints,
    pub repair_geometry: bool,
}

impl SequentialMerger {
    pub fn new(constraints: EaConstraints) -> Self {
        Self {
            constraints,
            repair_geometry: true,
        }
    }

    pub fn merge(&self, units: &[AtomicUnit], diagnostics: &mut Diagnostics) -> Vec<EnumerationArea> {
        let state = units
            .iter()
            .enumerate()
            .fold(MergeState::default(), |state, (i, unit)| self.step(state, i, unit, diagnostics));

        let MergeState { mut finished, current } = state;
        if let Some(acc) = current {
            self.emit(&mut finished, acc, diagnostics);
        }
        log::debug!("{} units merged into {} EAs", units.len(), finished.len());
        finished
    }

    fn step(&self, mut state: MergeState, index: usize, unit: &AtomicUnit, diagnostics: &mut Diagnostics) -> MergeState {
        let overflows = state.current.as_ref().is_some_and(|acc| {
            acc.population + unit.population > self.constraints.max_population
                || acc.area_km2 + unit.area_km2 > self.constraints.max_area_km2
        });
        if overflows {
            if let Some(acc) = state.current.take() {
                self.emit(&mut state.finished, acc, diagnostics);
            }
        }

        match state.current.as_mut() {
            None => state.current = Some(Accumulator::start(index, unit)),
            Some(acc) => match self.union(&acc.geometry, &unit.geometry) {
                Ok((geometry, repaired)) => {
                    acc.area_km2 = match repaired {
                        // Repair may have shed part of the unit.
                        Some(cause) => {
                            diagnostics.record(Diagnostic::UnionRepaired { unit: index, cause });
                            area_km2(&geometry)
                        }
                        None => acc.area_km2 + unit.area_km2,
                    };
                    acc.geometry = geometry;
                    acc.population += unit.population;
                    acc.units.push(index);
                }
                Err(cause) => diagnostics.record(Diagnostic::UnitDropped {
                    unit: index,
                    population: unit.population,
                    area_km2: unit.area_km2,
                    cause,
                }),
            },
        }
        state
    }

    /// Union, retried once on repaired operands. On success also returns the
    /// original failure if a repair was needed. A candidate that repair
    /// empties is an error.
    fn union(
        &self,
        acc: &MultiPolygon<f64>,
        candidate: &MultiPolygon<f64>,
    ) -> Result<(MultiPolygon<f64>, Option<GeometryError>), GeometryError> {
        let first = match try_union(acc, candidate) {
            Ok(geometry) => return Ok((geometry, None)),
            Err(e) => e,
        };
        if !self.repair_geometry {
            return Err(first);
        }
        let acc = repair(acc)?;
        let candidate = repair(candidate)?;
        try_union(&acc, &candidate).map(|geometry| (geometry, Some(first)))
    }

    fn emit(&self, finished: &mut Vec<EnumerationArea>, acc: Accumulator, diagnostics: &mut Diagnostics) {
        let oversize = self.constraints.exceeded_by(acc.population, acc.area_km2);
        if oversize {
            diagnostics.record(Diagnostic::ConstraintViolation {
                ea: finished.len(),
                population: acc.population,
                area_km2: acc.area_km2,
            });
        }
        finished.push(EnumerationArea {
            geometry: acc.geometry,
            population: acc.population,
            area_km2: acc.area_km2,
            oversize,
            source: EaSource::Merged { units: acc.units },
        });
    }
}

#[cfg(test)]
#[path = "merge_tests.rs"]
mod tests;
