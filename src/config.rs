use crate::error::{DelineationError, Result};
use crate::projection::Crs;
use serde::{Deserialize, Serialize};

/// Surveyor workload caps for a single EA.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EaConstraints {
    pub max_population: f64,
    pub max_area_km2: f64,
}

impl Default for EaConstraints {
    fn default() -> Self {
        Self {
            max_population: 750.0,
            max_area_km2: 9.0,
        }
    }
}

impl EaConstraints {
    pub fn new(max_population: f64, max_area_km2: f64) -> Self {
        Self {
            max_population,
            max_area_km2,
        }
    }

    pub fn exceeded_by(&self, population: f64, area_km2: f64) -> bool {
        population > self.max_population || area_km2 > self.max_area_km2
    }
}

/// Which neighbouring raster cells belong to the same group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    #[default]
    Four,
    Eight,
}

/// Population assigned to a group of equal-valued cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueAggregation {
    /// The shared cell value, once per group.
    #[default]
    PerGroup,
    /// The sum of the member cells' values.
    PerCell,
}

/// Population carried by the fragments of a cell split along boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitPopulation {
    /// Every fragment carries the full parent population. Double counts when
    /// a cell is split.
    #[default]
    Inherit,
    /// Fragments share the parent population in proportion to their area.
    AreaWeighted,
}

/// Order in which atomic units are fed to the merger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitOrder {
    #[default]
    Input,
    ZOrder,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelineationConfig {
    pub constraints: EaConstraints,
    /// Metric CRS all geometry is reprojected into. Areas, and so the area
    /// cap, are measured in this CRS: the default Web Mercator inflates them
    /// by 1/cos²(latitude), about 4x at 60°. Use `Crs::EqualArea` for true km²
    /// away from the equator.
    pub working_crs: Crs,
    pub connectivity: Connectivity,
    /// Cells within this distance of a group's seed value join the group.
    pub value_tolerance: f64,
    pub aggregation: ValueAggregation,
    pub split_population: SplitPopulation,
    pub unit_order: UnitOrder,
    /// EAs under this fraction of either cap are refined.
    pub sparse_ratio: f64,
    pub max_quad_depth: u32,
    pub min_quad_area_km2: f64,
    /// Grid, in working CRS units, that boundary overlays are noded on.
    pub snap_grid: f64,
    /// Retry failed unions on a repaired candidate before dropping it.
    pub repair_geometry: bool,
}

impl Default for DelineationConfig {
    fn default() -> Self {
        Self {
            constraints: EaConstraints::default(),
            working_crs: Crs::WebMercator,
            connectivity: Connectivity::Four,
            value_tolerance: 0.0,
            aggregation: ValueAggregation::PerGroup,
            split_population: SplitPopulation::Inherit,
            unit_order: UnitOrder::Input,
            sparse_ratio: 0.3,
            max_quad_depth: 16,
            min_quad_area_km2: 0.01,
            snap_grid: 1e-3,
            repair_geometry: true,
        }
    }
}

impl DelineationConfig {
    pub fn new(constraints: EaConstraints) -> Self {
        Self {
            constraints,
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_working_crs(mut self, crs: Crs) -> Self {
        self.working_crs = crs;
        self
    }

    pub fn with_connectivity(mut self, connectivity: Connectivity) -> Self {
        self.connectivity = connectivity;
        self
    }

    pub fn with_value_tolerance(mut self, tolerance: f64) -> Self {
        self.value_tolerance = tolerance;
        self
    }

    pub fn with_aggregation(mut self, aggregation: ValueAggregation) -> Self {
        self.aggregation = aggregation;
        self
    }

    pub fn with_split_population(mut self, policy: SplitPopulation) -> Self {
        self.split_population = policy;
        self
    }

    pub fn with_unit_order(mut self, order: UnitOrder) -> Self {
        self.unit_order = order;
        self
    }

    pub fn with_sparse_ratio(mut self, ratio: f64) -> Self {
        self.sparse_ratio = ratio;
        self
    }

    pub fn with_quadtree_floor(mut self, max_depth: u32, min_area_km2: f64) -> Self {
        self.max_quad_depth = max_depth;
        self.min_quad_area_km2 = min_area_km2;
        self
    }

    pub fn with_snap_grid(mut self, grid: f64) -> Self {
        self.snap_grid = grid;
        self
    }

    pub fn with_repair_geometry(mut self, repair: bool) -> Self {
        self.repair_geometry = repair;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(DelineationError::InvalidConfig(msg));
        let c = &self.constraints;

        if !(c.max_population.is_finite() && c.max_population > 0.0) {
            return invalid(format!("max_population must be positive, got {}", c.max_population));
        }
        if !(c.max_area_km2.is_finite() && c.max_area_km2 > 0.0) {
            return invalid(format!("max_area_km2 must be positive, got {}", c.max_area_km2));
        }
        if !self.working_crs.is_metric() {
            return invalid(format!("working CRS {} is not metric", self.working_crs));
        }
        if !(self.value_tolerance.is_finite() && self.value_tolerance >= 0.0) {
            return invalid(format!("value_tolerance must be >= 0, got {}", self.value_tolerance));
        }
        if !(self.sparse_ratio > 0.0 && self.sparse_ratio <= 1.0) {
            return invalid(format!("sparse_ratio must be in (0, 1], got {}", self.sparse_ratio));
        }
        if self.max_quad_depth == 0 {
            return invalid("max_quad_depth must be at least 1".to_string());
        }
        // The floor is what guarantees quadtree termination.
        if !(self.min_quad_area_km2 > 0.0 && self.min_quad_area_km2 <= c.max_area_km2) {
            return invalid(format!(
                "min_quad_area_km2 must be in (0, max_area_km2], got {}",
                self.min_quad_area_km2
            ));
        }
        if !(self.snap_grid.is_finite() && self.snap_grid >= 0.0) {
            return invalid(format!("snap_grid must be >= 0, got {}", self.snap_grid));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_caps() {
        let config = DelineationConfig::default();
        assert_eq!(config.constraints.max_population, 750.0);
        assert_eq!(config.constraints.max_area_km2, 9.0);
        assert_eq!(config.sparse_ratio, 0.3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = DelineationConfig::from_json(
            r#"{"constraints": {"max_population": 500}, "split_population": "area_weighted",
                "working_crs": "equal_area"}"#,
        )
        .unwrap();
        assert_eq!(config.constraints.max_population, 500.0);
        assert_eq!(config.constraints.max_area_km2, 9.0);
        assert_eq!(config.split_population, SplitPopulation::AreaWeighted);
        assert_eq!(config.working_crs, Crs::EqualArea);
        assert_eq!(config.unit_order, UnitOrder::Input);
    }

    #[test]
    fn test_validate_rejects_missing_floor_and_geographic_working_crs() {
        let no_floor = DelineationConfig::default().with_quadtree_floor(8, 0.0);
        assert!(matches!(no_floor.validate(), Err(DelineationError::InvalidConfig(_))));

        let floor_above_cap = DelineationConfig::default().with_quadtree_floor(8, 10.0);
        assert!(floor_above_cap.validate().is_err());

        let geographic = DelineationConfig::default().with_working_crs(Crs::Wgs84);
        assert!(geographic.validate().is_err());
    }

    #[test]
    fn test_exceeded_by() {
        let caps = EaConstraints::new(750.0, 9.0);
        assert!(!caps.exceeded_by(750.0, 9.0));
        assert!(caps.exceeded_by(750.1, 1.0));
        assert!(caps.exceeded_by(10.0, 9.5));
    }
}
