use crate::boundary::BoundaryFeatures;
use crate::config::DelineationConfig;
use crate::error::{DelineationError, Result};
use crate::io::ascii_grid;
use crate::model::{EnumerationArea, Partition};
use crate::pipeline::{Delineator, PartitionInputs};
use crate::projection::{CoordTransform, Crs};
use ::geojson::{feature::Id, Feature, FeatureCollection, GeoJson, Geometry, JsonObject, Value};
use geo_types::{Geometry as GeoGeometry, MultiPolygon};
use serde::Deserialize;
use std::str::FromStr;

/// A boundary layer given as embedded GeoJSON.
#[derive(Debug, Clone, Deserialize)]
pub struct BoundaryInput {
    pub name: String,
    pub geojson: serde_json::Value,
    /// Defaults to WGS84, as RFC 7946 requires.
    #[serde(default)]
    pub crs: Option<Crs>,
}

/// A whole run described as JSON, for the WASM and CLI front ends.
#[derive(Debug, Clone, Deserialize)]
pub struct DelineationRequest {
    /// Population raster as ESRI ASCII grid text.
    #[serde(default)]
    pub population: Option<String>,
    #[serde(default)]
    pub population_crs: Option<Crs>,
    #[serde(default)]
    pub boundaries: Vec<BoundaryInput>,
    #[serde(default)]
    pub region: Option<serde_json::Value>,
    #[serde(default)]
    pub region_crs: Option<Crs>,
    #[serde(default)]
    pub config: DelineationConfig,
    /// CRS of the returned EA geometries.
    #[serde(default = "wgs84")]
    pub output_crs: Crs,
}

fn wgs84() -> Crs {
    Crs::Wgs84
}

impl FromStr for DelineationRequest {
    type Err = DelineationError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

fn geometries(geojson: GeoJson) -> Result<Vec<GeoGeometry<f64>>> {
    let raw: Vec<Geometry> = match geojson {
        GeoJson::FeatureCollection(fc) => fc.features.into_iter().filter_map(|f| f.geometry).collect(),
        GeoJson::Feature(feature) => feature.geometry.into_iter().collect(),
        GeoJson::Geometry(geometry) => vec![geometry],
    };
    raw.into_iter()
        .map(|g| GeoGeometry::<f64>::try_from(g).map_err(DelineationError::from))
        .collect()
}

/// Reads one boundary layer. Features without geometry are skipped.
pub fn read_boundary(name: &str, text: &str, crs: Option<Crs>) -> Result<BoundaryFeatures> {
    let geojson = GeoJson::from_str(text)?;
    boundary_from_geojson(name, geojson, crs)
}

fn boundary_from_geojson(name: &str, geojson: GeoJson, crs: Option<Crs>) -> Result<BoundaryFeatures> {
    let geometries = geometries(geojson)?;
    log::debug!("boundary layer {}: {} geometries", name, geometries.len());
    Ok(BoundaryFeatures::new(name, Some(crs.unwrap_or(Crs::Wgs84)), geometries))
}

/// All polygonal parts of a GeoJSON document as one multipolygon.
pub fn read_region(geojson: GeoJson) -> Result<MultiPolygon<f64>> {
    let mut polygons = Vec::new();
    for geometry in geometries(geojson)? {
        match geometry {
            GeoGeometry::Polygon(p) => polygons.push(p),
            GeoGeometry::MultiPolygon(mp) => polygons.extend(mp),
            _ => {}
        }
    }
    if polygons.is_empty() {
        return Err(DelineationError::MalformedInput(
            "study region has no polygon geometry".to_string(),
        ));
    }
    Ok(MultiPolygon::new(polygons))
}

/// EAs as GeoJSON features, reprojected from `from` into `to`. The feature id
/// is the EA's position in the output.
pub fn eas_to_geojson(eas: &[EnumerationArea], from: Crs, to: Crs) -> Result<FeatureCollection> {
    let transform = CoordTransform::new(from, to, "EA output")?;
    let features = eas
        .iter()
        .enumerate()
        .map(|(i, ea)| -> Result<Feature> {
            let mut properties = JsonObject::new();
            properties.insert("id".to_string(), i.into());
            properties.insert("population".to_string(), ea.population.into());
            properties.insert("area_km2".to_string(), ea.area_km2.into());
            properties.insert("oversize".to_string(), ea.oversize.into());
            properties.insert("source".to_string(), serde_json::to_value(&ea.source)?);
            Ok(Feature {
                bbox: None,
                geometry: Some(Geometry::new(Value::from(&transform.reproject(&ea.geometry)))),
                id: Some(Id::Number(i.into())),
                properties: Some(properties),
                foreign_members: None,
            })
        })
        .collect::<Result<Vec<Feature>>>()?;

    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}

/// Runs the pipeline on a parsed request.
pub fn run_request(request: &DelineationRequest) -> Result<Partition> {
    let text = request
        .population
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| DelineationError::MissingInput("population raster".to_string()))?;
    let grid = ascii_grid::parse(text, request.population_crs)?;

    let boundaries = request
        .boundaries
        .iter()
        .map(|b| -> Result<BoundaryFeatures> {
            boundary_from_geojson(&b.name, GeoJson::from_json_value(b.geojson.clone())?, b.crs)
        })
        .collect::<Result<Vec<_>>>()?;

    let region = match &request.region {
        Some(value) => Some(read_region(GeoJson::from_json_value(value.clone())?)?),
        None => None,
    };

    let mut inputs = PartitionInputs::new(&grid).with_boundaries(&boundaries);
    if let Some(region) = &region {
        inputs = inputs.with_region(region, request.region_crs.unwrap_or(Crs::Wgs84));
    }
    Delineator::new(request.config.clone()).delineate(&inputs)
}

/// JSON request in, EA FeatureCollection out.
pub fn delineate_geojson(request_json: &str) -> Result<String> {
    let request = DelineationRequest::from_str(request_json)?;
    let partition = run_request(&request)?;
    let collection = eas_to_geojson(&partition.eas, request.config.working_crs, request.output_crs)?;
    Ok(collection.to_string())
}

#[cfg(test)]
#[path = "geojson_tests.rs"]
mod tests;
