//! Coordinate reference systems and the transforms between them.
//!
//! Only a small closed set of transforms is supported: geographic WGS84,
//! spherical Web Mercator and a spherical Lambert cylindrical equal-area
//! projection. Any other projected CRS is accepted only when it already is
//! the working CRS.

use crate::error::{DelineationError, Result};
use geo::MapCoords;
use geo_types::Coord;
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_4;
use std::fmt;

const WEB_MERCATOR_RADIUS: f64 = 6_378_137.0;
// Radius of the sphere with the same surface area as the WGS84 ellipsoid.
const AUTHALIC_RADIUS: f64 = 6_371_007.181;
const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Crs {
    /// EPSG:4326, degrees.
    Wgs84,
    /// EPSG:3857, metres.
    WebMercator,
    /// Lambert cylindrical equal-area on the authalic sphere, metres.
    EqualArea,
    /// Any other projected CRS, assumed metric.
    Epsg(u32),
}

impl Crs {
    pub fn from_epsg(code: u32) -> Self {
        match code {
            4326 => Crs::Wgs84,
            3857 | 900913 => Crs::WebMercator,
            other => Crs::Epsg(other),
        }
    }

    pub fn epsg(&self) -> Option<u32> {
        match self {
            Crs::Wgs84 => Some(4326),
            Crs::WebMercator => Some(3857),
            Crs::EqualArea => None,
            Crs::Epsg(code) => Some(*code),
        }
    }

    pub fn is_metric(&self) -> bool {
        !matches!(self, Crs::Wgs84)
    }

    fn is_known(&self) -> bool {
        !matches!(self, Crs::Epsg(_))
    }
}

impl Default for Crs {
    fn default() -> Self {
        Crs::WebMercator
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Crs::EqualArea => write!(f, "lambert-cylindrical-equal-area"),
            other => match other.epsg() {
                Some(code) => write!(f, "EPSG:{}", code),
                None => write!(f, "unknown"),
            },
        }
    }
}

/// A resolved transform between two CRSs. Cheap to copy so it can be captured
/// by the `Copy` closures `MapCoords` requires.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordTransform {
    from: Crs,
    to: Crs,
}

impl CoordTransform {
    /// `layer` names the input in the error when no transform exists.
    pub fn new(from: Crs, to: Crs, layer: &str) -> Result<Self> {
        if from != to && !(from.is_known() && to.is_known()) {
            return Err(DelineationError::CrsMismatch {
                layer: layer.to_string(),
                from,
                to,
            });
        }
        Ok(Self { from, to })
    }

    pub fn is_identity(&self) -> bool {
        self.from == self.to
    }

    pub fn apply(&self, c: Coord<f64>) -> Coord<f64> {
        if self.is_identity() {
            return c;
        }
        let (lon, lat) = to_geographic(self.from, c);
        from_geographic(self.to, lon, lat)
    }

    pub fn reproject<G>(&self, geom: &G) -> G
    where
        G: MapCoords<f64, f64, Output = G> + Clone,
    {
        if self.is_identity() {
            return geom.clone();
        }
        let transform = *self;
        geom.map_coords(move |c| transform.apply(c))
    }
}

fn to_geographic(crs: Crs, c: Coord<f64>) -> (f64, f64) {
    match crs {
        Crs::WebMercator => {
            let lon = (c.x / WEB_MERCATOR_RADIUS).to_degrees();
            let lat = (2.0 * (c.y / WEB_MERCATOR_RADIUS).exp().atan() - 2.0 * FRAC_PI_4).to_degrees();
            (lon, lat)
        }
        Crs::EqualArea => {
            let lon = (c.x / AUTHALIC_RADIUS).to_degrees();
            let lat = (c.y / AUTHALIC_RADIUS).clamp(-1.0, 1.0).asin().to_degrees();
            (lon, lat)
        }
        // Wgs84, and unknown codes which only reach here as identity.
        _ => (c.x, c.y),
    }
}

fn from_geographic(crs: Crs, lon: f64, lat: f64) -> Coord<f64> {
    match crs {
        Crs::WebMercator => {
            let lat = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
            Coord {
                x: WEB_MERCATOR_RADIUS * lon.to_radians(),
                y: WEB_MERCATOR_RADIUS * (FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln(),
            }
        }
        Crs::EqualArea => Coord {
            x: AUTHALIC_RADIUS * lon.to_radians(),
            y: AUTHALIC_RADIUS * lat.to_radians().sin(),
        },
        _ => Coord { x: lon, y: lat },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use geo::Area;
    use geo_types::{polygon, Polygon};

    #[test]
    fn test_web_mercator_known_point() {
        let t = CoordTransform::new(Crs::Wgs84, Crs::WebMercator, "test").unwrap();
        let c = t.apply(Coord { x: 180.0, y: 0.0 });
        assert_abs_diff_eq!(c.x, 20_037_508.342789244, epsilon = 1e-6);
        assert_abs_diff_eq!(c.y, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_mercator_to_equal_area_roundtrips_through_geographic() {
        let there = CoordTransform::new(Crs::WebMercator, Crs::EqualArea, "test").unwrap();
        let back = CoordTransform::new(Crs::EqualArea, Crs::WebMercator, "test").unwrap();
        let c = Coord { x: 1_113_194.9, y: 4_865_942.3 };
        let r = back.apply(there.apply(c));
        assert_abs_diff_eq!(r.x, c.x, epsilon = 1e-6);
        assert_abs_diff_eq!(r.y, c.y, epsilon = 1e-6);
    }

    #[test]
    fn test_equal_area_one_degree_cell_at_equator() {
        let t = CoordTransform::new(Crs::Wgs84, Crs::EqualArea, "test").unwrap();
        let cell: Polygon<f64> = polygon![
            (x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0), (x: 0.0, y: 0.0)
        ];
        let km2 = t.reproject(&cell).unsigned_area() / 1e6;
        // A 1x1 degree cell at the equator is about 12 364 km2.
        assert!((km2 - 12_364.0).abs() < 20.0, "got {}", km2);
    }

    #[test]
    fn test_web_mercator_inflates_area_away_from_equator() {
        let cell: Polygon<f64> = polygon![
            (x: 10.0, y: 60.0), (x: 10.01, y: 60.0), (x: 10.01, y: 60.01), (x: 10.0, y: 60.01), (x: 10.0, y: 60.0)
        ];
        let area_in = |crs| CoordTransform::new(Crs::Wgs84, crs, "test").unwrap().reproject(&cell).unsigned_area();
        // 1 / cos^2(60) = 4, times the ratio of the two sphere radii squared.
        let ratio = area_in(Crs::WebMercator) / area_in(Crs::EqualArea);
        assert!((ratio - 4.009).abs() < 0.01, "got {}", ratio);
    }

    #[test]
    fn test_unknown_projected_crs_only_maps_to_itself() {
        assert!(CoordTransform::new(Crs::Epsg(32633), Crs::Epsg(32633), "l").is_ok());
        let err = CoordTransform::new(Crs::Epsg(32633), Crs::WebMercator, "roads").unwrap_err();
        assert!(matches!(err, DelineationError::CrsMismatch { ref layer, .. } if layer == "roads"));
    }

    #[test]
    fn test_from_epsg() {
        assert_eq!(Crs::from_epsg(4326), Crs::Wgs84);
        assert_eq!(Crs::from_epsg(3857), Crs::WebMercator);
        assert_eq!(Crs::from_epsg(32633), Crs::Epsg(32633));
        assert_eq!(Crs::WebMercator.to_string(), "EPSG:3857");
    }
}
