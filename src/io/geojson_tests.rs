use super::*;
use crate::model::EaSource;
use approx::assert_abs_diff_eq;
use geo_types::polygon;
use serde_json::json;

const GRID: &str = "ncols 2\nnrows 2\nxllcorner 0\nyllcorner 0\ncellsize 500\n10 20\n30 40\n";

#[test]
fn test_read_boundary_skips_empty_features_and_defaults_to_wgs84() {
    let text = json!({
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "geometry": { "type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 1.0]] },
                "properties": { "highway": "primary" }
            },
            { "type": "Feature", "geometry": null, "properties": {} }
        ]
    })
    .to_string();

    let layer = read_boundary("roads", &text, None).unwrap();
    assert_eq!(layer.name, "roads");
    assert_eq!(layer.crs, Some(Crs::Wgs84));
    assert_eq!(layer.geometries.len(), 1);
}

#[test]
fn test_region_needs_a_polygon() {
    let lines: GeoJson = json!({ "type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 1.0]] })
        .to_string()
        .parse()
        .unwrap();
    assert!(matches!(read_region(lines), Err(DelineationError::MalformedInput(_))));
}

#[test]
fn test_ea_properties_are_written() {
    let ea = EnumerationArea {
        geometry: MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0), (x: 111_319.490_793_273_6, y: 0.0), (x: 0.0, y: 1000.0), (x: 0.0, y: 0.0)
        ]]),
        population: 412.5,
        area_km2: 55.66,
        oversize: true,
        source: EaSource::Refined { parent: 2, depth: 3 },
    };
    let fc = eas_to_geojson(&[ea], Crs::WebMercator, Crs::Wgs84).unwrap();
    assert_eq!(fc.features.len(), 1);

    let props = fc.features[0].properties.as_ref().unwrap();
    assert_eq!(props["id"], json!(0));
    assert_eq!(props["population"], json!(412.5));
    assert_eq!(props["oversize"], json!(true));
    assert_eq!(props["source"], json!({ "kind": "refined", "parent": 2, "depth": 3 }));

    let geom: GeoGeometry<f64> = fc.features[0].geometry.clone().unwrap().try_into().unwrap();
    let GeoGeometry::MultiPolygon(mp) = geom else {
        panic!("expected a multipolygon");
    };
    assert_abs_diff_eq!(mp.0[0].exterior().0[1].x, 1.0, epsilon = 1e-9);
}

#[test]
fn test_delineate_geojson_end_to_end() {
    let request = json!({
        "population": GRID,
        "population_crs": "web_mercator",
        "output_crs": "web_mercator",
        "config": { "constraints": { "max_population": 750.0 } }
    })
    .to_string();

    let out = delineate_geojson(&request).unwrap();
    let GeoJson::FeatureCollection(fc) = out.parse::<GeoJson>().unwrap() else {
        panic!("expected a feature collection");
    };
    // One merged EA of 100 people is sparse and comes back as a single fragment.
    assert_eq!(fc.features.len(), 1);
    let props = fc.features[0].properties.as_ref().unwrap();
    assert_eq!(props["population"], json!(100.0));
    assert_abs_diff_eq!(props["area_km2"].as_f64().unwrap(), 1.0, epsilon = 1e-6);
    assert_eq!(props["source"]["kind"], json!("refined"));
}

#[test]
fn test_request_errors_surface_as_input_errors() {
    let no_raster = json!({ "population_crs": "web_mercator" }).to_string();
    assert!(matches!(delineate_geojson(&no_raster), Err(DelineationError::MissingInput(_))));

    let no_crs = json!({ "population": GRID }).to_string();
    assert!(matches!(delineate_geojson(&no_crs), Err(DelineationError::MissingCrs(_))));

    assert!(matches!(delineate_geojson("{"), Err(DelineationError::Json(_))));
}
