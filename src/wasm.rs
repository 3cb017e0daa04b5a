use crate::io::geojson::{delineate_geojson, run_request, DelineationRequest};
use std::str::FromStr;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
}

/// Takes a JSON delineation request and returns the EAs as a GeoJSON
/// FeatureCollection string.
#[wasm_bindgen]
pub fn delineate(request_json: &str) -> Result<String, JsValue> {
    delineate_geojson(request_json).map_err(|e| JsValue::from_str(&format!("Delineation failed: {}", e)))
}

/// Same request, but only the run summary comes back, as a plain JS object.
#[wasm_bindgen]
pub fn summarize(request_json: &str) -> Result<JsValue, JsValue> {
    let request = DelineationRequest::from_str(request_json)
        .map_err(|e| JsValue::from_str(&format!("Failed to parse request: {}", e)))?;
    let partition = run_request(&request).map_err(|e| JsValue::from_str(&format!("Delineation failed: {}", e)))?;
    serde_wasm_bindgen::to_value(&partition.summary).map_err(JsValue::from)
}
