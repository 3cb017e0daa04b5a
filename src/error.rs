use crate::projection::Crs;
use thiserror::Error;

/// Fatal errors. Anything raised here aborts the pipeline before any EA is emitted.
#[derive(Error, Debug)]
pub enum DelineationError {
    #[error("Missing input: {0}")]
    MissingInput(String),

    #[error("Missing coordinate reference system for {0}")]
    MissingCrs(String),

    #[error("CRS mismatch for {layer}: no transform from {from} to {to}")]
    CrsMismatch { layer: String, from: Crs, to: Crs },

    #[error("Invalid raster: {0}")]
    InvalidRaster(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DelineationError>;

/// A single overlay operation that could not be completed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("{0} panicked on invalid topology")]
    Panicked(&'static str),

    #[error("{0} produced non-finite coordinates")]
    NonFinite(&'static str),

    #[error("{0} left no area")]
    Empty(&'static str),
}
