//! Text front ends around the pipeline. None of this is needed to call
//! [`crate::Delineator`] directly.

pub mod ascii_grid;
pub mod geojson;
