use crate::error::{DelineationError, Result};
use crate::projection::Crs;
use crate::raster::{GeoTransform, PopulationGrid};
use std::path::Path;

#[derive(Default)]
struct Header {
    ncols: Option<usize>,
    nrows: Option<usize>,
    xll: Option<(f64, bool)>,
    yll: Option<(f64, bool)>,
    cellsize: Option<f64>,
    nodata: Option<f64>,
}

fn malformed(msg: impl Into<String>) -> DelineationError {
    DelineationError::MalformedInput(format!("ASCII grid: {}", msg.into()))
}

fn number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| malformed(format!("bad value {:?} for {}", raw, key)))
}

/// Parses an ESRI ASCII grid. The format carries no CRS, so the caller
/// supplies it.
pub fn parse(text: &str, crs: Option<Crs>) -> Result<PopulationGrid> {
    let mut header = Header::default();
    let mut lines = text.lines().peekable();

    while let Some(&line) = lines.peek() {
        let mut tokens = line.split_whitespace();
        let Some(key) = tokens.next() else {
            lines.next();
            continue;
        };
        if !key.starts_with(|c: char| c.is_ascii_alphabetic()) {
            break;
        }
        let value = tokens.next().ok_or_else(|| malformed(format!("no value for {}", key)))?;
        match key.to_ascii_lowercase().as_str() {
            "ncols" => header.ncols = Some(number(key, value)?),
            "nrows" => header.nrows = Some(number(key, value)?),
            "xllcorner" => header.xll = Some((number(key, value)?, false)),
            "xllcenter" => header.xll = Some((number(key, value)?, true)),
            "yllcorner" => header.yll = Some((number(key, value)?, false)),
            "yllcenter" => header.yll = Some((number(key, value)?, true)),
            "cellsize" => header.cellsize = Some(number(key, value)?),
            "nodata_value" => header.nodata = Some(number(key, value)?),
            other => log::debug!("ASCII grid: ignoring header key {}", other),
        }
        lines.next();
    }

    let ncols = header.ncols.ok_or_else(|| malformed("missing ncols"))?;
    let nrows = header.nrows.ok_or_else(|| malformed("missing nrows"))?;
    let cellsize = header.cellsize.ok_or_else(|| malformed("missing cellsize"))?;
    let (xll, x_centre) = header.xll.ok_or_else(|| malformed("missing xllcorner"))?;
    let (yll, y_centre) = header.yll.ok_or_else(|| malformed("missing yllcorner"))?;

    let values = lines
        .flat_map(str::split_whitespace)
        .map(|raw| number::<f64>("cell", raw))
        .collect::<Result<Vec<f64>>>()?;

    let half = cellsize / 2.0;
    let left = if x_centre { xll - half } else { xll };
    let bottom = if y_centre { yll - half } else { yll };
    let transform = GeoTransform::north_up(left, bottom + nrows as f64 * cellsize, cellsize);

    let grid = PopulationGrid::new(ncols, nrows, values, transform, crs)?.with_nodata(header.nodata);
    log::debug!("read {}x{} ASCII grid", ncols, nrows);
    Ok(grid)
}

pub fn read(path: impl AsRef<Path>, crs: Option<Crs>) -> Result<PopulationGrid> {
    let text = std::fs::read_to_string(path)?;
    parse(&text, crs)
}
