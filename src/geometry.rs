use crate::error::GeometryError;
use geo::algorithm::orient::Direction;
use geo::{Area, BooleanOps, CoordsIter, MapCoords, Orient, RemoveRepeatedPoints};
use geo_types::{Coord, LineString, MultiPolygon, Polygon};
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};

pub const M2_PER_KM2: f64 = 1e6;

pub fn area_km2(geom: &MultiPolygon<f64>) -> f64 {
    geom.unsigned_area() / M2_PER_KM2
}

thread_local! {
    static IN_OVERLAY: Cell<bool> = const { Cell::new(false) };
}

/// Chains a hook in front of the current panic hook that stays quiet for
/// panics raised inside [`guarded`] on the same thread.
#[cfg(not(target_arch = "wasm32"))]
fn silence_overlay_panics() {
    static HOOK: std::sync::Once = std::sync::Once::new();
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if !IN_OVERLAY.with(Cell::get) {
                previous(info);
            }
        }));
    });
}

/// geo's sweep-line overlay panics on some invalid inputs; turn that into a
/// per-call error instead of tearing down the whole run.
///
/// Native builds only: wasm32 aborts on panic, so there the panic is reported
/// by the installed hook and nothing is recovered.
fn guarded<F>(op: &'static str, f: F) -> Result<MultiPolygon<f64>, GeometryError>
where
    F: FnOnce() -> MultiPolygon<f64>,
{
    #[cfg(not(target_arch = "wasm32"))]
    silence_overlay_panics();
    let out = IN_OVERLAY
        .with(|flag| {
            flag.set(true);
            let out = panic::catch_unwind(AssertUnwindSafe(f));
            flag.set(false);
            out
        })
        .map_err(|_| GeometryError::Panicked(op))?;
    if out.coords_iter().all(|c| c.x.is_finite() && c.y.is_finite()) {
        Ok(out)
    } else {
        Err(GeometryError::NonFinite(op))
    }
}

pub fn try_union(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>, GeometryError> {
    guarded("union", || a.union(b))
}

pub fn try_intersection(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>, GeometryError> {
    guarded("intersection", || a.intersection(b))
}

/// Best-effort cleanup: drops repeated vertices and degenerate rings,
/// re-orients, then resolves self-overlaps with a self-union. Fails with
/// `Empty` when nothing with area survives.
pub fn repair(geom: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>, GeometryError> {
    let cleaned: Vec<Polygon<f64>> = geom
        .remove_repeated_points()
        .into_iter()
        .filter_map(|poly| {
            let (exterior, interiors) = poly.into_inner();
            if !is_ring(&exterior) {
                return None;
            }
            let interiors = interiors.into_iter().filter(is_ring).collect();
            Some(Polygon::new(exterior, interiors))
        })
        .collect();
    if cleaned.is_empty() {
        return Err(GeometryError::Empty("repair"));
    }
    let cleaned = MultiPolygon::new(cleaned).orient(Direction::Default);
    let repaired = guarded("repair", || cleaned.union(&MultiPolygon::new(vec![])))?;
    if repaired.unsigned_area() > 0.0 {
        Ok(repaired)
    } else {
        Err(GeometryError::Empty("repair"))
    }
}

fn is_ring(ls: &LineString<f64>) -> bool {
    ls.0.len() >= 4
        && ls.0.iter().all(|c| c.x.is_finite() && c.y.is_finite())
        && Polygon::new(ls.clone(), vec![]).unsigned_area() > 0.0
}

pub fn snap_coord(c: Coord<f64>, grid: f64) -> Coord<f64> {
    if grid <= 0.0 {
        return c;
    }
    // `+ 0.0` folds -0.0 into 0.0 so equal grid points share a bit pattern.
    Coord {
        x: (c.x / grid).round() * grid + 0.0,
        y: (c.y / grid).round() * grid + 0.0,
    }
}

pub fn snap_to_grid(geom: &MultiPolygon<f64>, grid: f64) -> MultiPolygon<f64> {
    if grid <= 0.0 {
        return geom.clone();
    }
    geom.map_coords(|c| snap_coord(c, grid))
}
