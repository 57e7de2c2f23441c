use crate::error::{GeowatchError, Result};
use crate::job::{BoundingBox, GeoPoint};

/// Upper bound on cells per campaign.
pub const MAX_GRID_CELLS: usize = 10_000;

/// Tile a `dim x dim` square of `step`-degree cells centered on `center`,
/// with `dim = ceil(sqrt(count))`, keeping the first `count` cells.
///
/// Cells are ordered column by column: longitude outer, latitude inner.
/// Fails if `count` exceeds [`MAX_GRID_CELLS`] or any cell leaves the WGS84
/// range (a center too close to a pole or the antimeridian).
pub fn generate_grid(center: GeoPoint, count: usize, step: f64) -> Result<Vec<BoundingBox>> {
    if count > MAX_GRID_CELLS {
        return Err(GeowatchError::InvalidArgument(format!(
            "grid of {} cells exceeds the limit of {}",
            count, MAX_GRID_CELLS
        )));
    }
    if count == 0 {
        return Ok(Vec::new());
    }

    let dim = (count as f64).sqrt().ceil() as usize;
    let half = dim as f64 / 2.0 * step;
    let start_lon = center.lon - half;
    let start_lat = center.lat - half;

    let mut cells = Vec::with_capacity(count);
    'outer: for i in 0..dim {
        for j in 0..dim {
            if cells.len() >= count {
                break 'outer;
            }
            let min_lon = start_lon + i as f64 * step;
            let min_lat = start_lat + j as f64 * step;
            let cell = BoundingBox::new(min_lon, min_lat, min_lon + step, min_lat + step)
                .map_err(|e| {
                    GeowatchError::InvalidArgument(format!(
                        "grid around ({}, {}) is invalid: {}",
                        center.lat, center.lon, e
                    ))
                })?;
            cells.push(cell);
        }
    }
    Ok(cells)
}
