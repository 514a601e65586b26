use crate::types::{GeoArray, NavigationGrid, PixelCoordinate, PixelMatch, SgliError, SgliResult};
use ndarray::Array1;

/// Find the grid cell closest to (lat, lon) by squared degree distance.
///
/// Distances are computed in single precision, the precision of the grids.
/// The scan is row-major and only a strictly smaller distance replaces the
/// current best, so ties resolve to the first cell. NaN coordinates are skipped.
pub fn locate(lat_grid: &GeoArray, lon_grid: &GeoArray, lat: f64, lon: f64) -> SgliResult<PixelMatch> {
    if lat_grid.dim() != lon_grid.dim() {
        return Err(SgliError::InvalidInput(format!(
            "latitude grid {:?} and longitude grid {:?} differ in shape",
            lat_grid.dim(),
            lon_grid.dim()
        )));
    }

    let (lat, lon) = (lat as f32, lon as f32);

    // indexed_iter walks logical row-major order regardless of memory layout
    let mut best: Option<(PixelCoordinate, f32)> = None;
    for ((row, col), &cell_lat) in lat_grid.indexed_iter() {
        let d_lat = cell_lat - lat;
        let d_lon = lon_grid[[row, col]] - lon;
        let distance = d_lat * d_lat + d_lon * d_lon;
        if distance.is_nan() {
            continue;
        }
        if best.map_or(true, |(_, b)| distance < b) {
            best = Some((PixelCoordinate::new(row, col), distance));
        }
    }

    best.map(|(pixel, distance)| PixelMatch {
        pixel,
        sq_distance: distance as f64,
    })
    .ok_or(SgliError::GeolocationUnavailable)
}

/// Nearest sample on one axis, first index on ties
fn nearest_on_axis(axis: &Array1<f32>, target: f64) -> Option<(usize, f32)> {
    let target = target as f32;
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in axis.iter().enumerate() {
        let d = v - target;
        let d2 = d * d;
        if d2.is_nan() {
            continue;
        }
        if best.map_or(true, |(_, b)| d2 < b) {
            best = Some((i, d2));
        }
    }
    best
}

/// Nearest cell of a regular grid; the distance is separable so each axis is
/// searched on its own
pub fn locate_regular(lat_axis: &Array1<f32>, lon_axis: &Array1<f32>, lat: f64, lon: f64) -> SgliResult<PixelMatch> {
    let (row, d_lat) = nearest_on_axis(lat_axis, lat).ok_or(SgliError::GeolocationUnavailable)?;
    let (col, d_lon) = nearest_on_axis(lon_axis, lon).ok_or(SgliError::GeolocationUnavailable)?;
    Ok(PixelMatch {
        pixel: PixelCoordinate::new(row, col),
        sq_distance: (d_lat + d_lon) as f64,
    })
}

impl NavigationGrid {
    /// Nearest pixel to (lat, lon) on this grid
    pub fn locate(&self, lat: f64, lon: f64) -> SgliResult<PixelMatch> {
        let found = match self {
            NavigationGrid::Swath { lat: lat_grid, lon: lon_grid } => locate(lat_grid, lon_grid, lat, lon),
            NavigationGrid::Regular { lat: lat_axis, lon: lon_axis } => {
                locate_regular(lat_axis, lon_axis, lat, lon)
            }
        }?;
        log::debug!(
            "Matched ({}, {}) to pixel {} with squared distance {:.3e}",
            lat,
            lon,
            found.pixel,
            found.sq_distance
        );
        Ok(found)
    }
}
