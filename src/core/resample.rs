use crate::io::ProductContainer;
use crate::types::{GeoArray, NavigationGrid, SgliError, SgliResult};
use ndarray::{s, Array2};

/// Geometry arrays and attributes of a G-Portal swath product
pub const LATITUDE_PATH: &str = "Geometry_data/Latitude";
pub const LONGITUDE_PATH: &str = "Geometry_data/Longitude";
pub const IMAGE_GROUP: &str = "Image_data";

/// Upper bound on resampled grid cells when the image size is not declared
const MAX_RESAMPLED_CELLS: usize = 1 << 28;

/// Expands the coarse tie-point navigation grid of a swath product to full
/// pixel resolution.
pub struct GeoResampler {
    interval: usize,
}

impl GeoResampler {
    pub fn new(interval: usize) -> SgliResult<Self> {
        if interval == 0 {
            return Err(SgliError::InvalidInput(
                "resampling interval must be at least 1".to_string(),
            ));
        }
        Ok(Self { interval })
    }

    /// Resample latitude and longitude tie points to full resolution
    pub fn resample(&self, coarse_lat: &GeoArray, coarse_lon: &GeoArray) -> SgliResult<(GeoArray, GeoArray)> {
        if coarse_lat.dim() != coarse_lon.dim() {
            return Err(SgliError::InvalidInput(format!(
                "latitude {:?} and longitude {:?} tie-point grids differ in shape",
                coarse_lat.dim(),
                coarse_lon.dim()
            )));
        }
        if self.interval == 1 {
            return Ok((coarse_lat.clone(), coarse_lon.clone()));
        }

        log::debug!(
            "Resampling {:?} tie-point grid with interval {}",
            coarse_lat.dim(),
            self.interval
        );

        let lat = self.interpolate(coarse_lat)?;
        let lon = self.interpolate_longitude(coarse_lon)?;
        Ok((lat, lon))
    }

    /// Longitudes are unwrapped across the antimeridian before blending
    fn interpolate_longitude(&self, coarse_lon: &GeoArray) -> SgliResult<GeoArray> {
        let crosses_antimeridian = max_horizontal_step(coarse_lon) > 180.0;

        if !crosses_antimeridian {
            return self.interpolate(coarse_lon);
        }

        log::debug!("Longitude grid crosses the antimeridian, unwrapping");
        let unwrapped = coarse_lon.mapv(|v| if v < 0.0 { v + 360.0 } else { v });
        let mut full = self.interpolate(&unwrapped)?;
        full.mapv_inplace(|v| if v > 180.0 { v - 360.0 } else { v });
        Ok(full)
    }

    /// Bilinear expansion of every control cell into interval x interval pixels
    fn interpolate(&self, control: &GeoArray) -> SgliResult<GeoArray> {
        let (rows, cols) = control.dim();
        if rows == 0 || cols == 0 {
            return Err(SgliError::InvalidInput(
                "empty tie-point grid".to_string(),
            ));
        }

        let n = self.interval;
        let padded = pad_last_row_and_column(control);
        let weights: Vec<f32> = (0..n).map(|k| (k as f64 / n as f64) as f32).collect();

        let mut full = Array2::<f32>::zeros((rows * n, cols * n));
        for ((i, j), out) in full.indexed_iter_mut() {
            let (ci, fi) = (i / n, weights[i % n]);
            let (cj, fj) = (j / n, weights[j % n]);

            let top = (1.0 - fj) * padded[[ci, cj]] + fj * padded[[ci, cj + 1]];
            let bottom = (1.0 - fj) * padded[[ci + 1, cj]] + fj * padded[[ci + 1, cj + 1]];
            *out = (1.0 - fi) * top + fi * bottom;
        }

        Ok(full)
    }

    /// Build the full-resolution navigation grid of a swath product.
    ///
    /// Reads `Geometry_data/Latitude` and `Geometry_data/Longitude`, the
    /// `Resampling_interval` attribute of the latitude array, and crops to the
    /// `Number_of_lines` x `Number_of_pixels` declared on `Image_data`.
    pub fn from_container<C: ProductContainer + ?Sized>(container: &C) -> SgliResult<NavigationGrid> {
        let coarse_lat = container
            .read_array(LATITUDE_PATH)
            .map_err(|e| SgliError::CorruptProduct(format!("missing latitude grid: {}", e)))?
            .to_f32();
        let coarse_lon = container
            .read_array(LONGITUDE_PATH)
            .map_err(|e| SgliError::CorruptProduct(format!("missing longitude grid: {}", e)))?
            .to_f32();

        let interval = container
            .attribute_scalar(LATITUDE_PATH, "Resampling_interval")?
            .map(|v| v as usize)
            .unwrap_or(1);

        let n_pixels = container.attribute_scalar(IMAGE_GROUP, "Number_of_pixels")?;
        let n_lines = container.attribute_scalar(IMAGE_GROUP, "Number_of_lines")?;
        let declared = n_lines.zip(n_pixels).map(|(l, p)| (l as usize, p as usize));

        let interval = interval.max(1);
        check_resampled_size(coarse_lat.dim(), interval, declared)?;

        // Tie-point shape mismatch in a file is a malformed product
        let resampler = GeoResampler::new(interval)?;
        let (lat, lon) = resampler
            .resample(&coarse_lat, &coarse_lon)
            .map_err(|e| match e {
                SgliError::InvalidInput(msg) => SgliError::CorruptProduct(msg),
                other => other,
            })?;

        let (lat, lon) = match declared {
            Some((lines, pixels)) => crop_to_image(lat, lon, lines, pixels),
            None => (lat, lon),
        };

        log::debug!("Navigation grid ready: {:?}", lat.dim());
        NavigationGrid::swath(lat, lon)
    }
}

/// Reject a `Resampling_interval` that would expand the tie points far past
/// the declared image, or past `MAX_RESAMPLED_CELLS` when nothing is declared
fn check_resampled_size(
    tie_dim: (usize, usize),
    interval: usize,
    declared: Option<(usize, usize)>,
) -> SgliResult<()> {
    let (rows, cols) = tie_dim;
    let too_large = || {
        SgliError::CorruptProduct(format!(
            "resampling interval {} is inconsistent with a {}x{} tie-point grid",
            interval, rows, cols
        ))
    };

    match declared {
        Some((lines, pixels)) => {
            // One control row/column past the image is normal padding
            let span = |ties: usize| ties.saturating_sub(1).checked_mul(interval);
            let limit = |size: usize| size.saturating_add(interval);
            match (span(rows), span(cols)) {
                (Some(r), Some(c)) if r <= limit(lines) && c <= limit(pixels) => Ok(()),
                _ => Err(too_large()),
            }
        }
        None => {
            let cells = rows
                .checked_mul(interval)
                .zip(cols.checked_mul(interval))
                .and_then(|(r, c)| r.checked_mul(c));
            match cells {
                Some(cells) if cells <= MAX_RESAMPLED_CELLS => Ok(()),
                _ => Err(too_large()),
            }
        }
    }
}

/// Crop to the product's declared image size when it fits inside the grid,
/// otherwise return the grids untouched
pub fn crop_to_image(lat: GeoArray, lon: GeoArray, n_lines: usize, n_pixels: usize) -> (GeoArray, GeoArray) {
    let (rows, cols) = lat.dim();
    if n_lines <= rows && n_pixels <= cols {
        let lat = lat.slice(s![..n_lines, ..n_pixels]).to_owned();
        let lon = lon.slice(s![..n_lines, ..n_pixels]).to_owned();
        (lat, lon)
    } else {
        log::debug!(
            "Declared image {}x{} exceeds navigation grid {}x{}, not cropping",
            n_lines,
            n_pixels,
            rows,
            cols
        );
        (lat, lon)
    }
}

/// Largest absolute difference between horizontally adjacent samples, NaN skipped
fn max_horizontal_step(grid: &GeoArray) -> f32 {
    let (_, cols) = grid.dim();
    if cols < 2 {
        return 0.0;
    }
    let left = grid.slice(s![.., ..cols - 1]);
    let right = grid.slice(s![.., 1..]);
    left.iter()
        .zip(right.iter())
        .map(|(a, b)| (a - b).abs())
        .filter(|d| !d.is_nan())
        .fold(0.0f32, f32::max)
}

fn pad_last_row_and_column(control: &GeoArray) -> GeoArray {
    let (rows, cols) = control.dim();
    let mut padded = Array2::<f32>::zeros((rows + 1, cols + 1));
    padded.slice_mut(s![..rows, ..cols]).assign(control);
    padded.slice_mut(s![rows, ..cols]).assign(&control.row(rows - 1));
    padded.slice_mut(s![..rows, cols]).assign(&control.column(cols - 1));
    padded[[rows, cols]] = control[[rows - 1, cols - 1]];
    padded
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_padding_replicates_edges() {
        let control = array![[1.0f32, 2.0], [3.0, 4.0]];
        let padded = pad_last_row_and_column(&control);
        assert_eq!(
            padded,
            array![[1.0, 2.0, 2.0], [3.0, 4.0, 4.0], [3.0, 4.0, 4.0]]
        );
    }

    #[test]
    fn test_interval_one_is_identity() {
        let lat = array![[1.0f32, 2.0], [3.0, 4.0]];
        let lon = array![[10.0f32, 20.0], [30.0, 40.0]];
        let (full_lat, full_lon) = GeoResampler::new(1).unwrap().resample(&lat, &lon).unwrap();
        assert_eq!(full_lat, lat);
        assert_eq!(full_lon, lon);
    }

    #[test]
    fn test_linear_ramp_interpolation() {
        let lat = array![[0.0f32, 0.0], [4.0, 4.0]];
        let lon = array![[0.0f32, 4.0], [0.0, 4.0]];
        let (full_lat, full_lon) = GeoResampler::new(4).unwrap().resample(&lat, &lon).unwrap();

        assert_eq!(full_lat.dim(), (8, 8));
        // Inside the first control cell values ramp one unit per pixel
        for k in 0..4 {
            assert!((full_lat[[k, 0]] - k as f32).abs() < 1e-6);
            assert!((full_lon[[0, k]] - k as f32).abs() < 1e-6);
        }
        // Replicated padding keeps the last cell flat
        assert_eq!(full_lat[[7, 0]], 4.0);
        assert_eq!(full_lon[[0, 7]], 4.0);
    }

    #[test]
    fn test_zero_interval_rejected() {
        assert!(matches!(GeoResampler::new(0), Err(SgliError::InvalidInput(_))));
    }

    #[test]
    fn test_resampled_size_bounds() {
        assert!(check_resampled_size((4, 4), 2, Some((7, 6))).is_ok());
        assert!(check_resampled_size((501, 400), 10, Some((4999, 4000))).is_ok());
        assert!(check_resampled_size((4, 4), 2, None).is_ok());

        assert!(matches!(
            check_resampled_size((4, 4), 1_000_000, Some((7, 6))),
            Err(SgliError::CorruptProduct(_))
        ));
        assert!(matches!(
            check_resampled_size((4, 4), usize::MAX, None),
            Err(SgliError::CorruptProduct(_))
        ));
    }

    #[test]
    fn test_max_horizontal_step_ignores_nan() {
        let lon = array![[170.0f32, f32::NAN, -170.0], [170.0, 175.0, 179.0]];
        assert_eq!(max_horizontal_step(&lon), 5.0);

        let wrapped = array![[170.0f32, -175.0]];
        assert_eq!(max_horizontal_step(&wrapped), 345.0);
    }

    #[test]
    fn test_crop_only_when_fitting() {
        let lat = Array2::<f32>::zeros((4, 6));
        let lon = Array2::<f32>::zeros((4, 6));
        let (cropped, _) = crop_to_image(lat.clone(), lon.clone(), 3, 5);
        assert_eq!(cropped.dim(), (3, 5));

        let (untouched, _) = crop_to_image(lat, lon, 3, 7);
        assert_eq!(untouched.dim(), (4, 6));
    }
}
