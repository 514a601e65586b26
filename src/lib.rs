//! sgli-extract: pixel extraction for GCOM-C/SGLI ocean-color products
//!
//! Matches a geographic point to the nearest pixel of an SGLI product,
//! converts stored digital numbers to physical values, decodes quality flags,
//! and picks the best-covering granule from a G-Portal catalog search.

pub mod types;
pub mod io;
pub mod core;
pub mod config;

// Re-export main types and functions for easier access
pub use types::{
    GeoArray, JasmesProduct, NavigationGrid, PixelCoordinate, PixelMatch, PixelRecord, PixelValue,
    ProductFamily, Resolution, SgliError, SgliResult,
};

pub use io::{DnArray, MemoryContainer, ProductContainer};
#[cfg(feature = "gdal")]
pub use io::GdalContainer;
pub use core::{CompositeExtractor, GeoResampler, ProductExtractor};
pub use config::{extract_batch, extract_request, extract_with, BatchOutcome, BatchReport, ExtractionRequest};

#[cfg(feature = "python")]
mod python {
    use crate::core::footprint::{select_index, Candidate, Footprint};
    use crate::core::quality_flags::{decode_flags, L2P_FLAGS, L2R_FLAGS};
    use crate::core::{locate, GeoResampler};
    use crate::types::SgliError;
    use numpy::{IntoPyArray, PyArray2, PyReadonlyArray2};
    use pyo3::exceptions::{PyKeyError, PyRuntimeError, PyValueError};
    use pyo3::prelude::*;
    use pyo3::types::PyDict;

    impl From<SgliError> for PyErr {
        fn from(e: SgliError) -> Self {
            match e {
                SgliError::InvalidInput(_) => PyErr::new::<PyValueError, _>(format!("{}", e)),
                SgliError::BandNotFound { .. } => PyErr::new::<PyKeyError, _>(format!("{}", e)),
                _ => PyErr::new::<PyRuntimeError, _>(format!("{}", e)),
            }
        }
    }

    /// Python module definition
    #[pymodule]
    fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(resample_geolocation, m)?)?;
        m.add_function(wrap_pyfunction!(locate_pixel, m)?)?;
        m.add_function(wrap_pyfunction!(decode_quality_flags, m)?)?;
        m.add_function(wrap_pyfunction!(select_footprint, m)?)?;
        #[cfg(feature = "gdal")]
        m.add_function(wrap_pyfunction!(extract_pixel, m)?)?;
        Ok(())
    }

    /// Expand tie-point latitude/longitude grids to full resolution
    #[pyfunction]
    fn resample_geolocation<'py>(
        py: Python<'py>,
        lat: PyReadonlyArray2<f32>,
        lon: PyReadonlyArray2<f32>,
        interval: usize,
    ) -> PyResult<(&'py PyArray2<f32>, &'py PyArray2<f32>)> {
        let resampler = GeoResampler::new(interval)?;
        let (full_lat, full_lon) = resampler.resample(&lat.as_array().to_owned(), &lon.as_array().to_owned())?;
        Ok((full_lat.into_pyarray(py), full_lon.into_pyarray(py)))
    }

    /// Nearest (row, col, squared distance) to a point
    #[pyfunction]
    fn locate_pixel(
        lat_grid: PyReadonlyArray2<f32>,
        lon_grid: PyReadonlyArray2<f32>,
        lat: f64,
        lon: f64,
    ) -> PyResult<(usize, usize, f64)> {
        let found = locate(&lat_grid.as_array().to_owned(), &lon_grid.as_array().to_owned(), lat, lon)?;
        Ok((found.pixel.row, found.pixel.col, found.sq_distance))
    }

    #[pyfunction]
    fn decode_quality_flags<'py>(py: Python<'py>, value: i64, level: &str) -> PyResult<&'py PyDict> {
        let table = match level.to_uppercase().as_str() {
            "L2R" => L2R_FLAGS,
            "L2P" => L2P_FLAGS,
            _ => {
                return Err(PyErr::new::<PyValueError, _>(format!(
                    "Invalid flag table: {}",
                    level
                )))
            }
        };

        let flags = PyDict::new(py);
        for (name, bit) in decode_flags(value, &table).iter() {
            flags.set_item(format!("{}{}", name, table.suffix), bit)?;
        }
        Ok(flags)
    }

    /// Index of the footprint (list of (lon, lat) rings) best covering a point
    #[pyfunction]
    fn select_footprint(footprints: Vec<Vec<(f64, f64)>>, lon: f64, lat: f64) -> Option<usize> {
        let candidates: Vec<Candidate<()>> = footprints
            .into_iter()
            .map(|ring| Candidate::new(Footprint::new(ring), ()))
            .collect();
        select_index(&candidates, lon, lat)
    }

    /// Extract every field of a G-Portal product at a point
    #[cfg(feature = "gdal")]
    #[pyfunction]
    fn extract_pixel<'py>(py: Python<'py>, level: &str, path: &str, lat: f64, lon: f64) -> PyResult<&'py PyDict> {
        use crate::core::ProductExtractor;
        use crate::io::GdalContainer;
        use crate::types::{PixelValue, ProductFamily};

        let family = ProductFamily::from_level(level)
            .ok_or_else(|| PyErr::new::<PyValueError, _>(format!("Invalid product level: {}", level)))?;
        let container = GdalContainer::open(path)?;
        let record = ProductExtractor::new(container, family).get_pixel(lat, lon)?;

        let out = PyDict::new(py);
        for (name, value) in record {
            match value {
                PixelValue::Physical(v) => out.set_item(name, v)?,
                PixelValue::Flag(b) => out.set_item(name, b)?,
            }
        }
        Ok(out)
    }
}
