use crate::io::container::{DnArray, ProductContainer};
use crate::types::{SgliError, SgliResult};
use gdal::{Dataset, Metadata};
use ndarray::Array2;
use std::path::{Path, PathBuf};

/// File formats SGLI products are distributed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    /// G-Portal swath products
    Hdf5,
    /// JASMES gridded products
    NetCdf,
}

impl ContainerFormat {
    pub fn from_path(path: &Path) -> SgliResult<Self> {
        match path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()) {
            Some(ext) if ext == "h5" || ext == "he5" || ext == "hdf5" => Ok(ContainerFormat::Hdf5),
            Some(ext) if ext == "nc" || ext == "nc4" => Ok(ContainerFormat::NetCdf),
            _ => Err(SgliError::InvalidInput(format!(
                "unrecognised product format: {}",
                path.display()
            ))),
        }
    }
}

/// HDF5/NetCDF product read through GDAL subdatasets
pub struct GdalContainer {
    path: PathBuf,
    format: ContainerFormat,
    root: Dataset,
}

impl GdalContainer {
    pub fn open<P: AsRef<Path>>(path: P) -> SgliResult<Self> {
        let path = path.as_ref().to_path_buf();
        let format = ContainerFormat::from_path(&path)?;
        log::info!("Opening {:?} product: {}", format, path.display());

        let root = Dataset::open(&path).map_err(|e| {
            SgliError::CorruptProduct(format!("cannot open {}: {}", path.display(), e))
        })?;
        Ok(Self { path, format, root })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn subdataset_name(&self, array_path: &str) -> String {
        match self.format {
            ContainerFormat::Hdf5 => format!("HDF5:\"{}\"://{}", self.path.display(), array_path),
            ContainerFormat::NetCdf => format!("NETCDF:\"{}\":{}", self.path.display(), array_path),
        }
    }

    fn open_array(&self, array_path: &str) -> Option<Dataset> {
        Dataset::open(self.subdataset_name(array_path)).ok()
    }

    /// Metadata keys GDAL may publish an attribute under
    fn attribute_keys(path: &str, name: &str) -> Vec<String> {
        let flat = path.trim_matches('/').replace('/', "_");
        let mut keys = Vec::with_capacity(3);
        if !flat.is_empty() {
            keys.push(format!("{}_{}", flat, name));
            keys.push(format!("{}#{}", flat, name));
        }
        keys.push(name.to_string());
        keys
    }

    fn lookup<M: Metadata>(meta: &M, keys: &[String]) -> Option<String> {
        keys.iter().find_map(|key| meta.metadata_item(key, ""))
    }
}

/// Parse a GDAL metadata value such as `0.02`, `{1, 2}` or `65535 65534`
fn parse_numeric_list(value: &str) -> Option<Vec<f64>> {
    let values: Vec<f64> = value
        .split(|c: char| c == ',' || c == '{' || c == '}' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| s.trim_end_matches('f').parse::<f64>())
        .collect::<Result<_, _>>()
        .ok()?;
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

impl ProductContainer for GdalContainer {
    fn read_array(&self, path: &str) -> SgliResult<DnArray> {
        let dataset = self
            .open_array(path)
            .ok_or_else(|| SgliError::band_not_found(path))?;
        let band = dataset.rasterband(1)?;
        let (cols, rows) = band.size();
        let buffer = band.read_as::<f64>((0, 0), (cols, rows), (cols, rows), None)?;

        log::debug!("Read {} as {} x {}", path, rows, cols);
        let array = Array2::from_shape_vec((rows, cols), buffer.data)
            .map_err(|e| SgliError::CorruptProduct(format!("{}: {}", path, e)))?;
        Ok(DnArray::F64(array))
    }

    fn read_attribute(&self, path: &str, name: &str) -> SgliResult<Option<Vec<f64>>> {
        let keys = Self::attribute_keys(path, name);

        let from_array = self
            .open_array(path)
            .and_then(|ds| Self::lookup(&ds, &keys));
        let raw = from_array.or_else(|| Self::lookup(&self.root, &keys));

        Ok(raw.as_deref().and_then(parse_numeric_list))
    }

    fn has_array(&self, path: &str) -> bool {
        self.open_array(path).is_some()
    }

    fn read_pixel(&self, path: &str, row: usize, col: usize) -> SgliResult<Option<f64>> {
        let dataset = self
            .open_array(path)
            .ok_or_else(|| SgliError::band_not_found(path))?;
        let band = dataset.rasterband(1)?;
        let offset = match pixel_window(row, col, band.size()) {
            Some(offset) => offset,
            None => return Ok(None),
        };
        let buffer = band.read_as::<f64>(offset, (1, 1), (1, 1), None)?;
        Ok(buffer.data.first().copied())
    }
}

/// GDAL window offset `(x, y)` of a single pixel, `None` outside a raster of
/// `(cols, rows)`
fn pixel_window(row: usize, col: usize, size: (usize, usize)) -> Option<(isize, isize)> {
    let (cols, rows) = size;
    if row >= rows || col >= cols {
        return None;
    }
    Some((isize::try_from(col).ok()?, isize::try_from(row).ok()?))
}
