use indexmap::IndexMap;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Single-precision geolocation array (lines x pixels)
pub type GeoArray = Array2<f32>;

/// Calibrated physical array; NaN marks invalid cells
pub type PhysicalArray = Array2<f32>;

/// Per-pixel latitude/longitude of an opened product
#[derive(Debug, Clone)]
pub enum NavigationGrid {
    /// Full-resolution swath geometry (one coordinate per pixel)
    Swath { lat: GeoArray, lon: GeoArray },
    /// Regular lat/lon grid described by its two axes
    Regular { lat: Array1<f32>, lon: Array1<f32> },
}

impl NavigationGrid {
    /// Build a swath grid, checking both arrays share a shape
    pub fn swath(lat: GeoArray, lon: GeoArray) -> SgliResult<Self> {
        if lat.dim() != lon.dim() {
            return Err(SgliError::InvalidInput(format!(
                "latitude grid {:?} and longitude grid {:?} differ in shape",
                lat.dim(),
                lon.dim()
            )));
        }
        Ok(NavigationGrid::Swath { lat, lon })
    }

    /// (rows, cols) addressed by this grid
    pub fn dim(&self) -> (usize, usize) {
        match self {
            NavigationGrid::Swath { lat, .. } => lat.dim(),
            NavigationGrid::Regular { lat, lon } => (lat.len(), lon.len()),
        }
    }

    /// Coordinate at a pixel as (lat, lon)
    pub fn coordinate_at(&self, pixel: PixelCoordinate) -> Option<(f32, f32)> {
        match self {
            NavigationGrid::Swath { lat, lon } => {
                let idx = [pixel.row, pixel.col];
                Some((*lat.get(idx)?, *lon.get(idx)?))
            }
            NavigationGrid::Regular { lat, lon } => {
                Some((*lat.get(pixel.row)?, *lon.get(pixel.col)?))
            }
        }
    }
}

/// (row, col) index into a navigation grid or a data array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelCoordinate {
    pub row: usize,
    pub col: usize,
}

impl PixelCoordinate {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for PixelCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.row, self.col)
    }
}

/// Result of a nearest-pixel search
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelMatch {
    pub pixel: PixelCoordinate,
    /// Squared distance in degree space
    pub sq_distance: f64,
}

/// One field of an extracted pixel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PixelValue {
    /// Calibrated quantity, NaN when the DN was declared invalid
    Physical(f32),
    /// Decoded quality flag bit
    Flag(u8),
}

impl PixelValue {
    pub fn is_nan(&self) -> bool {
        matches!(self, PixelValue::Physical(v) if v.is_nan())
    }
}

impl fmt::Display for PixelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PixelValue::Physical(v) => write!(f, "{}", v),
            PixelValue::Flag(b) => write!(f, "{}", b),
        }
    }
}

/// Flat field-name to value mapping for one (product, lat, lon) query.
///
/// Insertion order is kept so that column order stays stable for CSV output.
/// Serializes as a plain JSON object, e.g. `{"Rrs_443":0.5,"LAND":1}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PixelRecord {
    fields: IndexMap<String, PixelValue>,
}

impl PixelRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field, replacing an existing value under the same name
    pub fn insert(&mut self, name: impl Into<String>, value: PixelValue) {
        self.fields.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<PixelValue> {
        self.fields.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Merge another record in, later values win
    pub fn merge(&mut self, other: PixelRecord) {
        self.fields.extend(other.fields);
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, PixelValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl IntoIterator for PixelRecord {
    type Item = (String, PixelValue);
    type IntoIter = indexmap::map::IntoIter<String, PixelValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

/// JASMES gridded ocean products, one file per product code
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum JasmesProduct {
    #[serde(rename = "NWLR_380")]
    Nwlr380,
    #[serde(rename = "NWLR_412")]
    Nwlr412,
    #[serde(rename = "NWLR_443")]
    Nwlr443,
    #[serde(rename = "NWLR_490")]
    Nwlr490,
    #[serde(rename = "NWLR_530")]
    Nwlr530,
    #[serde(rename = "NWLR_565")]
    Nwlr565,
    #[serde(rename = "NWLR_670")]
    Nwlr670,
    #[serde(rename = "PAR")]
    Par,
    #[serde(rename = "TAUA_670")]
    Taua670,
    #[serde(rename = "TAUA_865")]
    Taua865,
    #[serde(rename = "FAI")]
    Fai,
    #[serde(rename = "CDOM")]
    Cdom,
    #[serde(rename = "CHLA")]
    Chla,
    #[serde(rename = "TSM")]
    Tsm,
    #[serde(rename = "SST")]
    Sst,
    #[serde(rename = "Cloud_probability")]
    CloudProbability,
}

impl JasmesProduct {
    pub const ALL: [JasmesProduct; 16] = [
        JasmesProduct::Nwlr380,
        JasmesProduct::Nwlr412,
        JasmesProduct::Nwlr443,
        JasmesProduct::Nwlr490,
        JasmesProduct::Nwlr530,
        JasmesProduct::Nwlr565,
        JasmesProduct::Nwlr670,
        JasmesProduct::Par,
        JasmesProduct::Taua670,
        JasmesProduct::Taua865,
        JasmesProduct::Fai,
        JasmesProduct::Cdom,
        JasmesProduct::Chla,
        JasmesProduct::Tsm,
        JasmesProduct::Sst,
        JasmesProduct::CloudProbability,
    ];

    /// Product code as used in file variables and output columns
    pub fn code(&self) -> &'static str {
        match self {
            JasmesProduct::Nwlr380 => "NWLR_380",
            JasmesProduct::Nwlr412 => "NWLR_412",
            JasmesProduct::Nwlr443 => "NWLR_443",
            JasmesProduct::Nwlr490 => "NWLR_490",
            JasmesProduct::Nwlr530 => "NWLR_530",
            JasmesProduct::Nwlr565 => "NWLR_565",
            JasmesProduct::Nwlr670 => "NWLR_670",
            JasmesProduct::Par => "PAR",
            JasmesProduct::Taua670 => "TAUA_670",
            JasmesProduct::Taua865 => "TAUA_865",
            JasmesProduct::Fai => "FAI",
            JasmesProduct::Cdom => "CDOM",
            JasmesProduct::Chla => "CHLA",
            JasmesProduct::Tsm => "TSM",
            JasmesProduct::Sst => "SST",
            JasmesProduct::CloudProbability => "Cloud_probability",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.code() == code)
    }

    /// Resolve a batch column name such as `ftp_path_NWLR_380`
    pub fn from_column(column: &str) -> Option<Self> {
        Self::from_code(column.strip_prefix("ftp_path_").unwrap_or(column))
    }

    /// Water-leaving radiance products also yield a derived Rrs value
    pub fn is_water_leaving_radiance(&self) -> bool {
        self.code().starts_with("NWLR")
    }
}

impl fmt::Display for JasmesProduct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Product families with a distinct band layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductFamily {
    /// G-Portal level-1B top-of-atmosphere radiance/reflectance
    #[serde(rename = "L1B")]
    GportalL1B,
    /// G-Portal level-2 normalized water-leaving radiance (reported as Rrs)
    #[serde(rename = "L2R")]
    GportalL2R,
    /// G-Portal level-2 in-water properties
    #[serde(rename = "L2P")]
    GportalL2P,
    /// One JASMES single-product file
    Jasmes(JasmesProduct),
}

impl ProductFamily {
    /// G-Portal catalog dataset id, None for JASMES
    pub fn dataset_id(&self) -> Option<&'static str> {
        match self {
            ProductFamily::GportalL1B => Some("10001003"),
            ProductFamily::GportalL2R => Some("10002000"),
            ProductFamily::GportalL2P => Some("10002001"),
            ProductFamily::Jasmes(_) => None,
        }
    }

    /// Parse the level names used by batch tables (`L1B`, `L2R`, `L2P`)
    pub fn from_level(level: &str) -> Option<Self> {
        match level.to_uppercase().as_str() {
            "L1B" => Some(ProductFamily::GportalL1B),
            "L2R" => Some(ProductFamily::GportalL2R),
            "L2P" => Some(ProductFamily::GportalL2P),
            _ => None,
        }
    }
}

impl fmt::Display for ProductFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProductFamily::GportalL1B => write!(f, "L1B"),
            ProductFamily::GportalL2R => write!(f, "L2R"),
            ProductFamily::GportalL2P => write!(f, "L2P"),
            ProductFamily::Jasmes(p) => write!(f, "JASMES {}", p),
        }
    }
}

/// G-Portal spatial resolution classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "250m")]
    High,
    #[serde(rename = "1km")]
    Low,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::High => "250m",
            Resolution::Low => "1km",
        }
    }

    /// Accepts `250m`/`250` and `1km`/`1000`/`1`
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.starts_with("250") {
            Some(Resolution::High)
        } else if s.starts_with('1') {
            Some(Resolution::Low)
        } else {
            None
        }
    }
}

/// Error types for pixel extraction
#[derive(Debug, thiserror::Error)]
pub enum SgliError {
    #[error("Geolocation unavailable: navigation grid has no valid coordinate")]
    GeolocationUnavailable,

    #[error("Corrupt product: {0}")]
    CorruptProduct(String),

    #[error("Band not found: {band}")]
    BandNotFound { band: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "gdal")]
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),
}

impl SgliError {
    pub fn band_not_found(band: impl Into<String>) -> Self {
        SgliError::BandNotFound { band: band.into() }
    }
}

/// Result type for extraction operations
pub type SgliResult<T> = Result<T, SgliError>;
