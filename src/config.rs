//! Extraction requests and batch execution.
//!
//! A request names a product family, the file(s) to read and the query point.
//! Opening files is injected through an opener closure so the same code runs
//! against GDAL-backed containers and in-memory ones.

use crate::core::composite::{CompositeExtractor, MemberFailure, PartialCompositeResult};
use crate::core::extract::ProductExtractor;
use crate::io::ProductContainer;
use crate::types::{JasmesProduct, PixelRecord, ProductFamily, SgliError, SgliResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Product selector of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestProduct {
    L1B,
    L2R,
    L2P,
    /// One or more JASMES single-product files
    #[serde(rename = "JASMES")]
    Jasmes,
}

/// One (product, latitude, longitude) query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRequest {
    pub product: RequestProduct,
    /// G-Portal product file
    #[serde(default)]
    pub product_path: Option<PathBuf>,
    /// JASMES files keyed by product code
    #[serde(default)]
    pub product_paths: BTreeMap<JasmesProduct, PathBuf>,
    pub latitude: f64,
    pub longitude: f64,
}

impl Default for ExtractionRequest {
    fn default() -> Self {
        Self {
            product: RequestProduct::L2R,
            product_path: None,
            product_paths: BTreeMap::new(),
            latitude: 0.0,
            longitude: 0.0,
        }
    }
}

impl ExtractionRequest {
    pub fn from_json_str(json: &str) -> SgliResult<Self> {
        let request: Self = serde_json::from_str(json)?;
        request.validate()?;
        Ok(request)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> SgliResult<Self> {
        log::info!("Loading extraction request: {}", path.as_ref().display());
        Self::from_json_str(&std::fs::read_to_string(path.as_ref())?)
    }

    /// Parse a JSON array of requests
    pub fn batch_from_json_str(json: &str) -> SgliResult<Vec<Self>> {
        let requests: Vec<Self> = serde_json::from_str(json)?;
        for request in &requests {
            request.validate()?;
        }
        Ok(requests)
    }

    pub fn validate(&self) -> SgliResult<()> {
        if !self.latitude.is_finite() || self.latitude.abs() > 90.0 {
            return Err(SgliError::InvalidInput(format!("latitude out of range: {}", self.latitude)));
        }
        if !self.longitude.is_finite() || self.longitude.abs() > 180.0 {
            return Err(SgliError::InvalidInput(format!("longitude out of range: {}", self.longitude)));
        }
        match self.product {
            RequestProduct::Jasmes if self.product_paths.is_empty() => Err(
                SgliError::InvalidInput("JASMES request without product_paths".to_string()),
            ),
            RequestProduct::Jasmes => Ok(()),
            _ if self.product_path.is_none() => Err(SgliError::InvalidInput(format!(
                "{:?} request without product_path",
                self.product
            ))),
            _ => Ok(()),
        }
    }

    /// Single-file family of the request, None for a JASMES composite
    pub fn family(&self) -> Option<ProductFamily> {
        match self.product {
            RequestProduct::L1B => Some(ProductFamily::GportalL1B),
            RequestProduct::L2R => Some(ProductFamily::GportalL2R),
            RequestProduct::L2P => Some(ProductFamily::GportalL2P),
            RequestProduct::Jasmes => None,
        }
    }
}

/// Run one request, opening its file(s) with `opener`.
///
/// JASMES requests go through the composite extractor and may return an
/// incomplete record; members that failed are logged. When no member
/// contributes, the first member's error is returned.
pub fn extract_with<C, F>(request: &ExtractionRequest, opener: F) -> SgliResult<PixelRecord>
where
    C: ProductContainer,
    F: Fn(&Path) -> SgliResult<C>,
{
    extract_request(request, opener).map(|result| result.record)
}

/// Like [`extract_with`], keeping the composite members that were skipped.
/// Single-file requests never report skipped members.
pub fn extract_request<C, F>(request: &ExtractionRequest, opener: F) -> SgliResult<PartialCompositeResult>
where
    C: ProductContainer,
    F: Fn(&Path) -> SgliResult<C>,
{
    request.validate()?;
    let (lat, lon) = (request.latitude, request.longitude);

    if let Some(family) = request.family() {
        let path = request
            .product_path
            .as_deref()
            .ok_or_else(|| SgliError::InvalidInput("missing product_path".to_string()))?;
        let container = opener(path)?;
        let mut extractor = ProductExtractor::new(container, family);
        let record = extractor.get_pixel(lat, lon)?;
        return Ok(PartialCompositeResult {
            record,
            failures: Vec::new(),
        });
    }

    let composite = CompositeExtractor::new(request.product_paths.clone(), opener);
    let result = composite.get_pixel(lat, lon);
    if !result.is_complete() {
        log::warn!(
            "Composite record at ({}, {}) is missing {:?}",
            lat,
            lon,
            composite.missing_fields(&result.record)
        );
    }
    result.into_result()
}

/// Outcome of one request within a batch
#[derive(Debug)]
pub struct BatchOutcome {
    pub index: usize,
    pub result: SgliResult<PixelRecord>,
    /// Composite members left out of a successful record
    pub skipped: Vec<MemberFailure>,
}

impl BatchOutcome {
    /// Succeeded with every requested member present
    pub fn is_complete(&self) -> bool {
        self.result.is_ok() && self.skipped.is_empty()
    }
}

/// Per-request outcomes of a batch, in request order
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<BatchOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// Successful outcomes that left out at least one composite member
    pub fn partial(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok() && !o.skipped.is_empty()).count()
    }

    pub fn records(&self) -> impl Iterator<Item = (usize, &PixelRecord)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().map(|r| (o.index, r)))
    }
}

fn run_one<C, F>(index: usize, request: &ExtractionRequest, opener: &F) -> BatchOutcome
where
    C: ProductContainer,
    F: Fn(&Path) -> SgliResult<C>,
{
    match extract_request(request, opener) {
        Ok(partial) => BatchOutcome {
            index,
            result: Ok(partial.record),
            skipped: partial.failures,
        },
        Err(e) => {
            log::warn!("Request {} failed: {}", index, e);
            BatchOutcome {
                index,
                result: Err(e),
                skipped: Vec::new(),
            }
        }
    }
}

/// Run many requests, each with its own container. Failures are recorded
/// and do not stop the batch.
#[cfg(feature = "parallel")]
pub fn extract_batch<C, F>(requests: &[ExtractionRequest], opener: F) -> BatchReport
where
    C: ProductContainer,
    F: Fn(&Path) -> SgliResult<C> + Sync,
{
    use rayon::prelude::*;

    log::info!("Running {} extraction requests in parallel", requests.len());
    let outcomes: Vec<BatchOutcome> = requests
        .par_iter()
        .enumerate()
        .map(|(i, request)| run_one(i, request, &opener))
        .collect();

    let report = BatchReport { outcomes };
    log::info!("Batch finished: {} succeeded, {} failed", report.succeeded(), report.failed());
    report
}

/// Run many requests, each with its own container. Failures are recorded
/// and do not stop the batch.
#[cfg(not(feature = "parallel"))]
pub fn extract_batch<C, F>(requests: &[ExtractionRequest], opener: F) -> BatchReport
where
    C: ProductContainer,
    F: Fn(&Path) -> SgliResult<C>,
{
    log::info!("Running {} extraction requests", requests.len());
    let outcomes: Vec<BatchOutcome> = requests
        .iter()
        .enumerate()
        .map(|(i, request)| run_one(i, request, &opener))
        .collect();

    let report = BatchReport { outcomes };
    log::info!("Batch finished: {} succeeded, {} failed", report.succeeded(), report.failed());
    report
}
