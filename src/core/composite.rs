use crate::core::extract::{ProductExtractor, ProductLayout};
use crate::io::ProductContainer;
use crate::types::{JasmesProduct, PixelRecord, ProductFamily, SgliError, SgliResult};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A JASMES member that could not contribute to a composite record
#[derive(Debug)]
pub struct MemberFailure {
    pub product: JasmesProduct,
    pub error: SgliError,
}

/// Merged record of a composite query and the members left out of it
#[derive(Debug, Default)]
pub struct PartialCompositeResult {
    pub record: PixelRecord,
    pub failures: Vec<MemberFailure>,
}

impl PartialCompositeResult {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Record of a query where at least one member contributed.
    ///
    /// With no contributing member the first member's error is returned.
    pub fn into_result(self) -> SgliResult<Self> {
        if !self.record.is_empty() || self.failures.is_empty() {
            return Ok(self);
        }
        let mut failures = self.failures;
        let first = failures.remove(0);
        Err(first.error)
    }
}

/// Extraction over a set of single-product JASMES files.
///
/// Each file is opened, queried and released in turn. A member that fails to
/// open or extract is logged and skipped so the rest still contribute.
pub struct CompositeExtractor<F> {
    paths: BTreeMap<JasmesProduct, PathBuf>,
    opener: F,
}

impl<F, C> CompositeExtractor<F>
where
    F: Fn(&Path) -> SgliResult<C>,
    C: ProductContainer,
{
    pub fn new(paths: BTreeMap<JasmesProduct, PathBuf>, opener: F) -> Self {
        Self { paths, opener }
    }

    fn extract_member(&self, product: JasmesProduct, path: &Path, lat: f64, lon: f64) -> SgliResult<PixelRecord> {
        let container = (self.opener)(path)?;
        let mut extractor = ProductExtractor::new(container, ProductFamily::Jasmes(product));
        let record = extractor.get_pixel(lat, lon)?;
        drop(extractor.close());
        Ok(record)
    }

    /// Merge every member's fields at (lat, lon)
    pub fn get_pixel(&self, lat: f64, lon: f64) -> PartialCompositeResult {
        log::info!("Extracting ({}, {}) from {} JASMES products", lat, lon, self.paths.len());

        self.paths
            .iter()
            .fold(PartialCompositeResult::default(), |mut acc, (&product, path)| {
                match self.extract_member(product, path, lat, lon) {
                    Ok(record) => acc.record.merge(record),
                    Err(e) => {
                        log::warn!("Skipping {} ({}): {}", product, path.display(), e);
                        acc.failures.push(MemberFailure { product, error: e });
                    }
                }
                acc
            })
    }

    /// Field names a fully successful query would produce
    pub fn expected_fields(&self) -> Vec<String> {
        self.paths
            .keys()
            .flat_map(|&p| ProductLayout::for_family(ProductFamily::Jasmes(p)).field_names())
            .collect()
    }

    pub fn missing_fields(&self, record: &PixelRecord) -> Vec<String> {
        self.expected_fields()
            .into_iter()
            .filter(|name| !record.contains(name))
            .collect()
    }
}

/// Resolve `ftp_path_<CODE>` style columns to product paths, ignoring
/// unknown columns and empty cells
pub fn paths_from_columns<'a, I>(columns: I) -> BTreeMap<JasmesProduct, PathBuf>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    columns
        .into_iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .filter_map(|(column, value)| JasmesProduct::from_column(column).map(|p| (p, PathBuf::from(value))))
        .collect()
}
