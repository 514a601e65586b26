use crate::core::calibrate::{BandDescriptor, BandKind, CalibrationProcessor, ScaleEncoding, ValidityAttributes};
use crate::core::quality_flags::{decode_flag_dn, FlagTable, L2P_FLAGS, L2R_FLAGS};
use crate::core::resample::GeoResampler;
use crate::io::ProductContainer;
use crate::types::{
    JasmesProduct, NavigationGrid, PixelMatch, PixelRecord, PixelValue, ProductFamily, SgliError, SgliResult,
};

/// QA word of G-Portal level-2 products
pub const QA_FLAG_PATH: &str = "Image_data/QA_flag";
/// Land/water classification of L1B products
pub const LAND_WATER_PATH: &str = "Image_data/Land_water_flag";
/// Axes of JASMES gridded products
pub const JASMES_LATITUDE: &str = "Latitude";
pub const JASMES_LONGITUDE: &str = "Longitude";

const L2R_WAVELENGTHS: [u16; 7] = [380, 412, 443, 490, 530, 565, 670];

/// Where a family keeps its navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationSource {
    /// `Geometry_data` tie points expanded by the resampler
    TiePoints,
    /// `Latitude`/`Longitude` variables at full resolution
    Gridded,
}

/// Bands, flags and navigation declared by one product family
#[derive(Debug, Clone)]
pub struct ProductLayout {
    pub family: ProductFamily,
    pub bands: Vec<BandDescriptor>,
    pub flags: Option<FlagTable>,
    pub navigation: NavigationSource,
}

impl ProductLayout {
    pub fn for_family(family: ProductFamily) -> Self {
        match family {
            ProductFamily::GportalL1B => Self::l1b(),
            ProductFamily::GportalL2R => Self::l2r(),
            ProductFamily::GportalL2P => Self::l2p(),
            ProductFamily::Jasmes(product) => Self::jasmes(product),
        }
    }

    fn l1b() -> Self {
        let radiance_encoding = ScaleEncoding::Linear {
            slope: "Slope",
            offset: "Offset",
        };
        let reflectance_encoding = ScaleEncoding::Linear {
            slope: "Slope_reflectance",
            offset: "Offset_reflectance",
        };

        let mut bands = Vec::with_capacity(23);
        for (prefix, kind, encoding) in [
            ("Lt", BandKind::Radiance, radiance_encoding),
            ("Rt", BandKind::Reflectance, reflectance_encoding),
        ] {
            for channel in 1..=11 {
                bands.push(
                    BandDescriptor::new(
                        format!("{}{:02}", prefix, channel),
                        format!("Image_data/Lt_VN{:02}", channel),
                        kind,
                        encoding,
                    )
                    .with_mask("Mask")
                    .with_validity(ValidityAttributes::gportal(true)),
                );
            }
        }
        bands.push(BandDescriptor::new(
            "land",
            LAND_WATER_PATH,
            BandKind::Raw,
            ScaleEncoding::Identity,
        ));

        Self {
            family: ProductFamily::GportalL1B,
            bands,
            flags: None,
            navigation: NavigationSource::TiePoints,
        }
    }

    fn l2r() -> Self {
        let bands = L2R_WAVELENGTHS
            .iter()
            .map(|wl| {
                BandDescriptor::new(
                    format!("Rrs_{}", wl),
                    format!("Image_data/NWLR_{}", wl),
                    BandKind::Geophysical,
                    ScaleEncoding::Linear {
                        slope: "Rrs_slope",
                        offset: "Rrs_offset",
                    },
                )
                .with_validity(ValidityAttributes::gportal(false))
            })
            .collect();

        Self {
            family: ProductFamily::GportalL2R,
            bands,
            flags: Some(L2R_FLAGS),
            navigation: NavigationSource::TiePoints,
        }
    }

    fn l2p() -> Self {
        let bands = [
            ("Chla_GPORTAL", "Image_data/CHLA"),
            ("aCDOM_412_GPORTAL", "Image_data/CDOM"),
            ("TSM_GPORTAL", "Image_data/TSM"),
        ]
        .iter()
        .map(|&(field, source)| {
            BandDescriptor::new(
                field,
                source,
                BandKind::Geophysical,
                ScaleEncoding::Linear {
                    slope: "Slope",
                    offset: "Offset",
                },
            )
            .with_validity(ValidityAttributes::gportal(false))
        })
        .collect();

        Self {
            family: ProductFamily::GportalL2P,
            bands,
            flags: Some(L2P_FLAGS),
            navigation: NavigationSource::TiePoints,
        }
    }

    fn jasmes(product: JasmesProduct) -> Self {
        let code = product.code();
        let mut bands = vec![BandDescriptor::new(
            format!("{}_JASMES", code),
            code,
            BandKind::Geophysical,
            ScaleEncoding::OptionalLinear {
                slope: "scale_factor",
                offset: "add_offset",
            },
        )
        .with_validity(ValidityAttributes::jasmes())];

        if product.is_water_leaving_radiance() {
            bands.push(
                BandDescriptor::new(
                    format!("{}_JASMES", code.replacen("NWLR", "Rrs", 1)),
                    code,
                    BandKind::Geophysical,
                    ScaleEncoding::Rescaled {
                        nominal_slope: "scale_factor",
                        nominal_offset: "add_offset",
                        slope: "Rrs_scale_factor",
                        offset: "Rrs_add_offset",
                    },
                )
                .with_validity(ValidityAttributes::jasmes()),
            );
        }

        Self {
            family: ProductFamily::Jasmes(product),
            bands,
            flags: None,
            navigation: NavigationSource::Gridded,
        }
    }

    /// Every field a successful extraction yields, in output order
    pub fn field_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.bands.iter().map(|b| b.field.clone()).collect();
        if let Some(table) = &self.flags {
            names.extend(table.field_names());
        }
        names
    }

    pub fn band(&self, field: &str) -> Option<&BandDescriptor> {
        self.bands.iter().find(|b| b.field == field)
    }
}

/// Build the navigation grid of a JASMES file from its coordinate variables
fn gridded_navigation<C: ProductContainer + ?Sized>(container: &C) -> SgliResult<NavigationGrid> {
    let lat = container
        .read_array(JASMES_LATITUDE)
        .map_err(|e| SgliError::CorruptProduct(format!("missing latitude variable: {}", e)))?;
    let lon = container
        .read_array(JASMES_LONGITUDE)
        .map_err(|e| SgliError::CorruptProduct(format!("missing longitude variable: {}", e)))?;

    let (rows, cols) = lat.dim();
    if lat.dim() == lon.dim() && rows > 1 && cols > 1 {
        return NavigationGrid::swath(lat.to_f32(), lon.to_f32());
    }

    match (lat.to_axis(), lon.to_axis()) {
        (Some(lat), Some(lon)) => Ok(NavigationGrid::Regular { lat, lon }),
        _ => Err(SgliError::CorruptProduct(format!(
            "unusable coordinate shapes {:?} and {:?}",
            lat.dim(),
            lon.dim()
        ))),
    }
}

/// Pixel extraction from one opened product.
///
/// The navigation grid is built on first use and reused by later queries.
pub struct ProductExtractor<C: ProductContainer> {
    container: C,
    layout: ProductLayout,
    grid: Option<NavigationGrid>,
}

impl<C: ProductContainer> ProductExtractor<C> {
    pub fn new(container: C, family: ProductFamily) -> Self {
        Self::with_layout(container, ProductLayout::for_family(family))
    }

    pub fn with_layout(container: C, layout: ProductLayout) -> Self {
        Self {
            container,
            layout,
            grid: None,
        }
    }

    pub fn family(&self) -> ProductFamily {
        self.layout.family
    }

    pub fn layout(&self) -> &ProductLayout {
        &self.layout
    }

    pub fn container(&self) -> &C {
        &self.container
    }

    /// Full-resolution navigation grid
    pub fn navigation_grid(&mut self) -> SgliResult<&NavigationGrid> {
        if self.grid.is_none() {
            log::info!("Building navigation grid for {} product", self.layout.family);
            let grid = match self.layout.navigation {
                NavigationSource::TiePoints => GeoResampler::from_container(&self.container)?,
                NavigationSource::Gridded => gridded_navigation(&self.container)?,
            };
            self.grid = Some(grid);
        }
        self.grid
            .as_ref()
            .ok_or(SgliError::GeolocationUnavailable)
    }

    /// Nearest pixel to (lat, lon)
    pub fn locate(&mut self, lat: f64, lon: f64) -> SgliResult<PixelMatch> {
        self.navigation_grid()?.locate(lat, lon)
    }

    /// All declared fields at the pixel nearest to (lat, lon)
    pub fn get_pixel(&mut self, lat: f64, lon: f64) -> SgliResult<PixelRecord> {
        let found = self.locate(lat, lon)?;
        let (row, col) = (found.pixel.row, found.pixel.col);

        let processor = CalibrationProcessor::new(&self.container);
        let mut record = PixelRecord::new();
        for band in &self.layout.bands {
            let value = processor.calibrate_pixel(band, row, col)?;
            record.insert(band.field.clone(), PixelValue::Physical(value));
        }

        if let Some(table) = &self.layout.flags {
            let dn = self.container.read_pixel(QA_FLAG_PATH, row, col)?.ok_or_else(|| {
                SgliError::CorruptProduct(format!("pixel {} outside {}", found.pixel, QA_FLAG_PATH))
            })?;
            decode_flag_dn(dn, table).write_into(&mut record);
        }

        log::debug!(
            "Extracted {} fields at pixel {} for ({}, {})",
            record.len(),
            found.pixel,
            lat,
            lon
        );
        Ok(record)
    }

    /// One declared field at the pixel nearest to (lat, lon)
    pub fn get_band(&mut self, lat: f64, lon: f64, field: &str) -> SgliResult<PixelValue> {
        if let Some(band) = self.layout.band(field).cloned() {
            let found = self.locate(lat, lon)?;
            let value = CalibrationProcessor::new(&self.container).calibrate_pixel(
                &band,
                found.pixel.row,
                found.pixel.col,
            )?;
            return Ok(PixelValue::Physical(value));
        }

        if self
            .layout
            .flags
            .map_or(false, |t| t.field_names().iter().any(|n| n == field))
        {
            let record = self.get_pixel(lat, lon)?;
            return record.get(field).ok_or_else(|| SgliError::band_not_found(field));
        }

        Err(SgliError::band_not_found(field))
    }

    /// Release the extractor, handing the container back
    pub fn close(self) -> C {
        self.container
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryContainer;
    use crate::types::PixelCoordinate;
    use ndarray::{array, Array2};

    fn gridded_container() -> MemoryContainer {
        MemoryContainer::new()
            .with_array(JASMES_LATITUDE, array![[35.0f32, 34.0, 33.0]])
            .with_array(JASMES_LONGITUDE, array![[135.0f32, 136.0]])
            .with_array("CHLA", Array2::from_shape_fn((3, 2), |(r, c)| (r * 10 + c) as u16))
            .with_attribute("CHLA", "scale_factor", 0.5)
            .with_attribute("CHLA", "_FillValue", 65535.0)
    }

    #[test]
    fn test_l1b_field_names() {
        let layout = ProductLayout::for_family(ProductFamily::GportalL1B);
        let names = layout.field_names();
        assert_eq!(names.len(), 23);
        assert_eq!(names[0], "Lt01");
        assert_eq!(names[11], "Rt01");
        assert_eq!(names[22], "land");

        let kind = |field: &str| layout.band(field).map(|b| b.kind);
        assert_eq!(kind("Lt04"), Some(BandKind::Radiance));
        assert_eq!(kind("Rt04"), Some(BandKind::Reflectance));
        assert_eq!(kind("land"), Some(BandKind::Raw));
    }

    #[test]
    fn test_l2p_field_names_include_suffixed_flags() {
        let names = ProductLayout::for_family(ProductFamily::GportalL2P).field_names();
        assert!(names.contains(&"aCDOM_412_GPORTAL".to_string()));
        assert!(names.contains(&"ITERFAILCDOM_GPORTAL".to_string()));
        assert_eq!(names.len(), 18);
    }

    #[test]
    fn test_jasmes_nwlr_has_rrs_field() {
        let layout = ProductLayout::for_family(ProductFamily::Jasmes(JasmesProduct::Nwlr443));
        assert_eq!(layout.field_names(), vec!["NWLR_443_JASMES", "Rrs_443_JASMES"]);
    }

    #[test]
    fn test_gridded_extraction() {
        let mut extractor = ProductExtractor::new(gridded_container(), ProductFamily::Jasmes(JasmesProduct::Chla));
        let found = extractor.locate(33.9, 136.2).unwrap();
        assert_eq!(found.pixel, PixelCoordinate::new(1, 1));

        let record = extractor.get_pixel(33.9, 136.2).unwrap();
        assert_eq!(record.get("CHLA_JASMES"), Some(PixelValue::Physical(5.5)));
    }

    #[test]
    fn test_unknown_field() {
        let mut extractor = ProductExtractor::new(gridded_container(), ProductFamily::Jasmes(JasmesProduct::Chla));
        assert!(matches!(
            extractor.get_band(34.0, 135.0, "Rt01"),
            Err(SgliError::BandNotFound { .. })
        ));
        let container = extractor.close();
        assert!(container.has_array("CHLA"));
    }
}
