use crate::io::{DnArray, ProductContainer};
use crate::types::{PhysicalArray, SgliError, SgliResult};
use ndarray::Array2;
use num_traits::AsPrimitive;

/// Physical meaning of an extracted band
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandKind {
    /// Top-of-atmosphere radiance
    Radiance,
    /// Reflectance derived from the same DNs as a radiance band
    Reflectance,
    /// Level-2 geophysical quantity (Rrs, Chla, ...)
    Geophysical,
    /// Stored value reported as-is
    Raw,
}

/// How stored DNs map to the physical value, naming the attributes that hold
/// the coefficients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleEncoding {
    /// DN reported unchanged
    Identity,
    /// `dn * slope + offset`, both attributes mandatory
    Linear {
        slope: &'static str,
        offset: &'static str,
    },
    /// `dn * slope + offset`, attributes default to 1 and 0 when absent
    OptionalLinear {
        slope: &'static str,
        offset: &'static str,
    },
    /// Decode with the nominal pair, undo it, then apply the reflectance pair
    Rescaled {
        nominal_slope: &'static str,
        nominal_offset: &'static str,
        slope: &'static str,
        offset: &'static str,
    },
}

/// Attribute names declaring which DNs are invalid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidityAttributes {
    pub error_dn: &'static str,
    pub max_valid_dn: &'static str,
    pub min_valid_dn: &'static str,
    /// Missing attributes are an error rather than "no check"
    pub required: bool,
}

impl ValidityAttributes {
    /// `Error_DN` / `Maximum_valid_DN` / `Minimum_valid_DN` of G-Portal products
    pub const fn gportal(required: bool) -> Self {
        Self {
            error_dn: "Error_DN",
            max_valid_dn: "Maximum_valid_DN",
            min_valid_dn: "Minimum_valid_DN",
            required,
        }
    }

    /// JASMES NetCDF variables flag missing data with `_FillValue`
    pub const fn jasmes() -> Self {
        Self {
            error_dn: "_FillValue",
            max_valid_dn: "Maximum_valid_DN",
            min_valid_dn: "Minimum_valid_DN",
            required: false,
        }
    }
}

/// One extractable quantity of a product family
#[derive(Debug, Clone, PartialEq)]
pub struct BandDescriptor {
    /// Output field name in the pixel record
    pub field: String,
    /// Source array path inside the container
    pub source: String,
    pub kind: BandKind,
    pub encoding: ScaleEncoding,
    /// Attribute holding a bitmask applied to DNs before scaling
    pub mask: Option<&'static str>,
    pub validity: Option<ValidityAttributes>,
}

impl BandDescriptor {
    pub fn new(field: impl Into<String>, source: impl Into<String>, kind: BandKind, encoding: ScaleEncoding) -> Self {
        Self {
            field: field.into(),
            source: source.into(),
            kind,
            encoding,
            mask: None,
            validity: None,
        }
    }

    pub fn with_mask(mut self, attribute: &'static str) -> Self {
        self.mask = Some(attribute);
        self
    }

    pub fn with_validity(mut self, validity: ValidityAttributes) -> Self {
        self.validity = Some(validity);
        self
    }
}

/// Resolved linear scaling
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scale {
    Identity,
    Linear {
        slope: f32,
        offset: f32,
    },
    Rescaled {
        nominal_slope: f32,
        nominal_offset: f32,
        slope: f32,
        offset: f32,
    },
}

impl Scale {
    pub fn apply(&self, dn: f32) -> f32 {
        match *self {
            Scale::Identity => dn,
            Scale::Linear { slope, offset } => dn * slope + offset,
            Scale::Rescaled {
                nominal_slope,
                nominal_offset,
                slope,
                offset,
            } => {
                let nominal = dn * nominal_slope + nominal_offset;
                let recovered = (nominal - nominal_offset) / nominal_slope;
                recovered * slope + offset
            }
        }
    }
}

/// Calibration coefficients of one band read from product metadata
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationParams {
    pub mask: Option<i64>,
    pub error_dn: Option<f64>,
    pub max_valid_dn: Option<f64>,
    pub min_valid_dn: Option<f64>,
    pub scale: Scale,
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self {
            mask: None,
            error_dn: None,
            max_valid_dn: None,
            min_valid_dn: None,
            scale: Scale::Identity,
        }
    }
}

impl CalibrationParams {
    pub fn linear(slope: f32, offset: f32) -> Self {
        Self {
            scale: Scale::Linear { slope, offset },
            ..Self::default()
        }
    }

    /// Read the coefficients a descriptor names from its source array
    pub fn resolve<C: ProductContainer + ?Sized>(container: &C, band: &BandDescriptor) -> SgliResult<Self> {
        let path = band.source.as_str();

        let mask = match band.mask {
            Some(name) => Some(container.required_scalar(path, name)? as i64),
            None => None,
        };

        let (error_dn, max_valid_dn, min_valid_dn) = match band.validity {
            Some(v) if v.required => (
                Some(container.required_scalar(path, v.error_dn)?),
                Some(container.required_scalar(path, v.max_valid_dn)?),
                Some(container.required_scalar(path, v.min_valid_dn)?),
            ),
            Some(v) => (
                container.attribute_scalar(path, v.error_dn)?,
                container.attribute_scalar(path, v.max_valid_dn)?,
                container.attribute_scalar(path, v.min_valid_dn)?,
            ),
            None => (None, None, None),
        };

        let scale = match band.encoding {
            ScaleEncoding::Identity => Scale::Identity,
            ScaleEncoding::Linear { slope, offset } => Scale::Linear {
                slope: container.required_scalar(path, slope)? as f32,
                offset: container.required_scalar(path, offset)? as f32,
            },
            ScaleEncoding::OptionalLinear { slope, offset } => Scale::Linear {
                slope: container.attribute_scalar(path, slope)?.unwrap_or(1.0) as f32,
                offset: container.attribute_scalar(path, offset)?.unwrap_or(0.0) as f32,
            },
            ScaleEncoding::Rescaled {
                nominal_slope,
                nominal_offset,
                slope,
                offset,
            } => Scale::Rescaled {
                nominal_slope: container.attribute_scalar(path, nominal_slope)?.unwrap_or(1.0) as f32,
                nominal_offset: container.attribute_scalar(path, nominal_offset)?.unwrap_or(0.0) as f32,
                slope: container.required_scalar(path, slope)? as f32,
                offset: container.required_scalar(path, offset)? as f32,
            },
        };

        log::debug!("Resolved calibration for {} ({}): {:?}", band.field, path, scale);

        Ok(Self {
            mask,
            error_dn,
            max_valid_dn,
            min_valid_dn,
            scale,
        })
    }

    /// Sentinel and valid-range checks on the stored DN; NaN never matches
    pub fn is_invalid(&self, dn: f64) -> bool {
        self.error_dn.map_or(false, |e| dn == e)
            || self.max_valid_dn.map_or(false, |max| dn > max)
            || self.min_valid_dn.map_or(false, |min| dn < min)
    }

    fn masked(&self, dn: f64) -> f32 {
        match self.mask {
            Some(mask) if dn.is_finite() => ((dn as i64) & mask) as f32,
            _ => dn as f32,
        }
    }

    /// Calibrate one DN, NaN when declared invalid
    pub fn apply(&self, dn: f64) -> f32 {
        if self.is_invalid(dn) {
            return f32::NAN;
        }
        self.scale.apply(self.masked(dn))
    }
}

fn calibrate_typed<T: AsPrimitive<f64>>(raw: &Array2<T>, params: &CalibrationParams) -> PhysicalArray {
    raw.mapv(|dn| params.apply(dn.as_()))
}

/// Calibrate a whole DN array, shape preserved
pub fn calibrate(raw: &DnArray, params: &CalibrationParams) -> PhysicalArray {
    match raw {
        DnArray::U8(a) => calibrate_typed(a, params),
        DnArray::U16(a) => calibrate_typed(a, params),
        DnArray::I16(a) => calibrate_typed(a, params),
        DnArray::U32(a) => calibrate_typed(a, params),
        DnArray::I32(a) => calibrate_typed(a, params),
        DnArray::F32(a) => calibrate_typed(a, params),
        DnArray::F64(a) => calibrate_typed(a, params),
    }
}

/// Calibrates the bands of one opened product
pub struct CalibrationProcessor<'a, C: ProductContainer + ?Sized> {
    container: &'a C,
}

impl<'a, C: ProductContainer + ?Sized> CalibrationProcessor<'a, C> {
    pub fn new(container: &'a C) -> Self {
        Self { container }
    }

    /// Calibrated value of `band` at (row, col)
    pub fn calibrate_pixel(&self, band: &BandDescriptor, row: usize, col: usize) -> SgliResult<f32> {
        let dn = self
            .container
            .read_pixel(&band.source, row, col)?
            .ok_or_else(|| {
                SgliError::CorruptProduct(format!("pixel [{}, {}] outside {}", row, col, band.source))
            })?;
        let params = CalibrationParams::resolve(self.container, band)?;
        Ok(params.apply(dn))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryContainer;
    use ndarray::array;

    fn l1b_radiance() -> BandDescriptor {
        BandDescriptor::new(
            "Lt01",
            "Image_data/Lt_VN01",
            BandKind::Radiance,
            ScaleEncoding::Linear {
                slope: "Slope",
                offset: "Offset",
            },
        )
        .with_mask("Mask")
        .with_validity(ValidityAttributes::gportal(true))
    }

    #[test]
    fn test_error_sentinel_is_nan() {
        let params = CalibrationParams {
            error_dn: Some(65535.0),
            ..CalibrationParams::linear(0.02, -5.0)
        };
        assert!(params.apply(65535.0).is_nan());
        assert!((params.apply(100.0) - (-3.0)).abs() < 1e-6);
    }

    #[test]
    fn test_valid_range_tolerates_nan() {
        let params = CalibrationParams {
            max_valid_dn: Some(1000.0),
            min_valid_dn: Some(10.0),
            ..CalibrationParams::linear(1.0, 0.0)
        };
        assert!(params.apply(1001.0).is_nan());
        assert!(params.apply(9.0).is_nan());
        assert_eq!(params.apply(10.0), 10.0);
        assert!(!params.is_invalid(f64::NAN));
    }

    #[test]
    fn test_mask_applied_before_scaling() {
        let params = CalibrationParams {
            mask: Some(0x3FFF),
            ..CalibrationParams::linear(2.0, 1.0)
        };
        // 0xC005 & 0x3FFF == 5
        assert_eq!(params.apply(0xC005 as f64), 11.0);
    }

    #[test]
    fn test_rescaled_two_stage_decode() {
        let scale = Scale::Rescaled {
            nominal_slope: 0.5,
            nominal_offset: 10.0,
            slope: 0.25,
            offset: -1.0,
        };
        assert!((scale.apply(8.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_whole_array_calibration() {
        let raw = DnArray::from(array![[0u16, 10], [65535, 20]]);
        let params = CalibrationParams {
            error_dn: Some(65535.0),
            ..CalibrationParams::linear(0.5, 1.0)
        };
        let out = calibrate(&raw, &params);
        assert_eq!(out.dim(), (2, 2));
        assert_eq!(out[[0, 1]], 6.0);
        assert!(out[[1, 0]].is_nan());
    }

    #[test]
    fn test_resolve_missing_required_attribute() {
        let container = MemoryContainer::new()
            .with_array("Image_data/Lt_VN01", array![[1u16]])
            .with_attribute("Image_data/Lt_VN01", "Slope", 0.1)
            .with_attribute("Image_data/Lt_VN01", "Offset", 0.0)
            .with_attribute("Image_data/Lt_VN01", "Mask", 16383.0);
        let result = CalibrationParams::resolve(&container, &l1b_radiance());
        assert!(matches!(result, Err(SgliError::BandNotFound { .. })));
    }

    #[test]
    fn test_processor_calibrates_pixel() {
        let container = MemoryContainer::new()
            .with_array("Image_data/Lt_VN01", array![[100u16, 65535]])
            .with_attribute("Image_data/Lt_VN01", "Slope", 0.5)
            .with_attribute("Image_data/Lt_VN01", "Offset", 2.0)
            .with_attribute("Image_data/Lt_VN01", "Mask", 16383.0)
            .with_attribute("Image_data/Lt_VN01", "Error_DN", 65535.0)
            .with_attribute("Image_data/Lt_VN01", "Maximum_valid_DN", 16383.0)
            .with_attribute("Image_data/Lt_VN01", "Minimum_valid_DN", 0.0);

        let processor = CalibrationProcessor::new(&container);
        let band = l1b_radiance();
        assert_eq!(processor.calibrate_pixel(&band, 0, 0).unwrap(), 52.0);
        assert!(processor.calibrate_pixel(&band, 0, 1).unwrap().is_nan());
        assert!(matches!(
            processor.calibrate_pixel(&band, 3, 0),
            Err(SgliError::CorruptProduct(_))
        ));
    }
}
