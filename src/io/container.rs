use crate::types::{SgliError, SgliResult};
use ndarray::{Array1, Array2};
use num_traits::AsPrimitive;
use std::collections::HashMap;

/// Raw stored samples of one named array, kept in their on-disk type
#[derive(Debug, Clone, PartialEq)]
pub enum DnArray {
    U8(Array2<u8>),
    U16(Array2<u16>),
    I16(Array2<i16>),
    U32(Array2<u32>),
    I32(Array2<i32>),
    F32(Array2<f32>),
    F64(Array2<f64>),
}

fn sample<T: AsPrimitive<f64>>(array: &Array2<T>, row: usize, col: usize) -> Option<f64> {
    array.get([row, col]).map(|v| v.as_())
}

fn widen<T: AsPrimitive<f32>>(array: &Array2<T>) -> Array2<f32> {
    array.mapv(|v| v.as_())
}

impl DnArray {
    pub fn dim(&self) -> (usize, usize) {
        match self {
            DnArray::U8(a) => a.dim(),
            DnArray::U16(a) => a.dim(),
            DnArray::I16(a) => a.dim(),
            DnArray::U32(a) => a.dim(),
            DnArray::I32(a) => a.dim(),
            DnArray::F32(a) => a.dim(),
            DnArray::F64(a) => a.dim(),
        }
    }

    /// Sample at (row, col) widened to f64; exact for every stored integer type
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        match self {
            DnArray::U8(a) => sample(a, row, col),
            DnArray::U16(a) => sample(a, row, col),
            DnArray::I16(a) => sample(a, row, col),
            DnArray::U32(a) => sample(a, row, col),
            DnArray::I32(a) => sample(a, row, col),
            DnArray::F32(a) => sample(a, row, col),
            DnArray::F64(a) => sample(a, row, col),
        }
    }

    /// Convert to single precision, used for geolocation arrays
    pub fn to_f32(&self) -> Array2<f32> {
        match self {
            DnArray::U8(a) => widen(a),
            DnArray::U16(a) => widen(a),
            DnArray::I16(a) => widen(a),
            DnArray::U32(a) => widen(a),
            DnArray::I32(a) => widen(a),
            DnArray::F32(a) => a.clone(),
            DnArray::F64(a) => widen(a),
        }
    }

    /// Flatten a (1, n) or (n, 1) array into an axis vector
    pub fn to_axis(&self) -> Option<Array1<f32>> {
        let (rows, cols) = self.dim();
        if rows != 1 && cols != 1 {
            return None;
        }
        Some(self.to_f32().iter().copied().collect())
    }
}

impl From<Array2<u8>> for DnArray {
    fn from(a: Array2<u8>) -> Self {
        DnArray::U8(a)
    }
}

impl From<Array2<u16>> for DnArray {
    fn from(a: Array2<u16>) -> Self {
        DnArray::U16(a)
    }
}

impl From<Array2<i16>> for DnArray {
    fn from(a: Array2<i16>) -> Self {
        DnArray::I16(a)
    }
}

impl From<Array2<u32>> for DnArray {
    fn from(a: Array2<u32>) -> Self {
        DnArray::U32(a)
    }
}

impl From<Array2<i32>> for DnArray {
    fn from(a: Array2<i32>) -> Self {
        DnArray::I32(a)
    }
}

impl From<Array2<f32>> for DnArray {
    fn from(a: Array2<f32>) -> Self {
        DnArray::F32(a)
    }
}

impl From<Array2<f64>> for DnArray {
    fn from(a: Array2<f64>) -> Self {
        DnArray::F64(a)
    }
}

/// An opened hierarchical product exposing named arrays and attributes.
///
/// Paths use `/` separated group names (`Image_data/Lt_VN01`). Attribute values
/// are returned as the full stored vector; most readers only use element 0.
/// A handle is owned by one caller at a time.
pub trait ProductContainer {
    /// Read a named array; a missing array is `BandNotFound`
    fn read_array(&self, path: &str) -> SgliResult<DnArray>;

    /// Read a named attribute of a group or array, `None` when absent
    fn read_attribute(&self, path: &str, name: &str) -> SgliResult<Option<Vec<f64>>>;

    /// Whether the container declares an array at `path`
    fn has_array(&self, path: &str) -> bool;

    /// Single stored value of an array widened to f64, `None` outside its
    /// extent. Readers that can fetch a window override this.
    fn read_pixel(&self, path: &str, row: usize, col: usize) -> SgliResult<Option<f64>> {
        Ok(self.read_array(path)?.get(row, col))
    }

    /// First element of an attribute
    fn attribute_scalar(&self, path: &str, name: &str) -> SgliResult<Option<f64>> {
        Ok(self
            .read_attribute(path, name)?
            .and_then(|values| values.first().copied()))
    }

    /// Attribute that must exist, reported as a missing band/attribute otherwise
    fn required_scalar(&self, path: &str, name: &str) -> SgliResult<f64> {
        self.attribute_scalar(path, name)?
            .ok_or_else(|| SgliError::band_not_found(format!("{}@{}", path, name)))
    }
}

impl<C: ProductContainer + ?Sized> ProductContainer for &C {
    fn read_array(&self, path: &str) -> SgliResult<DnArray> {
        (**self).read_array(path)
    }

    fn read_attribute(&self, path: &str, name: &str) -> SgliResult<Option<Vec<f64>>> {
        (**self).read_attribute(path, name)
    }

    fn has_array(&self, path: &str) -> bool {
        (**self).has_array(path)
    }

    fn read_pixel(&self, path: &str, row: usize, col: usize) -> SgliResult<Option<f64>> {
        (**self).read_pixel(path, row, col)
    }
}

impl<C: ProductContainer + ?Sized> ProductContainer for Box<C> {
    fn read_array(&self, path: &str) -> SgliResult<DnArray> {
        (**self).read_array(path)
    }

    fn read_attribute(&self, path: &str, name: &str) -> SgliResult<Option<Vec<f64>>> {
        (**self).read_attribute(path, name)
    }

    fn has_array(&self, path: &str) -> bool {
        (**self).has_array(path)
    }

    fn read_pixel(&self, path: &str, row: usize, col: usize) -> SgliResult<Option<f64>> {
        (**self).read_pixel(path, row, col)
    }
}

/// Container held entirely in memory.
///
/// Used for products already read by another reader, and for synthetic
/// products in tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryContainer {
    arrays: HashMap<String, DnArray>,
    attributes: HashMap<(String, String), Vec<f64>>,
}

impl MemoryContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_array(&mut self, path: impl Into<String>, array: impl Into<DnArray>) {
        self.arrays.insert(path.into(), array.into());
    }

    pub fn insert_attribute(
        &mut self,
        path: impl Into<String>,
        name: impl Into<String>,
        values: Vec<f64>,
    ) {
        self.attributes.insert((path.into(), name.into()), values);
    }

    /// Builder form of `insert_array`
    pub fn with_array(mut self, path: impl Into<String>, array: impl Into<DnArray>) -> Self {
        self.insert_array(path, array);
        self
    }

    /// Builder form of `insert_attribute` for a scalar attribute
    pub fn with_attribute(mut self, path: impl Into<String>, name: impl Into<String>, value: f64) -> Self {
        self.insert_attribute(path, name, vec![value]);
        self
    }
}

impl ProductContainer for MemoryContainer {
    fn read_array(&self, path: &str) -> SgliResult<DnArray> {
        self.arrays
            .get(path)
            .cloned()
            .ok_or_else(|| SgliError::band_not_found(path))
    }

    fn read_attribute(&self, path: &str, name: &str) -> SgliResult<Option<Vec<f64>>> {
        Ok(self
            .attributes
            .get(&(path.to_string(), name.to_string()))
            .cloned())
    }

    fn has_array(&self, path: &str) -> bool {
        self.arrays.contains_key(path)
    }

    fn read_pixel(&self, path: &str, row: usize, col: usize) -> SgliResult<Option<f64>> {
        self.arrays
            .get(path)
            .map(|array| array.get(row, col))
            .ok_or_else(|| SgliError::band_not_found(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_dn_array_widening() {
        let dn = DnArray::from(array![[1u16, 65535], [3, 4]]);
        assert_eq!(dn.dim(), (2, 2));
        assert_eq!(dn.get(0, 1), Some(65535.0));
        assert_eq!(dn.get(2, 0), None);

        let negative = DnArray::from(array![[-5i16]]);
        assert_eq!(negative.get(0, 0), Some(-5.0));
    }

    #[test]
    fn test_axis_flattening() {
        let row = DnArray::from(array![[10.0f32, 20.0, 30.0]]);
        assert_eq!(row.to_axis().unwrap().to_vec(), vec![10.0, 20.0, 30.0]);

        let column = DnArray::from(array![[1.0f64], [2.0]]);
        assert_eq!(column.to_axis().unwrap().to_vec(), vec![1.0, 2.0]);

        let grid = DnArray::from(array![[1.0f32, 2.0], [3.0, 4.0]]);
        assert!(grid.to_axis().is_none());
    }

    #[test]
    fn test_memory_container_lookup() {
        let container = MemoryContainer::new()
            .with_array("Image_data/QA_flag", array![[0u16]])
            .with_attribute("Image_data", "Number_of_pixels", 10.0);

        assert!(container.has_array("Image_data/QA_flag"));
        assert_eq!(
            container.attribute_scalar("Image_data", "Number_of_pixels").unwrap(),
            Some(10.0)
        );
        assert!(container.attribute_scalar("Image_data", "Missing").unwrap().is_none());
        assert!(matches!(
            container.read_array("Image_data/Missing"),
            Err(SgliError::BandNotFound { .. })
        ));
        assert!(matches!(
            container.required_scalar("Image_data", "Missing"),
            Err(SgliError::BandNotFound { .. })
        ));
    }

    #[test]
    fn test_read_pixel_matches_array() {
        let container = MemoryContainer::new().with_array("Image_data/CHLA", array![[1u16, 2, 3], [4, 5, 6]]);
        let full = container.read_array("Image_data/CHLA").unwrap();

        for row in 0..2 {
            for col in 0..3 {
                assert_eq!(container.read_pixel("Image_data/CHLA", row, col).unwrap(), full.get(row, col));
            }
        }
        assert_eq!(container.read_pixel("Image_data/CHLA", 2, 0).unwrap(), None);
        assert_eq!(container.read_pixel("Image_data/CHLA", 0, 3).unwrap(), None);
        assert!(matches!(
            container.read_pixel("Image_data/TSM", 0, 0),
            Err(SgliError::BandNotFound { .. })
        ));

        // Trait objects reach the same override
        let by_ref: &dyn ProductContainer = &container;
        assert_eq!(by_ref.read_pixel("Image_data/CHLA", 1, 2).unwrap(), Some(6.0));
    }
}
