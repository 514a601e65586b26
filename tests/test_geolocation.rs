use approx::assert_abs_diff_eq;
use ndarray::Array2;
use sgli_extract::core::resample::{GeoResampler, IMAGE_GROUP, LATITUDE_PATH, LONGITUDE_PATH};
use sgli_extract::{MemoryContainer, NavigationGrid, PixelCoordinate, SgliError};

/// 4 x 4 tie points with lat = 10 - row and lon = 100 + col
fn tie_point_product(interval: f64) -> MemoryContainer {
    let lat = Array2::from_shape_fn((4, 4), |(r, _)| 10.0 - r as f32);
    let lon = Array2::from_shape_fn((4, 4), |(_, c)| 100.0 + c as f32);
    MemoryContainer::new()
        .with_array(LATITUDE_PATH, lat)
        .with_array(LONGITUDE_PATH, lon)
        .with_attribute(LATITUDE_PATH, "Resampling_interval", interval)
}

#[test]
fn test_control_points_map_to_scaled_pixels() {
    let _ = env_logger::builder().is_test(true).try_init();

    let grid = GeoResampler::from_container(&tie_point_product(2.0)).expect("Failed to build grid");
    assert_eq!(grid.dim(), (8, 8));

    for r in 0..4 {
        for c in 0..4 {
            let found = grid
                .locate(10.0 - r as f64, 100.0 + c as f64)
                .expect("Failed to locate control point");
            assert_eq!(found.pixel, PixelCoordinate::new(2 * r, 2 * c));
            assert_eq!(found.sq_distance, 0.0);
        }
    }
}

#[test]
fn test_midpoints_are_interpolated() {
    let grid = GeoResampler::from_container(&tie_point_product(2.0)).expect("Failed to build grid");
    let (lat, lon) = grid.coordinate_at(PixelCoordinate::new(1, 3)).expect("Pixel outside grid");
    assert_abs_diff_eq!(lat, 9.5, epsilon = 1e-6);
    assert_abs_diff_eq!(lon, 101.5, epsilon = 1e-6);
}

#[test]
fn test_crop_to_declared_image_size() {
    let product = tie_point_product(2.0)
        .with_attribute(IMAGE_GROUP, "Number_of_lines", 7.0)
        .with_attribute(IMAGE_GROUP, "Number_of_pixels", 6.0);
    let grid = GeoResampler::from_container(&product).expect("Failed to build grid");
    assert_eq!(grid.dim(), (7, 6));

    let oversized = tie_point_product(2.0)
        .with_attribute(IMAGE_GROUP, "Number_of_lines", 9.0)
        .with_attribute(IMAGE_GROUP, "Number_of_pixels", 6.0);
    let grid = GeoResampler::from_container(&oversized).expect("Failed to build grid");
    assert_eq!(grid.dim(), (8, 8));
}

#[test]
fn test_antimeridian_longitudes_stay_in_range() {
    let lat = Array2::from_shape_fn((2, 3), |(r, _)| 50.0 - r as f32);
    let lon = Array2::from_shape_vec((2, 3), vec![178.0f32, -178.0, -174.0, 178.0, -178.0, -174.0])
        .expect("Bad shape");

    let (_, full_lon) = GeoResampler::new(4)
        .expect("Bad interval")
        .resample(&lat, &lon)
        .expect("Failed to resample");

    assert_eq!(full_lon.dim(), (8, 12));
    assert!(full_lon.iter().all(|v| (-180.0..=180.0).contains(v)));
    // Halfway between 178 and -178 lies on the antimeridian, not at 0
    assert_abs_diff_eq!(full_lon[[0, 2]].abs(), 180.0, epsilon = 1e-4);
    assert_abs_diff_eq!(full_lon[[0, 1]], 179.0, epsilon = 1e-4);
    assert_abs_diff_eq!(full_lon[[0, 3]], -179.0, epsilon = 1e-4);
}

#[test]
fn test_missing_geometry_is_corrupt() {
    let product = MemoryContainer::new().with_array(LATITUDE_PATH, Array2::<f32>::zeros((2, 2)));
    assert!(matches!(
        GeoResampler::from_container(&product),
        Err(SgliError::CorruptProduct(_))
    ));
}

#[test]
fn test_oversized_interval_is_corrupt() {
    let declared = tie_point_product(1e6)
        .with_attribute(IMAGE_GROUP, "Number_of_lines", 7.0)
        .with_attribute(IMAGE_GROUP, "Number_of_pixels", 6.0);
    assert!(matches!(
        GeoResampler::from_container(&declared),
        Err(SgliError::CorruptProduct(_))
    ));

    // Without a declared image size the cell count bound still applies
    assert!(matches!(
        GeoResampler::from_container(&tie_point_product(1e6)),
        Err(SgliError::CorruptProduct(_))
    ));
}

#[test]
fn test_mismatched_tie_point_grids_are_corrupt() {
    let product = MemoryContainer::new()
        .with_array(LATITUDE_PATH, Array2::<f32>::zeros((4, 4)))
        .with_array(LONGITUDE_PATH, Array2::<f32>::zeros((4, 3)))
        .with_attribute(LATITUDE_PATH, "Resampling_interval", 2.0);
    match GeoResampler::from_container(&product) {
        Err(SgliError::CorruptProduct(msg)) => assert!(msg.contains("differ in shape")),
        other => panic!("expected CorruptProduct, got {:?}", other),
    }
}

#[test]
fn test_locator_is_deterministic_on_ties() {
    let lat = Array2::from_elem((3, 3), 0.0f32);
    let lon = Array2::from_shape_fn((3, 3), |(_, c)| c as f32 * 2.0 - 2.0);
    let grid = NavigationGrid::swath(lat, lon).expect("Shapes differ");

    let first = grid.locate(1.0, -1.0).expect("No match");
    for _ in 0..10 {
        assert_eq!(grid.locate(1.0, -1.0).expect("No match"), first);
    }
    assert_eq!(first.pixel, PixelCoordinate::new(0, 0));
}
