//! Core pixel extraction modules

pub mod resample;
pub mod locate;
pub mod calibrate;
pub mod quality_flags;
pub mod extract;
pub mod composite;
pub mod footprint;

// Re-export main types
pub use resample::{GeoResampler, crop_to_image};
pub use locate::{locate, locate_regular};
pub use calibrate::{
    calibrate, BandDescriptor, BandKind, CalibrationParams, CalibrationProcessor, Scale, ScaleEncoding,
    ValidityAttributes,
};
pub use quality_flags::{decode_flags, encode_flags, FlagTable, QualityFlagSet, L2P_FLAGS, L2R_FLAGS};
pub use extract::{NavigationSource, ProductExtractor, ProductLayout};
pub use composite::{paths_from_columns, CompositeExtractor, MemberFailure, PartialCompositeResult};
pub use footprint::{select, select_index, Candidate, Footprint};
