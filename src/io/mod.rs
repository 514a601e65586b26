//! Product containers and catalog parsing

pub mod container;
pub mod catalog;
#[cfg(feature = "gdal")]
pub mod gdal_container;

pub use container::{DnArray, MemoryContainer, ProductContainer};
pub use catalog::{search_polygon_wkt, CatalogRecord, SearchResult};
#[cfg(feature = "gdal")]
pub use gdal_container::{ContainerFormat, GdalContainer};
