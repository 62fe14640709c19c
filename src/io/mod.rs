//! Raster I/O through GDAL

pub mod dem;
pub mod geotiff;

pub use dem::DemReader;
pub use geotiff::{read_scene, write_image};
