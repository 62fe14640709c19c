//! terraslope: radiometric slope correction for SAR backscatter
//!
//! Corrects Sentinel-1 style `VV`/`VH` backscatter (dB) for terrain-induced
//! radiometric distortion using a volume or surface scattering model, and
//! flags layover and shadow in a `no_data_mask` band.
//!
//! The correction is built as a lazy expression graph ([`graph`]) and
//! materialized by a [`backend::Backend`]. [`backend::LocalBackend`] evaluates
//! in memory over GDAL-readable rasters ([`io`]).

pub mod types;
pub mod graph;
pub mod backend;
pub mod core;
pub mod io;

#[cfg(feature = "python")]
mod python;

// Re-export main types and functions for easier access
pub use types::{
    BoundingBox, CoordinateSystem, GeoTransform, Properties, PropertyValue, SarError, SarResult,
};

pub use graph::{Image, ImageCollection, Number, Reducer, Terrain};
pub use backend::{Backend, Catalog, EvaluatedImage, LocalBackend, LocalBackendParams};
pub use core::{
    correct_scene_files, MaskCombination, ScatteringModel, SlopeCorrection, SlopeCorrectionParams,
};
pub use io::{read_scene, write_image, DemReader};
