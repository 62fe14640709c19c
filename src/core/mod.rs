//! Slope correction: scattering models, masking and the per-image pipeline

pub mod scattering;
pub mod masking;
pub mod slope_correction;
pub mod scene_pipeline;

// Re-export main types
pub use scattering::{ScatteringModel, volume_factor, surface_factor, db_to_power, power_to_db};
pub use masking::MaskCombination;
pub use slope_correction::{SlopeCorrection, SlopeCorrectionParams, DEFAULT_ELEVATION_ASSET};
pub use scene_pipeline::correct_scene_files;
