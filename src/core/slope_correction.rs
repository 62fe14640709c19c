use crate::core::masking::{self, MaskCombination};
use crate::core::scattering::ScatteringModel;
use crate::graph::{Image, ImageCollection, Reducer, Terrain};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Default elevation asset (SRTM 1 arc-second)
pub const DEFAULT_ELEVATION_ASSET: &str = "USGS/SRTMGL1_003";

const DEG_TO_RAD: f64 = PI / 180.0;

/// Parameters for slope correction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlopeCorrectionParams {
    /// Scattering model for the correction factor
    pub model: ScatteringModel,
    /// Catalog id of the elevation dataset
    pub elevation_asset: String,
    /// Mask erosion distance in meters, 0 disables erosion
    pub buffer: f64,
    /// How layover and shadow masks are combined
    pub mask_combination: MaskCombination,
    /// Reduction scale in meters for the mean heading
    pub heading_scale: f64,
    /// Distance transform search radius in pixels
    pub distance_neighborhood: u32,
}

impl Default for SlopeCorrectionParams {
    fn default() -> Self {
        Self {
            model: ScatteringModel::Volume,
            elevation_asset: DEFAULT_ELEVATION_ASSET.to_string(),
            buffer: 10.0,
            mask_combination: MaskCombination::ElementwiseAnd,
            heading_scale: 1000.0,
            distance_neighborhood: 30,
        }
    }
}

/// Radiometric slope correction over an image collection
///
/// Input images need `VV`, `VH` (dB) and `angle` (incidence angle, degrees)
/// bands. Nothing is checked here; problems surface when a backend evaluates
/// the result.
#[derive(Debug, Clone)]
pub struct SlopeCorrection {
    params: SlopeCorrectionParams,
    elevation: Image,
    ninety_rad: Image,
    collection: ImageCollection,
}

impl SlopeCorrection {
    /// Create a slope correction with default parameters
    pub fn new(collection: ImageCollection) -> Self {
        Self::with_params(collection, SlopeCorrectionParams::default())
    }

    pub fn with_params(collection: ImageCollection, params: SlopeCorrectionParams) -> Self {
        let elevation = Image::load(params.elevation_asset.clone());
        let ninety_rad = Image::constant(90.0).multiply(DEG_TO_RAD);
        Self {
            params,
            elevation,
            ninety_rad,
            collection,
        }
    }

    pub fn params(&self) -> &SlopeCorrectionParams {
        &self.params
    }

    pub fn model(&self) -> ScatteringModel {
        self.params.model
    }

    pub fn buffer(&self) -> f64 {
        self.params.buffer
    }

    pub fn elevation(&self) -> &Image {
        &self.elevation
    }

    pub fn collection(&self) -> &ImageCollection {
        &self.collection
    }

    /// Corrected collection: `correct` applied to every image
    pub fn main(&self) -> ImageCollection {
        log::debug!(
            "Mapping slope correction (model={}, buffer={} m) over collection",
            self.params.model,
            self.params.buffer
        );
        let correction = self.clone();
        self.collection.map(move |image| correction.correct(&image))
    }

    /// Slope-corrected `VV`/`VH` in dB plus a `no_data_mask` band
    pub fn correct(&self, image: &Image) -> Image {
        let geom = image.geometry();
        let proj = image.select_band(1usize).projection();

        // Mean look direction from the incidence angle gradient
        let heading = Terrain::aspect(&image.select_band("angle"))
            .reduce_region(Reducer::Mean, &geom, self.params.heading_scale)
            .get("aspect");

        let sigma0_pow = Image::constant(10.0).pow(image.divide(10.0));

        let theta_i = image.select_band("angle").multiply(DEG_TO_RAD).clip(&geom);
        let phi_i = Image::constant_number(heading).multiply(DEG_TO_RAD);

        let alpha_s = Terrain::slope(&self.elevation)
            .select_band("slope")
            .multiply(DEG_TO_RAD)
            .set_default_projection(&proj)
            .clip(&geom);
        let phi_s = Terrain::aspect(&self.elevation)
            .select_band("aspect")
            .multiply(DEG_TO_RAD)
            .set_default_projection(&proj)
            .clip(&geom);

        let phi_r = phi_i.subtract(&phi_s);
        let alpha_r = alpha_s.tan().multiply(phi_r.cos()).atan();
        let alpha_az = alpha_s.tan().multiply(phi_r.sin()).atan();

        let gamma0 = sigma0_pow.divide(theta_i.cos());
        let corr_model = self
            .params
            .model
            .correction(&self.ninety_rad, &theta_i, &alpha_r, &alpha_az);
        let gamma0_flat = gamma0.divide(&corr_model);
        let gamma0_flat_db = Image::constant(10.0)
            .multiply(gamma0_flat.log10())
            .select(["VV", "VH"]);

        let mask = self.masking(&alpha_r, &theta_i);
        gamma0_flat_db.add_bands(&mask).copy_properties(image)
    }

    /// Layover/shadow no-data mask, eroded by `buffer` meters
    fn masking(&self, alpha_r: &Image, theta_i: &Image) -> Image {
        let layover = masking::layover_mask(alpha_r, theta_i);
        let shadow = masking::shadow_mask(alpha_r, theta_i, &self.ninety_rad);
        let mut mask = self.params.mask_combination.combine(&layover, &shadow);
        if self.params.buffer > 0.0 {
            mask = masking::erode(&mask, self.params.buffer, self.params.distance_neighborhood);
        }
        mask.rename(["no_data_mask"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::CollectionNode;

    #[test]
    fn test_defaults() {
        let correction = SlopeCorrection::new(ImageCollection::from_images(vec![]));
        assert_eq!(correction.model(), ScatteringModel::Volume);
        assert_eq!(correction.buffer(), 10.0);
        assert_eq!(correction.params().elevation_asset, "USGS/SRTMGL1_003");
        assert_eq!(correction.params().mask_combination, MaskCombination::ElementwiseAnd);
    }

    #[test]
    fn test_main_leaves_collection_untouched() {
        let source = ImageCollection::from_images(vec![Image::load("scene-a")]);
        let correction = SlopeCorrection::new(source.clone());
        let corrected = correction.main();

        assert!(matches!(corrected.node(), CollectionNode::Map { .. }));
        assert!(matches!(source.node(), CollectionNode::Images(v) if v.len() == 1));
    }

    #[test]
    fn test_correct_builds_without_inputs() {
        // Nothing is registered anywhere: construction must not fail
        let correction = SlopeCorrection::new(ImageCollection::load("nothing"));
        let _ = correction.correct(&Image::load("not-a-scene"));
    }
}
