use crate::graph::Image;
use crate::types::{SarError, SarResult};
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;

/// How the layover and shadow masks are combined into the no-data mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskCombination {
    /// Pixel valid only where both masks are true
    ElementwiseAnd,
    /// Shadow mask alone, as produced by legacy pipelines that joined the two
    /// mask objects with a boolean operator instead of a raster AND
    SecondOperand,
}

impl Default for MaskCombination {
    fn default() -> Self {
        MaskCombination::ElementwiseAnd
    }
}

impl std::str::FromStr for MaskCombination {
    type Err = SarError;

    fn from_str(s: &str) -> SarResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "and" | "elementwise_and" => Ok(MaskCombination::ElementwiseAnd),
            "second" | "second_operand" | "legacy" => Ok(MaskCombination::SecondOperand),
            other => Err(SarError::Config(format!("Invalid mask combination: '{}'", other))),
        }
    }
}

impl MaskCombination {
    pub fn combine(&self, layover: &Image, shadow: &Image) -> Image {
        match self {
            MaskCombination::ElementwiseAnd => layover.and(shadow),
            MaskCombination::SecondOperand => shadow.clone(),
        }
    }

    pub fn combine_pixel(&self, layover: bool, shadow: bool) -> bool {
        match self {
            MaskCombination::ElementwiseAnd => layover && shadow,
            MaskCombination::SecondOperand => shadow,
        }
    }
}

/// True (valid) where the range slope is below the incidence angle
pub fn layover(alpha_r: f64, theta_i: f64) -> bool {
    alpha_r < theta_i
}

/// True (valid) where the range slope is above −(90° − θi)
pub fn shadow(alpha_r: f64, theta_i: f64) -> bool {
    alpha_r > -(FRAC_PI_2 - theta_i)
}

pub fn layover_mask(alpha_r: &Image, theta_i: &Image) -> Image {
    alpha_r.lt(theta_i).rename(["layover"])
}

pub fn shadow_mask(alpha_r: &Image, theta_i: &Image, ninety_rad: &Image) -> Image {
    alpha_r
        .gt(Image::constant(-1.0).multiply(ninety_rad.subtract(theta_i)))
        .rename(["shadow"])
}

/// Drop mask pixels closer than `distance` meters to a false or masked pixel
pub fn erode(image: &Image, distance: f64, neighborhood: u32) -> Image {
    let d = image
        .not()
        .unmask(1.0)
        .fast_distance_transform(neighborhood)
        .sqrt()
        .multiply(Image::pixel_area().sqrt());
    image.update_mask(&d.gt(distance))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layover_shadow_predicates() {
        let (alpha_r, theta_i) = (5f64.to_radians(), 10f64.to_radians());
        assert!(layover(alpha_r, theta_i));
        assert!(shadow(alpha_r, theta_i));

        // Slope steeper than the incidence angle lays over
        assert!(!layover(40f64.to_radians(), 35f64.to_radians()));
        // Back slope steeper than the grazing angle is in shadow
        assert!(!shadow((-60f64).to_radians(), 35f64.to_radians()));
    }

    #[test]
    fn test_combination_rules() {
        let and = MaskCombination::ElementwiseAnd;
        let legacy = MaskCombination::SecondOperand;
        assert!(and.combine_pixel(true, true));
        assert!(!and.combine_pixel(false, true));
        // The legacy rule ignores layover entirely
        assert!(legacy.combine_pixel(false, true));
        assert!(!legacy.combine_pixel(true, false));
    }

    #[test]
    fn test_parse_combination() {
        assert_eq!("and".parse::<MaskCombination>().unwrap(), MaskCombination::ElementwiseAnd);
        assert_eq!("legacy".parse::<MaskCombination>().unwrap(), MaskCombination::SecondOperand);
        assert!("or".parse::<MaskCombination>().is_err());
        assert_eq!(MaskCombination::default(), MaskCombination::ElementwiseAnd);
    }
}
