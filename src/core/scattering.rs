use crate::graph::Image;
use crate::types::{SarError, SarResult};
use num_traits::{Float, FloatConst};
use serde::{Deserialize, Serialize};

/// Scattering model used for the slope correction factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScatteringModel {
    /// Volume scattering (vegetated terrain)
    Volume,
    /// Surface scattering (bare terrain)
    Surface,
}

impl std::str::FromStr for ScatteringModel {
    type Err = SarError;

    fn from_str(s: &str) -> SarResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "volume" => Ok(ScatteringModel::Volume),
            "surface" => Ok(ScatteringModel::Surface),
            other => Err(SarError::Config(format!(
                "Invalid scattering model: '{}' (expected 'volume' or 'surface')",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ScatteringModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScatteringModel::Volume => write!(f, "volume"),
            ScatteringModel::Surface => write!(f, "surface"),
        }
    }
}

impl ScatteringModel {
    /// Correction factor image for this model
    ///
    /// `alpha_az` is only used by the surface model.
    pub fn correction(&self, ninety_rad: &Image, theta_i: &Image, alpha_r: &Image, alpha_az: &Image) -> Image {
        match self {
            ScatteringModel::Volume => volume_model(ninety_rad, theta_i, alpha_r),
            ScatteringModel::Surface => surface_model(ninety_rad, theta_i, alpha_r, alpha_az),
        }
    }

    /// Scalar correction factor, angles in radians
    pub fn factor<T: Float + FloatConst>(&self, theta_i: T, alpha_r: T, alpha_az: T) -> T {
        match self {
            ScatteringModel::Volume => volume_factor(theta_i, alpha_r),
            ScatteringModel::Surface => surface_factor(theta_i, alpha_r, alpha_az),
        }
    }
}

/// tan(90° − θi + αr) / tan(90° − θi)
pub fn volume_model(ninety_rad: &Image, theta_i: &Image, alpha_r: &Image) -> Image {
    let nominator = ninety_rad.subtract(theta_i).add(alpha_r).tan();
    let denominator = ninety_rad.subtract(theta_i).tan();
    nominator.divide(denominator)
}

/// cos(90° − θi) / (cos(αaz) · cos(90° − θi + αr))
pub fn surface_model(ninety_rad: &Image, theta_i: &Image, alpha_r: &Image, alpha_az: &Image) -> Image {
    let nominator = ninety_rad.subtract(theta_i).cos();
    let denominator = alpha_az
        .cos()
        .multiply(ninety_rad.subtract(theta_i).add(alpha_r).cos());
    nominator.divide(denominator)
}

pub fn volume_factor<T: Float + FloatConst>(theta_i: T, alpha_r: T) -> T {
    let ninety = T::FRAC_PI_2();
    (ninety - theta_i + alpha_r).tan() / (ninety - theta_i).tan()
}

pub fn surface_factor<T: Float + FloatConst>(theta_i: T, alpha_r: T, alpha_az: T) -> T {
    let ninety = T::FRAC_PI_2();
    (ninety - theta_i).cos() / (alpha_az.cos() * (ninety - theta_i + alpha_r).cos())
}

/// Slope angle projected into the range plane and the azimuth plane
///
/// `phi_r` is the heading minus the terrain aspect. Returns (αr, αaz).
pub fn projected_slope<T: Float>(alpha_s: T, phi_r: T) -> (T, T) {
    let tan_s = alpha_s.tan();
    ((tan_s * phi_r.cos()).atan(), (tan_s * phi_r.sin()).atan())
}

pub fn db_to_power(db: f64) -> f64 {
    10f64.powf(db / 10.0)
}

pub fn power_to_db(power: f64) -> f64 {
    10.0 * power.log10()
}

/// γ0 = σ0 / cos(θi)
pub fn gamma0(sigma0_pow: f64, theta_i: f64) -> f64 {
    sigma0_pow / theta_i.cos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_volume_factor() {
        let f = volume_factor(30f64.to_radians(), 10f64.to_radians());
        assert_relative_eq!(f, 70f64.to_radians().tan() / 60f64.to_radians().tan(), epsilon = 1e-12);
        assert_relative_eq!(f, 1.586, epsilon = 1e-3);
    }

    #[test]
    fn test_surface_factor_flat() {
        let f = surface_factor(45f64.to_radians(), 0.0, 0.0);
        assert_relative_eq!(f, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_factors_are_one_on_flat_terrain() {
        for theta in [20.0f64, 35.0, 45.0] {
            let t = theta.to_radians();
            assert_relative_eq!(ScatteringModel::Volume.factor(t, 0.0, 0.0), 1.0, epsilon = 1e-12);
            assert_relative_eq!(ScatteringModel::Surface.factor(t, 0.0, 0.0), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_single_precision() {
        let f = volume_factor(30f32.to_radians(), 10f32.to_radians());
        assert_relative_eq!(f, 1.586, epsilon = 1e-3);
    }

    #[test]
    fn test_db_roundtrip() {
        for x in [-35.0, -12.5, 0.0, 3.2, 20.0] {
            assert_relative_eq!(power_to_db(db_to_power(x)), x, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_unit_factor_leaves_gamma0() {
        let g0 = gamma0(db_to_power(-11.0), 38f64.to_radians());
        let flat = g0 / ScatteringModel::Volume.factor(38f64.to_radians(), 0.0, 0.0);
        assert_relative_eq!(flat, g0, epsilon = 1e-15);
    }

    #[test]
    fn test_projected_slope() {
        let (ar, aaz) = projected_slope(20f64.to_radians(), 0.0);
        assert_relative_eq!(ar, 20f64.to_radians(), epsilon = 1e-12);
        assert_relative_eq!(aaz, 0.0, epsilon = 1e-12);

        let (ar, aaz) = projected_slope(20f64.to_radians(), std::f64::consts::FRAC_PI_2);
        assert!(ar.abs() < 1e-12);
        assert_relative_eq!(aaz, 20f64.to_radians(), epsilon = 1e-12);
    }

    #[test]
    fn test_model_parsing() {
        assert_eq!("Volume".parse::<ScatteringModel>().unwrap(), ScatteringModel::Volume);
        assert_eq!(" surface ".parse::<ScatteringModel>().unwrap(), ScatteringModel::Surface);
        assert!(matches!("both".parse::<ScatteringModel>(), Err(SarError::Config(_))));
        assert_eq!(ScatteringModel::Surface.to_string(), "surface");
    }
}
