use crate::graph::{Image, TerrainOp};

/// Terrain derivatives of an elevation image
pub struct Terrain;

impl Terrain {
    /// Slope in degrees, band `slope`
    pub fn slope(elevation: &Image) -> Image {
        elevation.terrain(TerrainOp::Slope)
    }

    /// Aspect in degrees clockwise from north, band `aspect`
    pub fn aspect(elevation: &Image) -> Image {
        elevation.terrain(TerrainOp::Aspect)
    }
}
