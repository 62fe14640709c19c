use crate::backend::Grid;
use crate::graph::Image;
use crate::types::{BoundingBox, CoordinateSystem};

/// Deferred region reference
#[derive(Debug, Clone)]
pub enum Geometry {
    /// Footprint of an image's default grid
    Footprint(Image),
    /// Explicit rectangle
    Bounds {
        bbox: BoundingBox,
        crs: CoordinateSystem,
    },
}

impl Geometry {
    pub fn rectangle(bbox: BoundingBox, crs: CoordinateSystem) -> Self {
        Geometry::Bounds { bbox, crs }
    }
}

/// Deferred projection reference
#[derive(Debug, Clone)]
pub enum ProjectionRef {
    /// Default grid of an image
    Of(Image),
    /// Explicit grid
    Grid(Grid),
}
