use crate::backend::EvaluatedImage;
use crate::graph::{Geometry, Number, ProjectionRef, Reducer, RegionReduction};
use std::sync::Arc;

/// Band reference by position or by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BandSelector {
    Index(usize),
    Name(String),
}

impl From<usize> for BandSelector {
    fn from(index: usize) -> Self {
        BandSelector::Index(index)
    }
}

impl From<&str> for BandSelector {
    fn from(name: &str) -> Self {
        BandSelector::Name(name.to_string())
    }
}

impl From<String> for BandSelector {
    fn from(name: String) -> Self {
        BandSelector::Name(name)
    }
}

impl std::fmt::Display for BandSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BandSelector::Index(i) => write!(f, "#{}", i),
            BandSelector::Name(n) => write!(f, "'{}'", n),
        }
    }
}

/// Per-pixel unary operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Tan,
    Cos,
    Sin,
    Atan,
    Sqrt,
    Log10,
    /// Logical not: 1 where the value is zero, 0 elsewhere
    Not,
}

impl UnaryOp {
    pub fn apply(self, v: f64) -> f64 {
        match self {
            UnaryOp::Tan => v.tan(),
            UnaryOp::Cos => v.cos(),
            UnaryOp::Sin => v.sin(),
            UnaryOp::Atan => v.atan(),
            UnaryOp::Sqrt => v.sqrt(),
            UnaryOp::Log10 => v.log10(),
            UnaryOp::Not => bool_to_pixel(v == 0.0),
        }
    }
}

/// Per-pixel binary operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Pow,
    Lt,
    Gt,
    /// Element-wise logical and: 1 where both operands are non-zero
    And,
}

impl BinaryOp {
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Subtract => a - b,
            BinaryOp::Multiply => a * b,
            BinaryOp::Divide => a / b,
            BinaryOp::Pow => a.powf(b),
            BinaryOp::Lt => bool_to_pixel(a < b),
            BinaryOp::Gt => bool_to_pixel(a > b),
            BinaryOp::And => bool_to_pixel(a != 0.0 && b != 0.0),
        }
    }
}

fn bool_to_pixel(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

/// Terrain derivatives of an elevation band
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerrainOp {
    /// Slope in degrees
    Slope,
    /// Aspect in degrees, 0 = north, clockwise
    Aspect,
}

impl TerrainOp {
    pub fn band_name(&self) -> &'static str {
        match self {
            TerrainOp::Slope => "slope",
            TerrainOp::Aspect => "aspect",
        }
    }
}

/// Expression node behind an [`Image`]
#[derive(Debug)]
pub enum ImageNode {
    /// Single band `constant` with the same value everywhere
    Constant(f64),
    /// Constant band whose value is a deferred number
    ConstantNumber(Number),
    /// Catalog asset, resolved by the backend
    Load(String),
    /// In-memory raster
    Source(Arc<EvaluatedImage>),
    /// Pixel area in square meters, band `area`
    PixelArea,
    Select {
        input: Image,
        bands: Vec<BandSelector>,
    },
    Rename {
        input: Image,
        names: Vec<String>,
    },
    AddBands {
        input: Image,
        other: Image,
    },
    Unary {
        op: UnaryOp,
        input: Image,
    },
    Binary {
        op: BinaryOp,
        lhs: Image,
        rhs: Image,
    },
    Unmask {
        input: Image,
        value: f64,
    },
    UpdateMask {
        input: Image,
        mask: Image,
    },
    Clip {
        input: Image,
        geometry: Geometry,
    },
    SetDefaultProjection {
        input: Image,
        projection: ProjectionRef,
    },
    Terrain {
        op: TerrainOp,
        input: Image,
    },
    /// Squared distance in pixels to the nearest non-zero pixel, band `distance`
    FastDistanceTransform {
        input: Image,
        neighborhood: u32,
    },
    CopyProperties {
        input: Image,
        source: Image,
    },
}

/// Lazy raster image
///
/// Cloning is cheap: nodes are shared, never mutated.
#[derive(Debug, Clone)]
pub struct Image(Arc<ImageNode>);

impl Image {
    fn from_node(node: ImageNode) -> Self {
        Image(Arc::new(node))
    }

    pub fn node(&self) -> &ImageNode {
        &self.0
    }

    /// Node identity, stable while the node is alive
    pub(crate) fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    /// Referenced from more than one place, so worth memoizing
    pub(crate) fn is_shared(&self) -> bool {
        Arc::strong_count(&self.0) > 1
    }

    /// Constant image with a single band named `constant`
    pub fn constant(value: f64) -> Self {
        Self::from_node(ImageNode::Constant(value))
    }

    /// Constant image whose value is computed on evaluation
    pub fn constant_number(value: Number) -> Self {
        Self::from_node(ImageNode::ConstantNumber(value))
    }

    /// Image loaded from the backend catalog
    pub fn load(asset_id: impl Into<String>) -> Self {
        Self::from_node(ImageNode::Load(asset_id.into()))
    }

    /// Wrap an in-memory raster
    pub fn from_raster(raster: EvaluatedImage) -> Self {
        Self::from_node(ImageNode::Source(Arc::new(raster)))
    }

    pub(crate) fn from_shared(raster: Arc<EvaluatedImage>) -> Self {
        Self::from_node(ImageNode::Source(raster))
    }

    pub fn pixel_area() -> Self {
        Self::from_node(ImageNode::PixelArea)
    }

    pub fn select<B: Into<BandSelector>>(&self, bands: impl IntoIterator<Item = B>) -> Self {
        Self::from_node(ImageNode::Select {
            input: self.clone(),
            bands: bands.into_iter().map(Into::into).collect(),
        })
    }

    /// Select a single band
    pub fn select_band(&self, band: impl Into<BandSelector>) -> Self {
        self.select([band.into()])
    }

    pub fn rename<S: Into<String>>(&self, names: impl IntoIterator<Item = S>) -> Self {
        Self::from_node(ImageNode::Rename {
            input: self.clone(),
            names: names.into_iter().map(Into::into).collect(),
        })
    }

    pub fn add_bands(&self, other: &Image) -> Self {
        Self::from_node(ImageNode::AddBands {
            input: self.clone(),
            other: other.clone(),
        })
    }

    fn unary(&self, op: UnaryOp) -> Self {
        Self::from_node(ImageNode::Unary {
            op,
            input: self.clone(),
        })
    }

    fn binary(&self, op: BinaryOp, rhs: impl Into<Image>) -> Self {
        Self::from_node(ImageNode::Binary {
            op,
            lhs: self.clone(),
            rhs: rhs.into(),
        })
    }

    pub fn add(&self, rhs: impl Into<Image>) -> Self {
        self.binary(BinaryOp::Add, rhs)
    }

    pub fn subtract(&self, rhs: impl Into<Image>) -> Self {
        self.binary(BinaryOp::Subtract, rhs)
    }

    pub fn multiply(&self, rhs: impl Into<Image>) -> Self {
        self.binary(BinaryOp::Multiply, rhs)
    }

    pub fn divide(&self, rhs: impl Into<Image>) -> Self {
        self.binary(BinaryOp::Divide, rhs)
    }

    pub fn pow(&self, rhs: impl Into<Image>) -> Self {
        self.binary(BinaryOp::Pow, rhs)
    }

    pub fn lt(&self, rhs: impl Into<Image>) -> Self {
        self.binary(BinaryOp::Lt, rhs)
    }

    pub fn gt(&self, rhs: impl Into<Image>) -> Self {
        self.binary(BinaryOp::Gt, rhs)
    }

    /// Element-wise logical and
    pub fn and(&self, rhs: impl Into<Image>) -> Self {
        self.binary(BinaryOp::And, rhs)
    }

    pub fn not(&self) -> Self {
        self.unary(UnaryOp::Not)
    }

    pub fn tan(&self) -> Self {
        self.unary(UnaryOp::Tan)
    }

    pub fn cos(&self) -> Self {
        self.unary(UnaryOp::Cos)
    }

    pub fn sin(&self) -> Self {
        self.unary(UnaryOp::Sin)
    }

    pub fn atan(&self) -> Self {
        self.unary(UnaryOp::Atan)
    }

    pub fn sqrt(&self) -> Self {
        self.unary(UnaryOp::Sqrt)
    }

    pub fn log10(&self) -> Self {
        self.unary(UnaryOp::Log10)
    }

    /// Replace masked pixels with `value` and mark every pixel valid
    pub fn unmask(&self, value: f64) -> Self {
        Self::from_node(ImageNode::Unmask {
            input: self.clone(),
            value,
        })
    }

    /// Keep pixels where `mask` is valid and non-zero
    pub fn update_mask(&self, mask: &Image) -> Self {
        Self::from_node(ImageNode::UpdateMask {
            input: self.clone(),
            mask: mask.clone(),
        })
    }

    pub fn clip(&self, geometry: &Geometry) -> Self {
        Self::from_node(ImageNode::Clip {
            input: self.clone(),
            geometry: geometry.clone(),
        })
    }

    pub fn set_default_projection(&self, projection: &ProjectionRef) -> Self {
        Self::from_node(ImageNode::SetDefaultProjection {
            input: self.clone(),
            projection: projection.clone(),
        })
    }

    pub(crate) fn terrain(&self, op: TerrainOp) -> Self {
        Self::from_node(ImageNode::Terrain {
            op,
            input: self.clone(),
        })
    }

    pub fn fast_distance_transform(&self, neighborhood: u32) -> Self {
        Self::from_node(ImageNode::FastDistanceTransform {
            input: self.clone(),
            neighborhood,
        })
    }

    pub fn copy_properties(&self, source: &Image) -> Self {
        Self::from_node(ImageNode::CopyProperties {
            input: self.clone(),
            source: source.clone(),
        })
    }

    /// Footprint of this image
    pub fn geometry(&self) -> Geometry {
        Geometry::Footprint(self.clone())
    }

    /// Default projection of this image
    pub fn projection(&self) -> ProjectionRef {
        ProjectionRef::Of(self.clone())
    }

    pub fn reduce_region(&self, reducer: Reducer, geometry: &Geometry, scale: f64) -> RegionReduction {
        RegionReduction::new(self.clone(), reducer, geometry.clone(), scale)
    }
}

impl From<f64> for Image {
    fn from(value: f64) -> Self {
        Image::constant(value)
    }
}

impl From<&Image> for Image {
    fn from(image: &Image) -> Self {
        image.clone()
    }
}

impl From<Number> for Image {
    fn from(value: Number) -> Self {
        Image::constant_number(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_does_not_validate() {
        // Neither the asset nor the band exist anywhere; building must still succeed
        let image = Image::load("missing/asset").select(["nope"]).multiply(2.0).log10();
        match image.node() {
            ImageNode::Unary { op, .. } => assert_eq!(*op, UnaryOp::Log10),
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_operations_share_inputs() {
        let base = Image::constant(1.0);
        let sum = base.add(&base);
        if let ImageNode::Binary { lhs, rhs, .. } = sum.node() {
            assert!(Arc::ptr_eq(&lhs.0, &rhs.0));
        } else {
            panic!("expected binary node");
        }
    }

    #[test]
    fn test_pixel_ops() {
        assert_eq!(UnaryOp::Not.apply(0.0), 1.0);
        assert_eq!(UnaryOp::Not.apply(3.0), 0.0);
        assert_eq!(BinaryOp::And.apply(1.0, 0.0), 0.0);
        assert_eq!(BinaryOp::And.apply(2.0, 1.0), 1.0);
        assert_eq!(BinaryOp::Lt.apply(1.0, 2.0), 1.0);
        assert_eq!(BinaryOp::Gt.apply(1.0, 2.0), 0.0);
        assert_eq!(BinaryOp::Pow.apply(10.0, 2.0), 100.0);
    }
}
