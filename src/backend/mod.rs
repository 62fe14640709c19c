//! Evaluation of lazy image expressions

pub mod raster;
pub mod kernels;
pub mod catalog;
pub mod local;

pub use raster::{Band, EvaluatedImage, Grid};
pub use catalog::{Catalog, CatalogEntry};
pub use local::{LocalBackend, LocalBackendParams};

use crate::graph::{Image, ImageCollection, Number};
use crate::types::SarResult;

/// Materializes expressions built with [`crate::graph`]
///
/// All input validation happens here, never at graph construction.
pub trait Backend {
    /// Evaluate an image on its default grid
    fn evaluate(&self, image: &Image) -> SarResult<EvaluatedImage>;

    fn evaluate_number(&self, number: &Number) -> SarResult<f64>;

    /// Evaluate every image of a collection, in order
    fn evaluate_collection(&self, collection: &ImageCollection) -> SarResult<Vec<EvaluatedImage>>;
}
