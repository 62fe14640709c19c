//! Lazy image expression graph
//!
//! Every operation here builds a new node and returns immediately. Nothing is
//! validated or computed until a [`crate::backend::Backend`] evaluates the
//! result, so a missing band or asset only shows up at evaluation time.

pub mod image;
pub mod number;
pub mod geometry;
pub mod collection;
pub mod terrain;

pub use image::{BandSelector, BinaryOp, Image, ImageNode, TerrainOp, UnaryOp};
pub use number::{Number, NumberNode, Reducer, RegionReduction};
pub use geometry::{Geometry, ProjectionRef};
pub use collection::{CollectionNode, ImageCollection, ImageFn};
pub use terrain::Terrain;
