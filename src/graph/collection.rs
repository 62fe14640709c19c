use crate::graph::Image;
use std::sync::Arc;

/// Per-element function applied by [`ImageCollection::map`]
pub type ImageFn = Arc<dyn Fn(Image) -> Image + Send + Sync>;

/// Expression node behind an [`ImageCollection`]
pub enum CollectionNode {
    Images(Vec<Image>),
    /// Catalog collection, resolved by the backend
    Load(String),
    Map {
        input: ImageCollection,
        func: ImageFn,
    },
}

impl std::fmt::Debug for CollectionNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectionNode::Images(images) => f.debug_tuple("Images").field(&images.len()).finish(),
            CollectionNode::Load(id) => f.debug_tuple("Load").field(id).finish(),
            CollectionNode::Map { input, .. } => f.debug_struct("Map").field("input", input).finish(),
        }
    }
}

/// Lazy ordered collection of images
#[derive(Debug, Clone)]
pub struct ImageCollection(Arc<CollectionNode>);

impl ImageCollection {
    pub fn from_images(images: Vec<Image>) -> Self {
        ImageCollection(Arc::new(CollectionNode::Images(images)))
    }

    pub fn load(asset_id: impl Into<String>) -> Self {
        ImageCollection(Arc::new(CollectionNode::Load(asset_id.into())))
    }

    pub fn node(&self) -> &CollectionNode {
        &self.0
    }

    /// New collection with `func` applied to every element on evaluation
    pub fn map<F>(&self, func: F) -> Self
    where
        F: Fn(Image) -> Image + Send + Sync + 'static,
    {
        ImageCollection(Arc::new(CollectionNode::Map {
            input: self.clone(),
            func: Arc::new(func),
        }))
    }
}
