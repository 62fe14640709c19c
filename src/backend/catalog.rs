use crate::backend::EvaluatedImage;
use crate::types::{SarError, SarResult};
use std::collections::HashMap;
use std::sync::Arc;

/// Catalog entry: a single raster or an ordered collection of rasters
#[derive(Debug, Clone)]
pub enum CatalogEntry {
    Image(Arc<EvaluatedImage>),
    Collection(Vec<Arc<EvaluatedImage>>),
}

/// Asset id → raster lookup used by the local backend
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: HashMap<String, CatalogEntry>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a raster, replacing any previous entry with the same id
    pub fn insert_image(&mut self, asset_id: impl Into<String>, image: EvaluatedImage) {
        let asset_id = asset_id.into();
        log::debug!("Catalog: registering image '{}' ({:?})", asset_id, image.band_names());
        self.entries.insert(asset_id, CatalogEntry::Image(Arc::new(image)));
    }

    pub fn insert_collection(&mut self, asset_id: impl Into<String>, images: Vec<EvaluatedImage>) {
        let asset_id = asset_id.into();
        log::debug!("Catalog: registering collection '{}' ({} images)", asset_id, images.len());
        self.entries.insert(
            asset_id,
            CatalogEntry::Collection(images.into_iter().map(Arc::new).collect()),
        );
    }

    pub fn image(&self, asset_id: &str) -> SarResult<Arc<EvaluatedImage>> {
        match self.entries.get(asset_id) {
            Some(CatalogEntry::Image(image)) => Ok(image.clone()),
            Some(CatalogEntry::Collection(_)) => Err(SarError::AssetNotFound(format!(
                "'{}' is a collection, not an image",
                asset_id
            ))),
            None => Err(SarError::AssetNotFound(asset_id.to_string())),
        }
    }

    pub fn collection(&self, asset_id: &str) -> SarResult<Vec<Arc<EvaluatedImage>>> {
        match self.entries.get(asset_id) {
            Some(CatalogEntry::Collection(images)) => Ok(images.clone()),
            Some(CatalogEntry::Image(_)) => Err(SarError::AssetNotFound(format!(
                "'{}' is an image, not a collection",
                asset_id
            ))),
            None => Err(SarError::AssetNotFound(asset_id.to_string())),
        }
    }

    pub fn contains(&self, asset_id: &str) -> bool {
        self.entries.contains_key(asset_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
