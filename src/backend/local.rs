use crate::backend::kernels;
use crate::backend::{Backend, Band, Catalog, EvaluatedImage, Grid};
use crate::graph::{
    BandSelector, BinaryOp, CollectionNode, Geometry, Image, ImageCollection, ImageNode, Number,
    NumberNode, ProjectionRef,
};
use crate::types::{BoundingBox, CoordinateSystem, Pixel, Properties, SarError, SarResult};
use ndarray::{Array2, Zip};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Parameters for the in-memory backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalBackendParams {
    /// Enable parallel processing
    pub enable_parallel: bool,
    /// Rasters with at most this many rows are processed sequentially
    pub chunk_size: usize,
}

impl Default for LocalBackendParams {
    fn default() -> Self {
        Self {
            enable_parallel: cfg!(feature = "parallel"),
            chunk_size: 64,
        }
    }
}

/// In-memory reference backend over `ndarray` rasters
///
/// Each image is evaluated on its default grid; source rasters on other grids
/// of the same coordinate system are resampled bilinearly. Meant for scenes
/// that fit in memory, there is no tiling.
#[derive(Debug, Clone, Default)]
pub struct LocalBackend {
    catalog: Catalog,
    params: LocalBackendParams,
}

impl LocalBackend {
    pub fn new(catalog: Catalog) -> Self {
        Self::with_params(catalog, LocalBackendParams::default())
    }

    pub fn with_params(catalog: Catalog, params: LocalBackendParams) -> Self {
        Self { catalog, params }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut Catalog {
        &mut self.catalog
    }

    fn parallel_for(&self, rows: usize) -> bool {
        self.params.enable_parallel && rows > self.params.chunk_size
    }

    /// Default grid of an expression, `None` for pure constants
    pub fn default_grid(&self, image: &Image) -> SarResult<Option<Grid>> {
        match image.node() {
            ImageNode::Constant(_) | ImageNode::ConstantNumber(_) | ImageNode::PixelArea => Ok(None),
            ImageNode::Load(id) => Ok(Some(self.catalog.image(id)?.grid.clone())),
            ImageNode::Source(raster) => Ok(Some(raster.grid.clone())),
            ImageNode::SetDefaultProjection { projection, .. } => self.resolve_projection(projection).map(Some),
            ImageNode::Select { input, .. }
            | ImageNode::Rename { input, .. }
            | ImageNode::Unary { input, .. }
            | ImageNode::Unmask { input, .. }
            | ImageNode::Clip { input, .. }
            | ImageNode::Terrain { input, .. }
            | ImageNode::FastDistanceTransform { input, .. }
            | ImageNode::CopyProperties { input, .. } => self.default_grid(input),
            ImageNode::AddBands { input: lhs, other: rhs }
            | ImageNode::Binary { lhs, rhs, .. }
            | ImageNode::UpdateMask { input: lhs, mask: rhs } => match self.default_grid(lhs)? {
                Some(grid) => Ok(Some(grid)),
                None => self.default_grid(rhs),
            },
        }
    }

    fn resolve_projection(&self, projection: &ProjectionRef) -> SarResult<Grid> {
        match projection {
            ProjectionRef::Grid(grid) => Ok(grid.clone()),
            ProjectionRef::Of(image) => self
                .default_grid(image)?
                .ok_or_else(|| SarError::Projection("image has no default projection".to_string())),
        }
    }

    fn resolve_geometry(&self, geometry: &Geometry) -> SarResult<(BoundingBox, CoordinateSystem)> {
        match geometry {
            Geometry::Bounds { bbox, crs } => Ok((*bbox, *crs)),
            Geometry::Footprint(image) => {
                let grid = self
                    .default_grid(image)?
                    .ok_or_else(|| SarError::Projection("image has no footprint".to_string()))?;
                Ok((grid.bounds(), grid.crs))
            }
        }
    }

    /// Properties of an expression without computing any pixels
    fn properties_of(&self, image: &Image) -> SarResult<Properties> {
        match image.node() {
            ImageNode::Constant(_) | ImageNode::ConstantNumber(_) | ImageNode::PixelArea => Ok(Properties::new()),
            ImageNode::Load(id) => Ok(self.catalog.image(id)?.properties.clone()),
            ImageNode::Source(raster) => Ok(raster.properties.clone()),
            ImageNode::CopyProperties { input, source } => {
                let mut properties = self.properties_of(input)?;
                properties.extend(self.properties_of(source)?);
                Ok(properties)
            }
            ImageNode::Select { input, .. }
            | ImageNode::Rename { input, .. }
            | ImageNode::AddBands { input, .. }
            | ImageNode::Unary { input, .. }
            | ImageNode::Binary { lhs: input, .. }
            | ImageNode::Unmask { input, .. }
            | ImageNode::UpdateMask { input, .. }
            | ImageNode::Clip { input, .. }
            | ImageNode::SetDefaultProjection { input, .. }
            | ImageNode::Terrain { input, .. }
            | ImageNode::FastDistanceTransform { input, .. } => self.properties_of(input),
        }
    }

    /// Evaluate the bands of an expression on `grid`
    ///
    /// Shared nodes are evaluated once per grid and reused from `cache`.
    fn eval(&self, image: &Image, grid: &Grid, cache: &mut EvalCache) -> SarResult<Vec<Band>> {
        if !image.is_shared() {
            return self.eval_node(image, grid, cache);
        }
        if let Some(bands) = cache.image(image.id(), grid) {
            return Ok(bands);
        }
        let bands = self.eval_node(image, grid, cache)?;
        cache.insert_image(image.id(), grid, bands.clone());
        Ok(bands)
    }

    fn eval_node(&self, image: &Image, grid: &Grid, cache: &mut EvalCache) -> SarResult<Vec<Band>> {
        let shape = grid.shape();
        match image.node() {
            ImageNode::Constant(value) => Ok(vec![Band::filled("constant", shape, *value)]),
            ImageNode::ConstantNumber(number) => {
                let value = self.number(number, cache)?;
                Ok(vec![Band::filled("constant", shape, value)])
            }
            ImageNode::Load(id) => {
                let raster = self.catalog.image(id)?;
                self.resample(&raster, grid)
            }
            ImageNode::Source(raster) => self.resample(raster, grid),
            ImageNode::PixelArea => Ok(vec![Band::new("area", kernels::pixel_area(grid))]),
            ImageNode::Select { input, bands } => {
                let available = self.eval(input, grid, cache)?;
                bands.iter().map(|selector| select_band(&available, selector)).collect()
            }
            ImageNode::Rename { input, names } => {
                let mut bands = self.eval(input, grid, cache)?;
                if bands.len() != names.len() {
                    return Err(SarError::BandMismatch(format!(
                        "cannot rename {} bands with {} names",
                        bands.len(),
                        names.len()
                    )));
                }
                for (band, name) in bands.iter_mut().zip(names) {
                    band.name = name.clone();
                }
                Ok(bands)
            }
            ImageNode::AddBands { input, other } => {
                let mut bands = self.eval(input, grid, cache)?;
                for band in self.eval(other, grid, cache)? {
                    if bands.iter().any(|b| b.name == band.name) {
                        return Err(SarError::BandMismatch(format!("duplicate band name '{}'", band.name)));
                    }
                    bands.push(band);
                }
                Ok(bands)
            }
            ImageNode::Unary { op, input } => {
                let op = *op;
                Ok(self
                    .eval(input, grid, cache)?
                    .into_iter()
                    .map(|band| {
                        let data = self.map_values(&band.data, move |v| op.apply(v));
                        Band::with_mask(band.name, data, band.valid)
                    })
                    .collect())
            }
            ImageNode::Binary { op, lhs, rhs } => {
                let lhs = self.eval(lhs, grid, cache)?;
                let rhs = self.eval(rhs, grid, cache)?;
                self.binary(*op, &lhs, &rhs)
            }
            ImageNode::Unmask { input, value } => Ok(self
                .eval(input, grid, cache)?
                .into_iter()
                .map(|band| {
                    let data = Zip::from(&band.data)
                        .and(&band.valid)
                        .map_collect(|&v, &ok| if ok { v } else { *value });
                    Band::new(band.name, data)
                })
                .collect()),
            ImageNode::UpdateMask { input, mask } => {
                let bands = self.eval(input, grid, cache)?;
                let masks = self.eval(mask, grid, cache)?;
                if masks.len() != 1 && masks.len() != bands.len() {
                    return Err(SarError::BandMismatch(format!(
                        "mask has {} bands, image has {}",
                        masks.len(),
                        bands.len()
                    )));
                }
                let mut out = Vec::with_capacity(bands.len());
                for (i, band) in bands.iter().enumerate() {
                    let m = if masks.len() == 1 { &masks[0] } else { &masks[i] };
                    let valid = Zip::from(&band.valid)
                        .and(&m.valid)
                        .and(&m.data)
                        .map_collect(|&ok, &m_ok, &m_value| ok && m_ok && m_value != 0.0);
                    out.push(Band::with_mask(band.name.clone(), band.data.clone(), valid));
                }
                Ok(out)
            }
            ImageNode::Clip { input, geometry } => {
                let (bbox, crs) = self.resolve_geometry(geometry)?;
                if crs != grid.crs {
                    return Err(SarError::Projection(format!(
                        "clip geometry is in {}, image grid is in {}",
                        crs, grid.crs
                    )));
                }
                let inside = Array2::from_shape_fn(shape, |(i, j)| {
                    let (x, y) = grid.transform.pixel_center(i as f64, j as f64);
                    bbox.contains(x, y)
                });
                Ok(self
                    .eval(input, grid, cache)?
                    .into_iter()
                    .map(|band| {
                        let valid = and_masks(&band.valid, &inside);
                        Band::with_mask(band.name, band.data, valid)
                    })
                    .collect())
            }
            ImageNode::SetDefaultProjection { input, .. } => self.eval(input, grid, cache),
            ImageNode::Terrain { op, input } => {
                let bands = self.eval(input, grid, cache)?;
                let elevation = bands
                    .first()
                    .ok_or_else(|| SarError::BandNotFound("terrain input has no bands".to_string()))?;
                log::debug!("Computing {} on {}x{} grid", op.band_name(), grid.width, grid.height);
                Ok(vec![kernels::terrain(*op, elevation, grid, self.parallel_for(shape.0))])
            }
            ImageNode::FastDistanceTransform { input, neighborhood } => {
                let bands = self.eval(input, grid, cache)?;
                if bands.len() != 1 {
                    return Err(SarError::BandMismatch(format!(
                        "distance transform needs a single band, got {}",
                        bands.len()
                    )));
                }
                let features = Zip::from(&bands[0].data)
                    .and(&bands[0].valid)
                    .map_collect(|&v, &ok| ok && v != 0.0);
                let distance =
                    kernels::squared_distance_transform(&features, *neighborhood, self.parallel_for(shape.0));
                Ok(vec![Band::new("distance", distance)])
            }
            ImageNode::CopyProperties { input, .. } => self.eval(input, grid, cache),
        }
    }

    fn resample(&self, raster: &EvaluatedImage, grid: &Grid) -> SarResult<Vec<Band>> {
        raster.validate()?;
        if raster.grid.matches(grid) {
            return Ok(raster.bands.clone());
        }
        log::debug!(
            "Resampling {:?} from {}x{} to {}x{}",
            raster.band_names(),
            raster.grid.width,
            raster.grid.height,
            grid.width,
            grid.height
        );
        let parallel = self.parallel_for(grid.height);
        raster
            .bands
            .iter()
            .map(|band| kernels::resample_band(band, &raster.grid, grid, parallel))
            .collect()
    }

    /// Apply a binary op with band broadcasting
    ///
    /// A one-band operand applies against every band of the other; equal
    /// counts pair in order. Names come from the longer operand, the left one
    /// on ties.
    fn binary(&self, op: BinaryOp, lhs: &[Band], rhs: &[Band]) -> SarResult<Vec<Band>> {
        let pairs: Vec<(&Band, &Band, &str)> = match (lhs.len(), rhs.len()) {
            (l, r) if l == r => lhs.iter().zip(rhs).map(|(a, b)| (a, b, a.name.as_str())).collect(),
            (1, _) => rhs.iter().map(|b| (&lhs[0], b, b.name.as_str())).collect(),
            (_, 1) => lhs.iter().map(|a| (a, &rhs[0], a.name.as_str())).collect(),
            (l, r) => {
                return Err(SarError::BandMismatch(format!(
                    "cannot apply {:?} to images with {} and {} bands",
                    op, l, r
                )))
            }
        };

        Ok(pairs
            .into_iter()
            .map(|(a, b, name)| {
                let data = self.zip_values(&a.data, &b.data, move |x, y| op.apply(x, y));
                Band::with_mask(name, data, and_masks(&a.valid, &b.valid))
            })
            .collect())
    }

    fn map_values<F>(&self, data: &Array2<Pixel>, f: F) -> Array2<Pixel>
    where
        F: Fn(Pixel) -> Pixel + Sync + Send,
    {
        if self.parallel_for(data.nrows()) {
            Zip::from(data).par_map_collect(|&v| f(v))
        } else {
            data.mapv(f)
        }
    }

    fn zip_values<F>(&self, a: &Array2<Pixel>, b: &Array2<Pixel>, f: F) -> Array2<Pixel>
    where
        F: Fn(Pixel, Pixel) -> Pixel + Sync + Send,
    {
        if self.parallel_for(a.nrows()) {
            Zip::from(a).and(b).par_map_collect(|&x, &y| f(x, y))
        } else {
            Zip::from(a).and(b).map_collect(|&x, &y| f(x, y))
        }
    }

    fn number(&self, number: &Number, cache: &mut EvalCache) -> SarResult<f64> {
        if let Some(value) = cache.number(number.id()) {
            return Ok(value);
        }
        let value = match number.node() {
            NumberNode::Constant(value) => *value,
            NumberNode::ReduceRegion {
                image,
                reducer,
                geometry,
                scale,
                band,
            } => {
                if !(scale.is_finite() && *scale > 0.0) {
                    return Err(SarError::Config(format!("invalid reduction scale: {}", scale)));
                }
                let (bbox, crs) = self.resolve_geometry(geometry)?;
                let grid = Grid::covering(crs, &bbox, *scale);
                log::debug!(
                    "Reducing '{}' with {:?} at {} m ({}x{} pixels)",
                    band,
                    reducer,
                    scale,
                    grid.width,
                    grid.height
                );

                let bands = self.eval(image, &grid, cache)?;
                let target = select_band(&bands, &BandSelector::Name(band.clone()))?;
                let values = target
                    .data
                    .indexed_iter()
                    .filter(|((i, j), _)| {
                        let (x, y) = grid.transform.pixel_center(*i as f64, *j as f64);
                        target.valid[[*i, *j]] && bbox.contains(x, y)
                    })
                    .map(|(_, v)| *v);

                reducer.reduce(values).ok_or_else(|| {
                    SarError::Processing(format!("no valid pixels of '{}' inside the reduction region", band))
                })?
            }
        };
        cache.insert_number(number.id(), value);
        Ok(value)
    }

    /// Expand a collection into per-image expressions
    fn expand(&self, collection: &ImageCollection) -> SarResult<Vec<Image>> {
        match collection.node() {
            CollectionNode::Images(images) => Ok(images.clone()),
            CollectionNode::Load(id) => Ok(self
                .catalog
                .collection(id)?
                .into_iter()
                .map(Image::from_shared)
                .collect()),
            CollectionNode::Map { input, func } => Ok(self.expand(input)?.into_iter().map(|image| func(image)).collect()),
        }
    }
}

/// Values computed during one evaluation, keyed by node identity
#[derive(Debug, Default)]
struct EvalCache {
    images: HashMap<usize, Vec<(Grid, Vec<Band>)>>,
    numbers: HashMap<usize, f64>,
    hits: usize,
}

impl EvalCache {
    fn image(&mut self, id: usize, grid: &Grid) -> Option<Vec<Band>> {
        let bands = self
            .images
            .get(&id)?
            .iter()
            .find(|(g, _)| g == grid)
            .map(|(_, bands)| bands.clone())?;
        self.hits += 1;
        Some(bands)
    }

    fn insert_image(&mut self, id: usize, grid: &Grid, bands: Vec<Band>) {
        self.images.entry(id).or_default().push((grid.clone(), bands));
    }

    fn number(&mut self, id: usize) -> Option<f64> {
        let value = self.numbers.get(&id).copied()?;
        self.hits += 1;
        Some(value)
    }

    fn insert_number(&mut self, id: usize, value: f64) {
        self.numbers.insert(id, value);
    }
}

fn select_band(bands: &[Band], selector: &BandSelector) -> SarResult<Band> {
    let found = match selector {
        BandSelector::Index(i) => bands.get(*i),
        BandSelector::Name(name) => bands.iter().find(|b| &b.name == name),
    };
    found.cloned().ok_or_else(|| {
        let names: Vec<&str> = bands.iter().map(|b| b.name.as_str()).collect();
        SarError::BandNotFound(format!("{} (have {:?})", selector, names))
    })
}

fn and_masks(a: &Array2<bool>, b: &Array2<bool>) -> Array2<bool> {
    Zip::from(a).and(b).map_collect(|&x, &y| x && y)
}

impl Backend for LocalBackend {
    fn evaluate(&self, image: &Image) -> SarResult<EvaluatedImage> {
        let grid = self
            .default_grid(image)?
            .ok_or_else(|| SarError::Projection("image has no default projection".to_string()))?;
        log::debug!("Evaluating image on {}x{} grid ({})", grid.width, grid.height, grid.crs);

        let mut cache = EvalCache::default();
        let bands = self.eval(image, &grid, &mut cache)?;
        log::debug!("Evaluation reused {} shared results", cache.hits);
        let properties = self.properties_of(image)?;
        Ok(EvaluatedImage {
            grid,
            bands,
            properties,
        })
    }

    fn evaluate_number(&self, number: &Number) -> SarResult<f64> {
        self.number(number, &mut EvalCache::default())
    }

    fn evaluate_collection(&self, collection: &ImageCollection) -> SarResult<Vec<EvaluatedImage>> {
        let images = self.expand(collection)?;
        log::info!("Evaluating collection of {} images", images.len());

        if self.params.enable_parallel {
            images.par_iter().map(|image| self.evaluate(image)).collect()
        } else {
            images.iter().map(|image| self.evaluate(image)).collect()
        }
    }
}
