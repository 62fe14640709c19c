use crate::types::{
    BoundingBox, CoordinateSystem, GeoTransform, Pixel, Properties, PropertyValue, SarError,
    SarResult, METERS_PER_DEGREE,
};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Pixel grid: coordinate system, transform and size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    pub crs: CoordinateSystem,
    pub transform: GeoTransform,
    pub width: usize,
    pub height: usize,
}

impl Grid {
    pub fn new(crs: CoordinateSystem, transform: GeoTransform, width: usize, height: usize) -> Self {
        Self {
            crs,
            transform,
            width,
            height,
        }
    }

    /// Array shape (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// Outer bounds of the grid in map units
    pub fn bounds(&self) -> BoundingBox {
        let t = &self.transform;
        let x0 = t.top_left_x;
        let x1 = t.top_left_x + self.width as f64 * t.pixel_width;
        let y0 = t.top_left_y;
        let y1 = t.top_left_y + self.height as f64 * t.pixel_height;
        BoundingBox {
            min_lon: x0.min(x1),
            max_lon: x0.max(x1),
            min_lat: y0.min(y1),
            max_lat: y0.max(y1),
        }
    }

    /// Pixel spacing in meters (x, y) along a row
    ///
    /// Geographic grids use a spherical approximation at the row's latitude.
    pub fn pixel_spacing_meters(&self, row: usize) -> (f64, f64) {
        let t = &self.transform;
        match self.crs {
            CoordinateSystem::Geographic => {
                let (_, lat) = t.pixel_center(row as f64, self.width as f64 / 2.0);
                let dx = t.pixel_width.abs() * METERS_PER_DEGREE * lat.to_radians().cos();
                let dy = t.pixel_height.abs() * METERS_PER_DEGREE;
                (dx, dy)
            }
            CoordinateSystem::Projected { .. } => (t.pixel_width.abs(), t.pixel_height.abs()),
        }
    }

    /// Grid covering `bbox` with pixels of roughly `scale` meters, at least 3x3
    pub fn covering(crs: CoordinateSystem, bbox: &BoundingBox, scale: f64) -> Self {
        let (step_x, step_y) = match crs {
            CoordinateSystem::Geographic => {
                let (_, lat) = bbox.center();
                let cos_lat = lat.to_radians().cos().max(1e-6);
                (scale / (METERS_PER_DEGREE * cos_lat), scale / METERS_PER_DEGREE)
            }
            CoordinateSystem::Projected { .. } => (scale, scale),
        };

        let width = ((bbox.width() / step_x).ceil() as usize).max(3);
        let height = ((bbox.height() / step_y).ceil() as usize).max(3);
        let pixel_width = if bbox.width() > 0.0 { bbox.width() / width as f64 } else { step_x };
        let pixel_height = if bbox.height() > 0.0 { bbox.height() / height as f64 } else { step_y };

        Self::new(
            crs,
            GeoTransform::north_up(bbox.min_lon, bbox.max_lat, pixel_width, pixel_height),
            width,
            height,
        )
    }

    /// Same coordinate system, size and (within rounding) transform
    pub fn matches(&self, other: &Grid) -> bool {
        let close = |a: f64, b: f64| (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0);
        let (a, b) = (self.transform.to_gdal(), other.transform.to_gdal());
        self.crs == other.crs
            && self.width == other.width
            && self.height == other.height
            && a.iter().zip(b.iter()).all(|(x, y)| close(*x, *y))
    }
}

/// Named band with a validity mask
#[derive(Debug, Clone)]
pub struct Band {
    pub name: String,
    pub data: Array2<Pixel>,
    /// `true` where the pixel holds data
    pub valid: Array2<bool>,
}

impl Band {
    /// Band with every pixel valid
    pub fn new(name: impl Into<String>, data: Array2<Pixel>) -> Self {
        let valid = Array2::from_elem(data.dim(), true);
        Self {
            name: name.into(),
            data,
            valid,
        }
    }

    pub fn with_mask(name: impl Into<String>, data: Array2<Pixel>, valid: Array2<bool>) -> Self {
        Self {
            name: name.into(),
            data,
            valid,
        }
    }

    pub fn filled(name: impl Into<String>, shape: (usize, usize), value: Pixel) -> Self {
        Self::new(name, Array2::from_elem(shape, value))
    }

    /// Pixel value, `None` when masked
    pub fn value(&self, row: usize, col: usize) -> Option<Pixel> {
        match self.valid.get((row, col)) {
            Some(true) => self.data.get((row, col)).copied(),
            _ => None,
        }
    }

    pub fn valid_count(&self) -> usize {
        self.valid.iter().filter(|v| **v).count()
    }
}

/// Materialized image: grid, bands and properties
#[derive(Debug, Clone)]
pub struct EvaluatedImage {
    pub grid: Grid,
    pub bands: Vec<Band>,
    pub properties: Properties,
}

impl EvaluatedImage {
    pub fn new(grid: Grid, bands: Vec<Band>) -> Self {
        Self {
            grid,
            bands,
            properties: Properties::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn band(&self, name: &str) -> SarResult<&Band> {
        self.bands
            .iter()
            .find(|b| b.name == name)
            .ok_or_else(|| SarError::BandNotFound(format!("'{}' (have {:?})", name, self.band_names())))
    }

    pub fn band_names(&self) -> Vec<&str> {
        self.bands.iter().map(|b| b.name.as_str()).collect()
    }

    /// Check every band has the grid's shape
    pub fn validate(&self) -> SarResult<()> {
        let shape = self.grid.shape();
        for band in &self.bands {
            if band.data.dim() != shape || band.valid.dim() != shape {
                return Err(SarError::InvalidFormat(format!(
                    "band '{}' has shape {:?}, grid is {:?}",
                    band.name,
                    band.data.dim(),
                    shape
                )));
            }
        }
        Ok(())
    }
}
