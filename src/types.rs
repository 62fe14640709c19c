use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Pixel value type used by every evaluated raster
pub type Pixel = f64;

/// Meters per degree of longitude at the equator (WGS84)
pub const METERS_PER_DEGREE: f64 = 111_319.490_793_273_6;

/// Coordinate system enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinateSystem {
    /// Geographic coordinates (longitude, latitude in degrees, EPSG:4326)
    Geographic,
    /// Projected coordinates in meters (e.g., UTM)
    Projected { epsg: u32 },
}

impl CoordinateSystem {
    /// Build from an EPSG code
    pub fn from_epsg(epsg: u32) -> Self {
        if epsg == 4326 {
            CoordinateSystem::Geographic
        } else {
            CoordinateSystem::Projected { epsg }
        }
    }

    pub fn epsg(&self) -> u32 {
        match self {
            CoordinateSystem::Geographic => 4326,
            CoordinateSystem::Projected { epsg } => *epsg,
        }
    }
}

impl std::fmt::Display for CoordinateSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

/// Geospatial bounding box in the units of its coordinate system
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_lon && x <= self.max_lon && y >= self.min_lat && y <= self.max_lat
    }

    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lon + self.max_lon) / 2.0,
            (self.min_lat + self.max_lat) / 2.0,
        )
    }
}

/// Geospatial transformation parameters (GDAL ordering)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// North-up transform without rotation
    pub fn north_up(top_left_x: f64, top_left_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            top_left_x,
            pixel_width,
            rotation_x: 0.0,
            top_left_y,
            rotation_y: 0.0,
            pixel_height: -pixel_height.abs(),
        }
    }

    pub fn from_gdal(gt: [f64; 6]) -> Self {
        Self {
            top_left_x: gt[0],
            pixel_width: gt[1],
            rotation_x: gt[2],
            top_left_y: gt[3],
            rotation_y: gt[4],
            pixel_height: gt[5],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.top_left_x,
            self.pixel_width,
            self.rotation_x,
            self.top_left_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }

    /// Map coordinates of the centre of pixel (row, col)
    pub fn pixel_center(&self, row: f64, col: f64) -> (f64, f64) {
        let x = self.top_left_x + (col + 0.5) * self.pixel_width + (row + 0.5) * self.rotation_x;
        let y = self.top_left_y + (col + 0.5) * self.rotation_y + (row + 0.5) * self.pixel_height;
        (x, y)
    }

    /// Fractional (row, col) of a map coordinate, pixel centres at integers.
    /// Rotated transforms are not supported.
    pub fn map_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let col = (x - self.top_left_x) / self.pixel_width - 0.5;
        let row = (y - self.top_left_y) / self.pixel_height - 0.5;
        (row, col)
    }

    pub fn is_rotated(&self) -> bool {
        self.rotation_x != 0.0 || self.rotation_y != 0.0
    }
}

/// Image property value, copied through the correction unchanged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Number(f64),
    Text(String),
    Time(DateTime<Utc>),
}

impl std::fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropertyValue::Number(v) => write!(f, "{}", v),
            PropertyValue::Text(s) => write!(f, "{}", s),
            PropertyValue::Time(t) => write!(f, "{}", t.to_rfc3339()),
        }
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Number(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::Text(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::Text(s)
    }
}

impl From<DateTime<Utc>> for PropertyValue {
    fn from(t: DateTime<Utc>) -> Self {
        PropertyValue::Time(t)
    }
}

/// Image properties keyed by name
pub type Properties = BTreeMap<String, PropertyValue>;

/// Error types for SAR processing
#[derive(Debug, thiserror::Error)]
pub enum SarError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Band not found: {0}")]
    BandNotFound(String),

    #[error("Band mismatch: {0}")]
    BandMismatch(String),

    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    #[error("Projection error: {0}")]
    Projection(String),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),
}

/// Result type for SAR operations
pub type SarResult<T> = Result<T, SarError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_center_roundtrip() {
        let gt = GeoTransform::north_up(10.0, 50.0, 0.001, 0.001);
        let (x, y) = gt.pixel_center(3.0, 7.0);
        let (row, col) = gt.map_to_pixel(x, y);
        assert!((row - 3.0).abs() < 1e-9);
        assert!((col - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_coordinate_system_epsg() {
        assert_eq!(CoordinateSystem::from_epsg(4326), CoordinateSystem::Geographic);
        assert_eq!(CoordinateSystem::from_epsg(32633).epsg(), 32633);
        assert_eq!(format!("{}", CoordinateSystem::Geographic), "EPSG:4326");
    }
}
