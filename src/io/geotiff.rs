use crate::backend::{Band, EvaluatedImage, Grid};
use crate::types::{CoordinateSystem, GeoTransform, Properties, PropertyValue, SarError, SarResult};
use chrono::{DateTime, Utc};
use gdal::raster::Buffer;
use gdal::spatial_ref::SpatialRef;
use gdal::{Dataset, DriverManager, Metadata};
use ndarray::{Array2, Zip};
use std::path::Path;

/// Property holding the scene identifier
pub const INDEX_PROPERTY: &str = "system:index";

/// Read a multi-band scene (e.g. `VV`, `VH`, `angle`) from a GDAL raster
///
/// Band names come from the band descriptions, falling back to `B1..Bn`.
/// No-data and NaN pixels are masked. Dataset metadata becomes image
/// properties.
pub fn read_scene<P: AsRef<Path>>(path: P) -> SarResult<EvaluatedImage> {
    let path = path.as_ref();
    log::info!("Reading scene from: {}", path.display());

    let mut image = read_raster(path)?;
    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
        image
            .properties
            .entry(INDEX_PROPERTY.to_string())
            .or_insert_with(|| PropertyValue::Text(stem.to_string()));
    }
    log::debug!("Scene bands: {:?}", image.band_names());
    Ok(image)
}

/// Read every band of a raster as `f64`
pub(crate) fn read_raster(path: &Path) -> SarResult<EvaluatedImage> {
    let dataset = Dataset::open(path)?;
    let (width, height) = dataset.raster_size();
    let transform = GeoTransform::from_gdal(dataset.geo_transform()?);
    let crs = coordinate_system(&dataset, path);

    log::debug!("Raster size: {}x{}, {}", width, height, crs);

    let mut bands = Vec::new();
    for index in 1..=dataset.raster_count() {
        let band = dataset.rasterband(index)?;
        let buffer = band.read_as::<f64>((0, 0), (width, height), (width, height), None)?;
        let data = Array2::from_shape_vec((height, width), buffer.data)
            .map_err(|e| SarError::Processing(format!("Failed to reshape band {}: {}", index, e)))?;

        let no_data = band.no_data_value();
        let valid = data.mapv(|v| !v.is_nan() && no_data.map_or(true, |nd| v != nd));

        let name = match band.description() {
            Ok(desc) if !desc.trim().is_empty() => desc.trim().to_string(),
            _ => format!("B{}", index),
        };
        bands.push(Band::with_mask(name, data, valid));
    }

    let image = EvaluatedImage {
        grid: Grid::new(crs, transform, width, height),
        bands,
        properties: read_properties(&dataset),
    };
    image.validate()?;
    Ok(image)
}

fn coordinate_system(dataset: &Dataset, path: &Path) -> CoordinateSystem {
    match dataset.spatial_ref().and_then(|srs| srs.auth_code()) {
        Ok(code) if code > 0 => CoordinateSystem::from_epsg(code as u32),
        _ => {
            log::warn!(
                "No EPSG code for {}, assuming geographic coordinates",
                path.display()
            );
            CoordinateSystem::Geographic
        }
    }
}

fn read_properties(dataset: &Dataset) -> Properties {
    let mut properties = Properties::new();
    for item in dataset.metadata_domain("").unwrap_or_default() {
        if let Some((key, value)) = item.split_once('=') {
            properties.insert(key.to_string(), parse_property(value));
        }
    }
    properties
}

/// Numbers and RFC 3339 times keep their type, anything else is text
fn parse_property(value: &str) -> PropertyValue {
    if let Ok(v) = value.parse::<f64>() {
        return PropertyValue::Number(v);
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(value) {
        return PropertyValue::Time(t.with_timezone(&Utc));
    }
    PropertyValue::Text(value.to_string())
}

/// Write an evaluated image to GeoTIFF
///
/// Bands are `Float64` with their names as descriptions. Masked pixels are
/// written as NaN, which is also each band's no-data value. Properties are stored as dataset metadata.
pub fn write_image<P: AsRef<Path>>(path: P, image: &EvaluatedImage) -> SarResult<()> {
    let path = path.as_ref();
    image.validate()?;
    log::info!("Writing {:?} to: {}", image.band_names(), path.display());

    let (height, width) = image.grid.shape();
    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let mut dataset =
        driver.create_with_band_type::<f64, _>(path, width as _, height as _, image.bands.len() as _)?;

    dataset.set_geo_transform(&image.grid.transform.to_gdal())?;
    let srs = SpatialRef::from_epsg(image.grid.crs.epsg())?;
    dataset.set_spatial_ref(&srs)?;

    for (key, value) in &image.properties {
        dataset.set_metadata_item(key, &value.to_string(), "")?;
    }

    for (i, band) in image.bands.iter().enumerate() {
        let data: Vec<f64> = Zip::from(&band.data)
            .and(&band.valid)
            .map_collect(|&v, &ok| if ok { v } else { f64::NAN })
            .into_raw_vec();

        let mut raster_band = dataset.rasterband((i + 1) as _)?;
        raster_band.set_description(&band.name)?;
        raster_band.set_no_data_value(Some(f64::NAN))?;
        raster_band.write((0, 0), (width, height), &Buffer { size: (width, height), data })?;
    }

    Ok(())
}
