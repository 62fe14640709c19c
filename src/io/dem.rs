use crate::backend::EvaluatedImage;
use crate::io::geotiff::read_raster;
use crate::types::{SarError, SarResult};
use std::path::Path;

/// Name given to the elevation band
pub const ELEVATION_BAND: &str = "elevation";

/// Digital Elevation Model reader
pub struct DemReader;

impl DemReader {
    /// Read the first band of a DEM raster as `elevation`
    pub fn read_dem<P: AsRef<Path>>(dem_path: P) -> SarResult<EvaluatedImage> {
        let dem_path = dem_path.as_ref();
        log::info!("Reading DEM from: {}", dem_path.display());

        let mut dem = read_raster(dem_path)?;
        if dem.bands.is_empty() {
            return Err(SarError::InvalidFormat(format!(
                "DEM {} has no raster bands",
                dem_path.display()
            )));
        }
        if dem.bands.len() > 1 {
            log::warn!("DEM has {} bands, using the first", dem.bands.len());
            dem.bands.truncate(1);
        }
        dem.bands[0].name = ELEVATION_BAND.to_string();

        let valid = dem.bands[0].valid_count();
        log::debug!(
            "DEM size: {}x{}, {} valid pixels",
            dem.grid.width,
            dem.grid.height,
            valid
        );
        if valid == 0 {
            return Err(SarError::InvalidFormat("DEM contains no valid elevation".to_string()));
        }

        Ok(dem)
    }
}
