use crate::backend::{Backend, Catalog, LocalBackend, LocalBackendParams};
use crate::core::slope_correction::{SlopeCorrection, SlopeCorrectionParams};
use crate::graph::{Image, ImageCollection};
use crate::io::{read_scene, write_image, DemReader};
use crate::types::{SarError, SarResult};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Slope-correct GeoTIFF scenes against a DEM file
///
/// Each scene needs `VV`, `VH` and `angle` bands. Writes
/// `<stem>_corrected.tif` per scene into `output_dir` and returns the paths,
/// in input order. Scenes sharing a file stem are rejected with
/// `SarError::Config` before anything is read.
pub fn correct_scene_files<P: AsRef<Path>>(
    scenes: &[P],
    dem_path: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    params: SlopeCorrectionParams,
    backend_params: LocalBackendParams,
) -> SarResult<Vec<PathBuf>> {
    let output_dir = output_dir.as_ref();
    let outputs = output_paths(scenes, output_dir)?;
    log::info!(
        "Starting slope correction of {} scenes (model={}, buffer={} m)",
        scenes.len(),
        params.model,
        params.buffer
    );

    let mut catalog = Catalog::new();
    catalog.insert_image(params.elevation_asset.clone(), DemReader::read_dem(dem_path)?);

    let images = scenes
        .iter()
        .map(|path| read_scene(path).map(Image::from_raster))
        .collect::<SarResult<Vec<_>>>()?;

    let correction = SlopeCorrection::with_params(ImageCollection::from_images(images), params);
    let backend = LocalBackend::with_params(catalog, backend_params);
    let corrected = backend.evaluate_collection(&correction.main())?;

    std::fs::create_dir_all(output_dir)?;

    for (output_path, image) in outputs.iter().zip(&corrected) {
        write_image(output_path, image)?;
    }

    log::info!("Slope correction completed, wrote {} files", outputs.len());
    Ok(outputs)
}

/// `<stem>_corrected.tif` per scene, rejecting scenes that would overwrite
/// each other
fn output_paths<P: AsRef<Path>>(scenes: &[P], output_dir: &Path) -> SarResult<Vec<PathBuf>> {
    let mut seen = HashSet::new();
    scenes
        .iter()
        .enumerate()
        .map(|(index, scene)| {
            let scene = scene.as_ref();
            let stem = match scene.file_stem().and_then(|s| s.to_str()) {
                Some(stem) => stem.to_string(),
                None => format!("scene_{}", index),
            };
            let path = output_dir.join(format!("{}_corrected.tif", stem));
            if !seen.insert(path.clone()) {
                return Err(SarError::Config(format!(
                    "scene {} would overwrite {} written for an earlier scene",
                    scene.display(),
                    path.display()
                )));
            }
            Ok(path)
        })
        .collect()
}
