//! Python bindings

use crate::backend::{Backend, Band, Catalog, EvaluatedImage, Grid, LocalBackend, LocalBackendParams};
use crate::core::{correct_scene_files, MaskCombination, ScatteringModel, SlopeCorrection, SlopeCorrectionParams};
use crate::graph::{Image, ImageCollection};
use crate::types::{CoordinateSystem, GeoTransform};
use ndarray::{Array2, Zip};
use numpy::{IntoPyArray, PyReadonlyArray2};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

/// Convert PyReadonlyArray2 to ndarray Array2
fn numpy_to_array2(arr: PyReadonlyArray2<'_, f64>) -> Array2<f64> {
    arr.as_array().to_owned()
}

/// NaN marks no-data on the Python side
fn band_from_numpy(name: &str, arr: PyReadonlyArray2<'_, f64>) -> Band {
    let data = numpy_to_array2(arr);
    let valid = data.mapv(|v| !v.is_nan());
    Band::with_mask(name, data, valid)
}

fn band_to_nan_filled(band: &Band) -> Array2<f64> {
    Zip::from(&band.data)
        .and(&band.valid)
        .map_collect(|&v, &ok| if ok { v } else { f64::NAN })
}

/// Python wrapper for SlopeCorrection
#[pyclass(name = "SlopeCorrection")]
struct PySlopeCorrection {
    params: SlopeCorrectionParams,
}

#[pymethods]
impl PySlopeCorrection {
    #[new]
    #[pyo3(signature = (model = "volume", buffer = 10.0, mask_combination = "and"))]
    fn new(model: &str, buffer: f64, mask_combination: &str) -> PyResult<Self> {
        let model: ScatteringModel = model
            .parse()
            .map_err(|e| PyValueError::new_err(format!("{}", e)))?;
        let mask_combination: MaskCombination = mask_combination
            .parse()
            .map_err(|e| PyValueError::new_err(format!("{}", e)))?;

        Ok(PySlopeCorrection {
            params: SlopeCorrectionParams {
                model,
                buffer,
                mask_combination,
                ..SlopeCorrectionParams::default()
            },
        })
    }

    #[getter]
    fn model(&self) -> String {
        self.params.model.to_string()
    }

    #[getter]
    fn buffer(&self) -> f64 {
        self.params.buffer
    }

    /// Correct GeoTIFF scenes, returns the written file paths
    fn correct_files(&self, scenes: Vec<String>, dem_path: String, output_dir: String) -> PyResult<Vec<String>> {
        let written = correct_scene_files(
            &scenes,
            &dem_path,
            &output_dir,
            self.params.clone(),
            LocalBackendParams::default(),
        )
        .map_err(|e| PyRuntimeError::new_err(format!("Slope correction failed: {}", e)))?;

        Ok(written.iter().map(|p| p.to_string_lossy().to_string()).collect())
    }

    /// Correct in-memory arrays sharing one grid
    ///
    /// `geo_transform` uses GDAL ordering. NaN marks no-data in and out.
    #[allow(clippy::too_many_arguments)]
    fn correct_arrays<'py>(
        &self,
        py: Python<'py>,
        vv: PyReadonlyArray2<'py, f64>,
        vh: PyReadonlyArray2<'py, f64>,
        angle: PyReadonlyArray2<'py, f64>,
        dem: PyReadonlyArray2<'py, f64>,
        geo_transform: Vec<f64>,
        epsg: u32,
    ) -> PyResult<PyObject> {
        if geo_transform.len() != 6 {
            return Err(PyValueError::new_err("geo_transform must have 6 elements"));
        }
        let gt = [
            geo_transform[0],
            geo_transform[1],
            geo_transform[2],
            geo_transform[3],
            geo_transform[4],
            geo_transform[5],
        ];

        let bands = vec![
            band_from_numpy("VV", vv),
            band_from_numpy("VH", vh),
            band_from_numpy("angle", angle),
        ];
        let (height, width) = bands[0].data.dim();
        let grid = Grid::new(CoordinateSystem::from_epsg(epsg), GeoTransform::from_gdal(gt), width, height);

        let mut catalog = Catalog::new();
        catalog.insert_image(
            self.params.elevation_asset.clone(),
            EvaluatedImage::new(grid.clone(), vec![band_from_numpy("elevation", dem)]),
        );
        let scene = EvaluatedImage::new(grid, bands);

        let correction = SlopeCorrection::with_params(
            ImageCollection::from_images(vec![Image::from_raster(scene)]),
            self.params.clone(),
        );
        let backend = LocalBackend::new(catalog);
        let corrected = backend
            .evaluate_collection(&correction.main())
            .map_err(|e| PyRuntimeError::new_err(format!("Slope correction failed: {}", e)))?;

        let result = PyDict::new(py);
        for image in &corrected {
            for band in &image.bands {
                result.set_item(band.name.as_str(), band_to_nan_filled(band).into_pyarray(py))?;
            }
        }
        result.set_item("rows", height)?;
        result.set_item("cols", width)?;

        Ok(result.into())
    }

    fn __repr__(&self) -> String {
        format!(
            "SlopeCorrection(model='{}', buffer={}, mask_combination={:?})",
            self.params.model, self.params.buffer, self.params.mask_combination
        )
    }
}

/// Volume model correction factor, angles in degrees
#[pyfunction]
fn volume_factor(theta_i: f64, alpha_r: f64) -> f64 {
    crate::core::volume_factor(theta_i.to_radians(), alpha_r.to_radians())
}

/// Surface model correction factor, angles in degrees
#[pyfunction]
fn surface_factor(theta_i: f64, alpha_r: f64, alpha_az: f64) -> f64 {
    crate::core::surface_factor(theta_i.to_radians(), alpha_r.to_radians(), alpha_az.to_radians())
}

/// Python module definition
#[pymodule]
fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<PySlopeCorrection>()?;
    m.add_function(wrap_pyfunction!(volume_factor, m)?)?;
    m.add_function(wrap_pyfunction!(surface_factor, m)?)?;
    Ok(())
}
