use approx::assert_relative_eq;
use ndarray::Array2;
use std::path::Path;
use terraslope::backend::{Band, EvaluatedImage, Grid, LocalBackendParams};
use terraslope::core::{correct_scene_files, SlopeCorrectionParams};
use terraslope::io::{read_scene, write_image, DemReader};
use terraslope::types::{CoordinateSystem, GeoTransform, PropertyValue, SarError};
use tempfile::TempDir;

const SIZE: usize = 16;

fn grid() -> Grid {
    Grid::new(
        CoordinateSystem::Projected { epsg: 32633 },
        GeoTransform::north_up(400_000.0, 5_000_000.0, 20.0, 20.0),
        SIZE,
        SIZE,
    )
}

fn write_scene(dir: &Path, name: &str, vv: f64) -> std::path::PathBuf {
    let shape = (SIZE, SIZE);
    let mut vh = Array2::from_elem(shape, vv - 6.0);
    vh[[0, 0]] = f64::NAN;
    let scene = EvaluatedImage::new(
        grid(),
        vec![
            Band::filled("VV", shape, vv),
            Band::new("VH", vh),
            Band::new("angle", Array2::from_shape_fn(shape, |(_, j)| 30.0 + 0.02 * j as f64)),
        ],
    )
    .with_property("orbitProperties_pass", "ASCENDING")
    .with_property("relativeOrbitNumber_start", 44.0);

    let path = dir.join(format!("{}.tif", name));
    write_image(&path, &scene).expect("Failed to write scene");
    path
}

fn write_dem(dir: &Path) -> std::path::PathBuf {
    let dem = EvaluatedImage::new(grid(), vec![Band::filled("height", (SIZE, SIZE), 812.0)]);
    let path = dir.join("dem.tif");
    write_image(&path, &dem).expect("Failed to write DEM");
    path
}

#[test]
fn test_scene_round_trip() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = TempDir::new().unwrap();
    let path = write_scene(dir.path(), "scene", -12.0);

    let scene = read_scene(&path).expect("Failed to read scene");
    assert_eq!(scene.band_names(), vec!["VV", "VH", "angle"]);
    assert!(scene.grid.matches(&grid()));

    // NaN comes back as a masked pixel
    let vh = scene.band("VH").unwrap();
    assert!(vh.value(0, 0).is_none());
    assert_eq!(vh.valid_count(), SIZE * SIZE - 1);

    assert_eq!(
        scene.properties.get("orbitProperties_pass"),
        Some(&PropertyValue::Text("ASCENDING".to_string()))
    );
    assert_eq!(
        scene.properties.get("relativeOrbitNumber_start"),
        Some(&PropertyValue::Number(44.0))
    );
    // GIS tools see the mask through the no-data value
    let dataset = gdal::Dataset::open(&path).unwrap();
    let no_data = dataset.rasterband(2).unwrap().no_data_value();
    assert!(no_data.map_or(false, f64::is_nan));

    // Scene id falls back to the file stem
    assert_eq!(
        scene.properties.get("system:index"),
        Some(&PropertyValue::Text("scene".to_string()))
    );
}

#[test]
fn test_dem_reader_names_elevation_band() {
    let dir = TempDir::new().unwrap();
    let dem = DemReader::read_dem(write_dem(dir.path())).expect("Failed to read DEM");
    assert_eq!(dem.band_names(), vec!["elevation"]);
    assert_relative_eq!(dem.bands[0].data[[3, 3]], 812.0);
}

#[test]
fn test_correct_scene_files() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = TempDir::new().unwrap();
    let scenes = vec![
        write_scene(dir.path(), "S1A_first", -12.0),
        write_scene(dir.path(), "S1A_second", -8.0),
    ];
    let dem = write_dem(dir.path());
    let output_dir = dir.path().join("out");

    let written = correct_scene_files(
        &scenes,
        &dem,
        &output_dir,
        SlopeCorrectionParams::default(),
        LocalBackendParams::default(),
    )
    .expect("Slope correction failed");

    assert_eq!(
        written,
        vec![
            output_dir.join("S1A_first_corrected.tif"),
            output_dir.join("S1A_second_corrected.tif"),
        ]
    );

    let first = read_scene(&written[0]).unwrap();
    assert_eq!(first.band_names(), vec!["VV", "VH", "no_data_mask"]);
    assert_eq!(
        first.properties.get("system:index"),
        Some(&PropertyValue::Text("S1A_first".to_string()))
    );

    let expected = -12.0 - 10.0 * (30.0 + 0.02 * 4.0f64).to_radians().cos().log10();
    assert_relative_eq!(first.band("VV").unwrap().data[[2, 4]], expected, epsilon = 1e-9);
    assert!(first.band("VH").unwrap().value(0, 0).is_none());
    assert_eq!(first.band("no_data_mask").unwrap().valid_count(), SIZE * SIZE);

    let second = read_scene(&written[1]).unwrap();
    assert!(second.band("VV").unwrap().data[[2, 4]] > expected);
}

#[test]
fn test_missing_dem_file() {
    let dir = TempDir::new().unwrap();
    let scenes = vec![write_scene(dir.path(), "scene", -12.0)];

    let result = correct_scene_files(
        &scenes,
        dir.path().join("missing.tif"),
        dir.path(),
        SlopeCorrectionParams::default(),
        LocalBackendParams::default(),
    );
    assert!(matches!(result, Err(SarError::Gdal(_))));
}

#[test]
fn test_same_stem_scenes_do_not_overwrite() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("a")).unwrap();
    std::fs::create_dir_all(dir.path().join("b")).unwrap();
    let scenes = vec![
        write_scene(&dir.path().join("a"), "S1", -12.0),
        write_scene(&dir.path().join("b"), "S1", -8.0),
    ];
    let dem = write_dem(dir.path());
    let output_dir = dir.path().join("out");

    let result = correct_scene_files(
        &scenes,
        &dem,
        &output_dir,
        SlopeCorrectionParams::default(),
        LocalBackendParams::default(),
    );
    assert!(matches!(result, Err(SarError::Config(_))));
    assert!(!output_dir.join("S1_corrected.tif").exists());
}
