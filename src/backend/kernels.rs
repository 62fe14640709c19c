//! Pixel kernels used by the local backend

use crate::backend::{Band, Grid};
use crate::graph::TerrainOp;
use crate::types::{Pixel, SarError, SarResult};
use ndarray::{Array2, Axis, Zip};
use rayon::prelude::*;

/// Slope or aspect (degrees) of an elevation band
///
/// Central differences in the interior, one-sided differences on the border.
/// Aspect is the downslope facing direction, 0 = north, clockwise; flat
/// pixels get 0. A pixel is masked when any sample of its 3x3 neighbourhood
/// is masked or not finite.
pub fn terrain(op: TerrainOp, elevation: &Band, grid: &Grid, parallel: bool) -> Band {
    let dem = &elevation.data;
    let (rows, cols) = dem.dim();
    let mut data = Array2::<Pixel>::from_elem((rows, cols), f64::NAN);
    let mut valid = Array2::<bool>::from_elem((rows, cols), false);

    // Spacing varies by row on geographic grids
    let spacing: Vec<(f64, f64)> = (0..rows).map(|i| grid.pixel_spacing_meters(i)).collect();

    let kernel = |(i, j): (usize, usize), v: &mut Pixel, ok: &mut bool| {
        if !stencil_valid(elevation, i, j) {
            return;
        }
        let (dx, dy) = spacing[i];
        let (gx, gy) = gradient_at(dem, i, j, dx, dy);
        *v = match op {
            TerrainOp::Slope => (gx * gx + gy * gy).sqrt().atan().to_degrees(),
            TerrainOp::Aspect if gx == 0.0 && gy == 0.0 => 0.0,
            TerrainOp::Aspect => ((-gx).atan2(-gy).to_degrees() + 360.0) % 360.0,
        };
        *ok = true;
    };

    let zip = Zip::indexed(&mut data).and(&mut valid);
    if parallel {
        zip.par_for_each(kernel);
    } else {
        zip.for_each(kernel);
    }

    Band::with_mask(op.band_name(), data, valid)
}

fn stencil_valid(elevation: &Band, i: usize, j: usize) -> bool {
    let (rows, cols) = elevation.data.dim();
    let (i0, i1) = (i.saturating_sub(1), (i + 1).min(rows - 1));
    let (j0, j1) = (j.saturating_sub(1), (j + 1).min(cols - 1));
    (i0..=i1).all(|r| (j0..=j1).all(|c| elevation.value(r, c).map_or(false, f64::is_finite)))
}

/// Elevation gradient (east, north) in meters per meter
fn gradient_at(dem: &Array2<Pixel>, i: usize, j: usize, dx: f64, dy: f64) -> (f64, f64) {
    let (rows, cols) = dem.dim();
    let (j0, j1) = (j.saturating_sub(1), (j + 1).min(cols - 1));
    let (i0, i1) = (i.saturating_sub(1), (i + 1).min(rows - 1));

    let gx = if j1 > j0 && dx > 0.0 {
        (dem[[i, j1]] - dem[[i, j0]]) / ((j1 - j0) as f64 * dx)
    } else {
        0.0
    };
    // Rows run southward
    let gy = if i1 > i0 && dy > 0.0 {
        (dem[[i0, j]] - dem[[i1, j]]) / ((i1 - i0) as f64 * dy)
    } else {
        0.0
    };
    (gx, gy)
}

/// Pixel area in square meters
pub fn pixel_area(grid: &Grid) -> Array2<Pixel> {
    let (rows, cols) = grid.shape();
    let mut area = Array2::<Pixel>::zeros((rows, cols));
    for (i, mut row) in area.axis_iter_mut(Axis(0)).enumerate() {
        let (dx, dy) = grid.pixel_spacing_meters(i);
        row.fill(dx * dy);
    }
    area
}

/// Squared Euclidean distance in pixels to the nearest feature pixel
///
/// Exact separable transform (lower envelope of parabolas), columns then rows.
/// Values are capped at `neighborhood²`; with no features at all every pixel
/// gets the cap.
pub fn squared_distance_transform(features: &Array2<bool>, neighborhood: u32, parallel: bool) -> Array2<Pixel> {
    let (rows, cols) = features.dim();
    // Larger than any real squared distance on this raster
    let far = (rows * rows + cols * cols) as f64 + 1.0;
    let cap = (neighborhood as f64).powi(2);

    let mut dist = features.mapv(|f| if f { 0.0 } else { far });

    for axis in [Axis(1), Axis(0)] {
        let transform_lane = |mut lane: ndarray::ArrayViewMut1<Pixel>| {
            let f: Vec<Pixel> = lane.to_vec();
            for (dst, v) in lane.iter_mut().zip(squared_distance_1d(&f)) {
                *dst = v;
            }
        };
        if parallel {
            dist.axis_iter_mut(axis).into_par_iter().for_each(transform_lane);
        } else {
            dist.axis_iter_mut(axis).for_each(transform_lane);
        }
    }

    dist.mapv_inplace(|v| if v >= far { cap } else { v.min(cap) });
    dist
}

fn squared_distance_1d(f: &[Pixel]) -> Vec<Pixel> {
    let n = f.len();
    let mut d = vec![0.0; n];
    if n == 0 {
        return d;
    }

    let mut v = vec![0usize; n];
    let mut z = vec![0.0f64; n + 1];
    let mut k = 0usize;
    z[0] = f64::NEG_INFINITY;
    z[1] = f64::INFINITY;

    let intersect = |q: usize, p: usize| {
        let (qf, pf) = (q as f64, p as f64);
        ((f[q] + qf * qf) - (f[p] + pf * pf)) / (2.0 * qf - 2.0 * pf)
    };

    for q in 1..n {
        let mut s = intersect(q, v[k]);
        while s <= z[k] {
            k -= 1;
            s = intersect(q, v[k]);
        }
        k += 1;
        v[k] = q;
        z[k] = s;
        z[k + 1] = f64::INFINITY;
    }

    k = 0;
    for (q, out) in d.iter_mut().enumerate() {
        while z[k + 1] < q as f64 {
            k += 1;
        }
        let offset = q as f64 - v[k] as f64;
        *out = offset * offset + f[v[k]];
    }
    d
}

/// Resample a band onto another grid of the same coordinate system
///
/// Bilinear over the valid neighbours; target pixels outside the source
/// footprint are masked.
pub fn resample_band(band: &Band, from: &Grid, to: &Grid, parallel: bool) -> SarResult<Band> {
    if from.matches(to) {
        return Ok(band.clone());
    }
    if from.crs != to.crs {
        return Err(SarError::Projection(format!(
            "cannot resample from {} to {}: reprojection is not supported",
            from.crs, to.crs
        )));
    }
    if from.transform.is_rotated() || to.transform.is_rotated() {
        return Err(SarError::Projection("rotated geo transforms are not supported".to_string()));
    }

    let (src_rows, src_cols) = band.data.dim();
    let mut data = Array2::<Pixel>::from_elem(to.shape(), f64::NAN);
    let mut valid = Array2::<bool>::from_elem(to.shape(), false);

    let kernel = |(i, j): (usize, usize), v: &mut Pixel, ok: &mut bool| {
        let (x, y) = to.transform.pixel_center(i as f64, j as f64);
        let (r, c) = from.transform.map_to_pixel(x, y);
        if r < -0.5 || c < -0.5 || r > src_rows as f64 - 0.5 || c > src_cols as f64 - 0.5 {
            return;
        }
        if let Some(value) = bilinear(band, r, c) {
            *v = value;
            *ok = true;
        }
    };

    let zip = Zip::indexed(&mut data).and(&mut valid);
    if parallel {
        zip.par_for_each(kernel);
    } else {
        zip.for_each(kernel);
    }

    Ok(Band::with_mask(band.name.clone(), data, valid))
}

fn bilinear(band: &Band, row: f64, col: f64) -> Option<Pixel> {
    let (rows, cols) = band.data.dim();
    if rows == 0 || cols == 0 {
        return None;
    }
    let r = row.clamp(0.0, (rows - 1) as f64);
    let c = col.clamp(0.0, (cols - 1) as f64);
    let (r0, c0) = (r.floor() as usize, c.floor() as usize);
    let (r1, c1) = ((r0 + 1).min(rows - 1), (c0 + 1).min(cols - 1));
    let (dr, dc) = (r - r0 as f64, c - c0 as f64);

    let corners = [
        (r0, c0, (1.0 - dr) * (1.0 - dc)),
        (r0, c1, (1.0 - dr) * dc),
        (r1, c0, dr * (1.0 - dc)),
        (r1, c1, dr * dc),
    ];

    let mut sum = 0.0;
    let mut weight = 0.0;
    for (ri, ci, w) in corners {
        if w <= 0.0 {
            continue;
        }
        if let Some(v) = band.value(ri, ci) {
            sum += w * v;
            weight += w;
        }
    }

    if weight > 0.0 {
        Some(sum / weight)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CoordinateSystem, GeoTransform};
    use approx::assert_relative_eq;

    fn utm_grid(rows: usize, cols: usize, spacing: f64) -> Grid {
        Grid::new(
            CoordinateSystem::Projected { epsg: 32633 },
            GeoTransform::north_up(500_000.0, 4_000_000.0, spacing, spacing),
            cols,
            rows,
        )
    }

    #[test]
    fn test_slope_of_tilted_plane() {
        // Rising 30 m per 30 m pixel toward the east: 45 degree slope facing west
        let grid = utm_grid(5, 5, 30.0);
        let dem = Band::new("elevation", Array2::from_shape_fn((5, 5), |(_, j)| j as f64 * 30.0));
        let slope = terrain(TerrainOp::Slope, &dem, &grid, false);
        let aspect = terrain(TerrainOp::Aspect, &dem, &grid, false);

        assert_eq!(slope.name, "slope");
        assert_eq!(slope.valid_count(), 25);
        for ((i, j), s) in slope.data.indexed_iter() {
            assert_relative_eq!(*s, 45.0, epsilon = 1e-9);
            assert_relative_eq!(aspect.data[[i, j]], 270.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_aspect_north_rising_faces_south() {
        let grid = utm_grid(4, 4, 10.0);
        // Row 0 is the northern edge, highest
        let dem = Band::new("elevation", Array2::from_shape_fn((4, 4), |(i, _)| (3 - i) as f64 * 10.0));
        let aspect = terrain(TerrainOp::Aspect, &dem, &grid, false);
        assert_relative_eq!(aspect.data[[1, 1]], 180.0, epsilon = 1e-9);
    }

    #[test]
    fn test_flat_terrain() {
        let grid = utm_grid(3, 3, 30.0);
        let dem = Band::filled("elevation", (3, 3), 120.0);
        let slope = terrain(TerrainOp::Slope, &dem, &grid, true);
        let aspect = terrain(TerrainOp::Aspect, &dem, &grid, true);
        assert!(slope.data.iter().all(|s| *s == 0.0));
        assert!(aspect.data.iter().all(|a| *a == 0.0));
    }

    #[test]
    fn test_void_masks_its_neighbourhood() {
        let grid = utm_grid(5, 5, 30.0);
        let mut data = Array2::from_elem((5, 5), 100.0);
        let mut valid = Array2::from_elem((5, 5), true);
        // SRTM style void: masked, raw fill value left in place
        data[[2, 2]] = -32768.0;
        valid[[2, 2]] = false;
        // Unmasked NaN counts as a void too
        data[[0, 4]] = f64::NAN;
        let dem = Band::with_mask("elevation", data, valid);

        for parallel in [false, true] {
            let slope = terrain(TerrainOp::Slope, &dem, &grid, parallel);
            for i in 1..=3 {
                for j in 1..=3 {
                    assert_eq!(slope.value(i, j), None, "({}, {})", i, j);
                }
            }
            assert_eq!(slope.value(0, 3), None);
            assert_eq!(slope.value(1, 4), None);
            assert_eq!(slope.value(0, 0), Some(0.0));
            assert_eq!(slope.value(4, 0), Some(0.0));
            assert_eq!(slope.value(4, 4), Some(0.0));
            // 3x3 around the void plus 4 pixels touching the NaN corner
            assert_eq!(slope.valid_count(), 25 - 9 - 3);
        }
    }

    #[test]
    fn test_distance_transform_matches_brute_force() {
        let features = Array2::from_shape_fn((9, 11), |(i, j)| (i == 2 && j == 3) || (i == 7 && j == 9));
        let dist = squared_distance_transform(&features, 30, false);

        for ((i, j), d) in dist.indexed_iter() {
            let brute = [(2i64, 3i64), (7, 9)]
                .iter()
                .map(|(fi, fj)| ((i as i64 - fi).pow(2) + (j as i64 - fj).pow(2)) as f64)
                .fold(f64::INFINITY, f64::min);
            assert_relative_eq!(*d, brute);
        }
    }

    #[test]
    fn test_distance_transform_cap() {
        let none = Array2::from_elem((4, 4), false);
        let dist = squared_distance_transform(&none, 5, true);
        assert!(dist.iter().all(|d| *d == 25.0));

        let mut one = Array2::from_elem((1, 40), false);
        one[[0, 0]] = true;
        let dist = squared_distance_transform(&one, 3, false);
        assert_eq!(dist[[0, 2]], 4.0);
        assert_eq!(dist[[0, 39]], 9.0);
    }

    #[test]
    fn test_pixel_area() {
        let area = pixel_area(&utm_grid(2, 3, 30.0));
        assert!(area.iter().all(|a| *a == 900.0));
    }

    #[test]
    fn test_resample_to_finer_grid() {
        let coarse = utm_grid(2, 2, 60.0);
        let fine = utm_grid(4, 4, 30.0);
        let band = Band::new("elevation", Array2::from_shape_vec((2, 2), vec![0.0, 60.0, 0.0, 60.0]).unwrap());

        let out = resample_band(&band, &coarse, &fine, false).unwrap();
        assert_eq!(out.data.dim(), (4, 4));
        assert_eq!(out.valid_count(), 16);
        // Values are monotone west to east and bounded by the source range
        for i in 0..4 {
            for j in 1..4 {
                assert!(out.data[[i, j]] >= out.data[[i, j - 1]]);
            }
        }
        assert!(out.data.iter().all(|v| (0.0..=60.0).contains(v)));
    }

    #[test]
    fn test_resample_rejects_other_crs() {
        let a = utm_grid(2, 2, 30.0);
        let mut b = a.clone();
        b.crs = CoordinateSystem::Geographic;
        let band = Band::filled("x", (2, 2), 1.0);
        assert!(matches!(resample_band(&band, &a, &b, false), Err(SarError::Projection(_))));
    }
}
