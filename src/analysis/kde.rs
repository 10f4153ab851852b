//! Two dimensional kernel density maps built from uncertain points.

use ndarray::Array2;

use crate::error::{NumericError, check_lengths};

/// Grid resolution used for the plotted KDE maps.
pub const PLOT_GRID: usize = 100;

/// Plot extent: `[x_min, x_max, y_min, y_max]`.
pub type Extent = [f64; 4];

/// Density of the points `(x ± sx, y ± sy)` evaluated on a `gd × gd` grid
/// spanning `ext`.
///
/// Every point contributes a bivariate Gaussian whose widths are its own
/// uncertainties, floored at the grid spacing so exact values still show
/// up. Row 0 holds `y_max` and column 0 holds `x_min`, the orientation an
/// image is drawn in. The map sums to one.
pub fn kde_2d(
    x: &[f64],
    sx: &[f64],
    y: &[f64],
    sy: &[f64],
    ext: Extent,
    gd: usize,
) -> Result<Array2<f64>, NumericError> {
    let n = x.len();
    if n == 0 {
        return Err(NumericError::EmptySample);
    }
    check_lengths(n, &[sx, y, sy])?;
    if gd < 2 {
        return Err(NumericError::TooFewPoints { needed: 2, found: gd });
    }
    let [x_min, x_max, y_min, y_max] = ext;
    if !(x_max > x_min && y_max > y_min) {
        return Err(NumericError::InvalidInput(format!("empty extent {ext:?}")));
    }

    let dx = (x_max - x_min) / (gd - 1) as f64;
    let dy = (y_max - y_min) / (gd - 1) as f64;
    let xs: Vec<f64> = (0..gd).map(|j| x_min + dx * j as f64).collect();
    let ys: Vec<f64> = (0..gd).map(|i| y_max - dy * i as f64).collect();

    let mut z = Array2::<f64>::zeros((gd, gd));
    let mut kx = vec![0.0; gd];
    let mut ky = vec![0.0; gd];
    for k in 0..n {
        let bx = sx[k].abs().max(dx);
        let by = sy[k].abs().max(dy);
        for (j, &gx) in xs.iter().enumerate() {
            kx[j] = gaussian(gx, x[k], bx);
        }
        for (i, &gy) in ys.iter().enumerate() {
            ky[i] = gaussian(gy, y[k], by);
        }
        for ((i, j), cell) in z.indexed_iter_mut() {
            *cell += ky[i] * kx[j];
        }
    }

    let total = z.sum();
    if total <= 0.0 || !total.is_finite() {
        return Err(NumericError::DegenerateWeights);
    }
    z /= total;
    Ok(z)
}

/// [`kde_2d`] at the resolution used for plotting.
pub fn kde_map(
    x: &[f64],
    sx: &[f64],
    y: &[f64],
    sy: &[f64],
    ext: Extent,
) -> Result<Array2<f64>, NumericError> {
    kde_2d(x, sx, y, sy, ext, PLOT_GRID)
}

fn gaussian(v: f64, mu: f64, sigma: f64) -> f64 {
    let u = (v - mu) / sigma;
    (-0.5 * u * u).exp() / (sigma * (2.0 * std::f64::consts::PI).sqrt())
}
