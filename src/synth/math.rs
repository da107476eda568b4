//! Numeric helpers shared by spectra, bandpasses and observations.
//!
//! All arrays handled here are plain `&[f64]` in internal units.

use crate::error::{Result, SynphotError};

/// Lower bound of the default waveset, in Angstrom.
pub const DEFAULT_WAVESET_MIN: f64 = 500.0;
/// Upper bound of the default waveset, in Angstrom.
pub const DEFAULT_WAVESET_MAX: f64 = 26000.0;
/// Number of points of the default waveset.
pub const DEFAULT_WAVESET_POINTS: usize = 10000;

/// Points closer than this (relative) to their predecessor are dropped when
/// merging wavesets.
pub const MERGE_THRESHOLD: f64 = 1e-8;

/// Number of points used for the natural waveset of Gaussian models.
const GAUSSIAN_POINTS: usize = 101;
/// Relative slack at the ends of a table, for round-tripped wavelengths.
const END_TOLERANCE: f64 = 1e-12;

/// Half-extent of a Gaussian waveset, in units of sigma.
const GAUSSIAN_EXTENT: f64 = 5.0;

// ---------------------------------------------------------------------------
// Grids
// ---------------------------------------------------------------------------

/// `n` logarithmically spaced points from `min` to `max` inclusive.
pub fn log_space(min: f64, max: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![min],
        _ => {
            let (lo, hi) = (min.log10(), max.log10());
            let step = (hi - lo) / (n - 1) as f64;
            (0..n)
                .map(|i| 10f64.powf(lo + step * i as f64))
                .collect()
        }
    }
}

/// `n` evenly spaced points from `min` to `max` inclusive.
pub fn lin_space(min: f64, max: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![min],
        _ => {
            let step = (max - min) / (n - 1) as f64;
            (0..n).map(|i| min + step * i as f64).collect()
        }
    }
}

/// Waveset used when neither a model nor its components define one.
pub fn default_waveset() -> Vec<f64> {
    log_space(DEFAULT_WAVESET_MIN, DEFAULT_WAVESET_MAX, DEFAULT_WAVESET_POINTS)
}

/// Waveset covering +-5 sigma around a Gaussian centre, positive part only.
pub fn gaussian_waveset(center: f64, sigma: f64) -> Vec<f64> {
    let mut wave = lin_space(
        center - GAUSSIAN_EXTENT * sigma,
        center + GAUSSIAN_EXTENT * sigma,
        GAUSSIAN_POINTS,
    );
    wave.retain(|&w| w > 0.0);
    wave
}

/// Convert a full width at half maximum into a Gaussian sigma.
pub fn fwhm_to_sigma(fwhm: f64) -> f64 {
    fwhm / (2.0 * (2.0 * std::f64::consts::LN_2).sqrt())
}

/// Whether every element is finite and larger than its predecessor.
pub fn is_strictly_increasing(xs: &[f64]) -> bool {
    xs.iter().all(|x| x.is_finite()) && xs.windows(2).all(|w| w[1] > w[0])
}

/// Validate a `(wave, values)` table and return it in increasing order.
///
/// Decreasing tables (typical after converting a frequency axis) are
/// reversed; anything else that is not strictly increasing is rejected, as
/// are zero or negative wavelengths.
pub fn sorted_table(mut wave: Vec<f64>, mut values: Vec<f64>) -> Result<(Vec<f64>, Vec<f64>)> {
    if wave.is_empty() {
        return Err(SynphotError::invalid("empty wavelength array"));
    }
    if wave.len() != values.len() {
        return Err(SynphotError::invalid(format!(
            "wavelength array has {} values but the value array has {}",
            wave.len(),
            values.len()
        )));
    }
    if let Some(bad) = values.iter().position(|v| !v.is_finite()) {
        return Err(SynphotError::invalid(format!(
            "non-finite value {} at index {bad}",
            values[bad]
        )));
    }
    if wave.len() > 1 && wave[0] > wave[wave.len() - 1] {
        wave.reverse();
        values.reverse();
    }
    if !is_strictly_increasing(&wave) {
        return Err(SynphotError::invalid(
            "wavelengths must be finite, unique and monotonic",
        ));
    }
    if wave[0] <= 0.0 {
        return Err(SynphotError::invalid(format!(
            "wavelengths must be positive, got {}",
            wave[0]
        )));
    }
    Ok((wave, values))
}

/// Sorted union of two wavesets.
///
/// `None` stands for "no natural waveset"; the union of `None` with a set is
/// the set itself.
pub fn merge_wavesets(a: Option<Vec<f64>>, b: Option<Vec<f64>>) -> Option<Vec<f64>> {
    match (a, b) {
        (None, None) => None,
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (Some(mut a), Some(b)) => {
            a.extend(b);
            a.retain(|x| x.is_finite());
            a.sort_by(f64::total_cmp);
            let mut merged: Vec<f64> = Vec::with_capacity(a.len());
            for x in a {
                match merged.last() {
                    Some(&prev) if (x - prev).abs() <= MERGE_THRESHOLD * prev.abs().max(1.0) => {}
                    _ => merged.push(x),
                }
            }
            Some(merged)
        }
    }
}

// ---------------------------------------------------------------------------
// Binning
// ---------------------------------------------------------------------------

/// Bin edges for a set of bin centres.
///
/// Inner edges sit at the midpoints; the outer edges mirror the first and
/// last midpoint around the outermost centres. Needs at least two centres.
pub fn bin_edges(centers: &[f64]) -> Vec<f64> {
    let n = centers.len();
    if n < 2 {
        return centers.to_vec();
    }
    let mut edges = Vec::with_capacity(n + 1);
    let first_mid = (centers[0] + centers[1]) / 2.0;
    edges.push(centers[0] - (first_mid - centers[0]));
    edges.extend(centers.windows(2).map(|w| (w[0] + w[1]) / 2.0));
    let last_mid = edges[n - 1];
    edges.push(centers[n - 1] + (centers[n - 1] - last_mid));
    edges
}

/// Width of each bin around the given centres.
///
/// Grids with fewer than two points get unit widths.
pub fn bin_widths(centers: &[f64]) -> Vec<f64> {
    if centers.len() < 2 {
        return vec![1.0; centers.len()];
    }
    bin_edges(centers)
        .windows(2)
        .map(|w| (w[1] - w[0]).abs())
        .collect()
}

/// Index of the first element of sorted `xs` not less than `x`.
pub fn search_sorted(xs: &[f64], x: f64) -> usize {
    xs.partition_point(|&v| v < x)
}

// ---------------------------------------------------------------------------
// Interpolation and integration
// ---------------------------------------------------------------------------

/// Linear interpolation of `(xs, ys)` at `x`.
///
/// Exact at the nodes and zero outside `[xs[0], xs[n-1]]`. Points within
/// unit-conversion round-off of either end are snapped onto it.
pub fn interpolate(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    let n = xs.len();
    if n == 0 || x.is_nan() {
        return 0.0;
    }
    let (first, last) = (xs[0], xs[n - 1]);
    let tol = END_TOLERANCE * first.abs().max(last.abs());
    if x < first - tol || x > last + tol {
        return 0.0;
    }
    let x = x.clamp(first, last);
    match xs.binary_search_by(|probe| probe.total_cmp(&x)) {
        Ok(i) => ys[i],
        Err(i) => {
            let (x0, x1) = (xs[i - 1], xs[i]);
            let (y0, y1) = (ys[i - 1], ys[i]);
            y0 + (y1 - y0) * (x - x0) / (x1 - x0)
        }
    }
}

/// [`interpolate`] at every point of `at`.
pub fn interpolate_all(xs: &[f64], ys: &[f64], at: &[f64]) -> Vec<f64> {
    at.iter().map(|&x| interpolate(xs, ys, x)).collect()
}

/// Trapezoid-rule integral of `y` over `x`.
pub fn trapezoid(x: &[f64], y: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]) * (ys[0] + ys[1]) / 2.0)
        .sum()
}

/// Element-wise product of two equally long arrays.
pub fn multiply(a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter().zip(b).map(|(x, y)| x * y).collect()
}
