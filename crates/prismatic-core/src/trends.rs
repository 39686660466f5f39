//! Approximate removal of smooth astrophysical signals.
//!
//! Every strategy estimates a smooth model of the flux and divides it out
//! (except `differences`, which replaces the flux with rescaled first
//! differences), leaving sharp features — transits, flares, noise — sitting
//! around one. Uncertainty arrays are never rescaled by this component.
//!
//! Strategies:
//! - `differences`: sqrt(2) * gradient(flux, along time) + 1
//! - `median_filter`: 2-D rectangular median smoothing, default size (1, 11)
//! - `savgol_filter`: per-wavelength Savitzky–Golay polynomial smoothing,
//!   default window 11 / order 1
//! - `custom`: a caller-supplied model matrix matching the flux shape
//!
//! Missing optional tuning parameters degrade to the documented defaults
//! with a `log::warn!` advisory; unknown method names are a hard error.

use std::f64::consts::SQRT_2;

use ndarray::Array2;

use crate::error::{RainbowError, Result};
use crate::history::HistoryEntry;
use crate::rainbow::Rainbow;
use crate::stats;

/// Valid method names, quoted in `UnsupportedMethod` messages.
pub const TREND_METHOD_OPTIONS: &str =
    "`differences`, `median_filter`, `savgol_filter`, `custom`";

const DEFAULT_MEDIAN_FILTER_SIZE: (usize, usize) = (1, 11);
const DEFAULT_SAVGOL_WINDOW_LENGTH: usize = 11;
const DEFAULT_SAVGOL_POLYORDER: usize = 1;

/// Optional tuning parameters for [`Rainbow::remove_trends`].
///
/// Only the fields relevant to the chosen method are read; the rest are
/// ignored. Everything defaults to `None`.
#[derive(Debug, Clone, Default)]
pub struct TrendOptions {
    /// `median_filter`: (wavelength-window, time-window) neighborhood.
    pub size: Option<(usize, usize)>,
    /// `savgol_filter`: filter window length (odd).
    pub window_length: Option<usize>,
    /// `savgol_filter`: polynomial order.
    pub polyorder: Option<usize>,
    /// `custom`: precomputed model matrix matching the flux shape.
    pub model: Option<Array2<f64>>,
}

// ---------------------------------------------------------------------------
// Detrender
// ---------------------------------------------------------------------------

impl Rainbow {
    /// Remove smooth trends from the flux using the named strategy.
    ///
    /// Returns `UnsupportedMethod` for names outside the closed set,
    /// `MissingArgument`/`ShapeMismatch` for a bad `custom` call. The history
    /// entry records the parameter values actually used after defaulting.
    pub fn remove_trends(&self, method: &str, options: TrendOptions) -> Result<Rainbow> {
        let (nwave, ntime) = self.shape();
        let mut new = self.clone();

        let entry = match method {
            "difference" | "differences" => {
                for i in 0..nwave {
                    let row = self.flux.row(i).to_vec();
                    let grad = stats::gradient(&row);
                    for j in 0..ntime {
                        new.flux[[i, j]] = SQRT_2 * grad[j] + 1.0;
                    }
                }
                HistoryEntry::RemoveTrends {
                    method: method.to_string(),
                    size: None,
                    window_length: None,
                    polyorder: None,
                }
            }

            "median_filter" => {
                let size = match options.size {
                    Some(size) => size,
                    None => {
                        log::warn!(
                            "no `size` supplied for `median_filter`; \
                             relying on the default {DEFAULT_MEDIAN_FILTER_SIZE:?}"
                        );
                        DEFAULT_MEDIAN_FILTER_SIZE
                    }
                };
                let smooth = median_filter_2d(&self.flux, size);
                new.flux = &self.flux / &smooth;
                HistoryEntry::RemoveTrends {
                    method: method.to_string(),
                    size: Some(size),
                    window_length: None,
                    polyorder: None,
                }
            }

            "savgol_filter" => {
                if options.window_length.is_none() || options.polyorder.is_none() {
                    log::warn!(
                        "missing `window_length` and/or `polyorder` for `savgol_filter`; \
                         relying on defaults window_length={DEFAULT_SAVGOL_WINDOW_LENGTH}, \
                         polyorder={DEFAULT_SAVGOL_POLYORDER}"
                    );
                }
                let mut window_length =
                    options.window_length.unwrap_or(DEFAULT_SAVGOL_WINDOW_LENGTH);
                if window_length % 2 == 0 {
                    log::warn!(
                        "`savgol_filter` window_length must be odd; \
                         bumping {window_length} up to {}",
                        window_length + 1
                    );
                    window_length += 1;
                }
                let mut polyorder = options.polyorder.unwrap_or(DEFAULT_SAVGOL_POLYORDER);
                if polyorder >= window_length {
                    log::warn!(
                        "`savgol_filter` polyorder {polyorder} does not fit in a window of \
                         {window_length}; clamping to {}",
                        window_length - 1
                    );
                    polyorder = window_length - 1;
                }
                for i in 0..nwave {
                    let row = self.flux.row(i).to_vec();
                    let smooth = savgol_filter_1d(&row, window_length, polyorder);
                    for j in 0..ntime {
                        new.flux[[i, j]] = self.flux[[i, j]] / smooth[j];
                    }
                }
                HistoryEntry::RemoveTrends {
                    method: method.to_string(),
                    size: None,
                    window_length: Some(window_length),
                    polyorder: Some(polyorder),
                }
            }

            "custom" => {
                let model = options.model.ok_or(RainbowError::MissingArgument {
                    method: "custom",
                    name: "model",
                })?;
                if model.dim() != (nwave, ntime) {
                    return Err(RainbowError::ShapeMismatch {
                        nwave,
                        ntime,
                        found: vec![model.dim().0, model.dim().1],
                    });
                }
                new.flux = &self.flux / &model;
                HistoryEntry::RemoveTrends {
                    method: method.to_string(),
                    size: None,
                    window_length: None,
                    polyorder: None,
                }
            }

            other => {
                return Err(RainbowError::UnsupportedMethod {
                    method: other.to_string(),
                    expected: TREND_METHOD_OPTIONS,
                });
            }
        };

        new.push_history(entry);
        Ok(new)
    }
}

// ---------------------------------------------------------------------------
// Median filter
// ---------------------------------------------------------------------------

/// Map an out-of-range index back inside [0, len) by mirroring at the edges
/// (the half-sample reflection a b c d -> d c b a | a b c d | d c b a).
fn reflect_index(mut index: isize, len: usize) -> usize {
    let n = len as isize;
    if n == 1 {
        return 0;
    }
    loop {
        if index < 0 {
            index = -index - 1;
        } else if index >= n {
            index = 2 * n - index - 1;
        } else {
            return index as usize;
        }
    }
}

/// Window offsets for a filter of the given size, centered for odd sizes and
/// leaning one sample left for even ones.
fn window_offsets(size: usize) -> Vec<isize> {
    let start = -((size / 2) as isize);
    (0..size as isize).map(|k| start + k).collect()
}

/// 2-D rectangular median filter with reflected boundaries. Output shape
/// always equals input shape, even when an axis is shorter than the window.
fn median_filter_2d(input: &Array2<f64>, size: (usize, usize)) -> Array2<f64> {
    let (nrows, ncols) = input.dim();
    let row_offsets = window_offsets(size.0.max(1));
    let col_offsets = window_offsets(size.1.max(1));

    let mut out = Array2::zeros((nrows, ncols));
    let mut window = Vec::with_capacity(row_offsets.len() * col_offsets.len());
    for i in 0..nrows {
        for j in 0..ncols {
            window.clear();
            for &di in &row_offsets {
                for &dj in &col_offsets {
                    let r = reflect_index(i as isize + di, nrows);
                    let c = reflect_index(j as isize + dj, ncols);
                    window.push(input[[r, c]]);
                }
            }
            out[[i, j]] = stats::nanmedian(&window);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Savitzky–Golay filter
// ---------------------------------------------------------------------------

/// Solve a small dense linear system by Gaussian elimination with partial
/// pivoting. Systems here are (polyorder + 1)^2 normal equations.
fn solve_linear(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Vec<f64> {
    let m = b.len();
    for col in 0..m {
        let mut pivot = col;
        for row in col + 1..m {
            if a[row][col].abs() > a[pivot][col].abs() {
                pivot = row;
            }
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        let diagonal = a[col][col];
        for row in col + 1..m {
            let factor = a[row][col] / diagonal;
            for k in col..m {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = vec![0.0; m];
    for row in (0..m).rev() {
        let mut sum = b[row];
        for k in row + 1..m {
            sum -= a[row][k] * x[k];
        }
        x[row] = sum / a[row][row];
    }
    x
}

/// Least-squares polynomial fit via the normal equations. Returns
/// coefficients lowest order first.
fn polyfit(xs: &[f64], ys: &[f64], order: usize) -> Vec<f64> {
    let m = order + 1;
    let mut ata = vec![vec![0.0; m]; m];
    let mut atb = vec![0.0; m];
    let mut powers = vec![1.0; m];
    for (&x, &y) in xs.iter().zip(ys) {
        powers[0] = 1.0;
        for p in 1..m {
            powers[p] = powers[p - 1] * x;
        }
        for r in 0..m {
            for c in 0..m {
                ata[r][c] += powers[r] * powers[c];
            }
            atb[r] += powers[r] * y;
        }
    }
    solve_linear(ata, atb)
}

fn polyval(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, &c| acc * x + c)
}

/// Convolution weights that evaluate the least-squares polynomial of the
/// given order at the center of an odd window.
fn savgol_weights(window: usize, order: usize) -> Vec<f64> {
    let half = (window / 2) as isize;
    let positions: Vec<f64> = (-half..=half).map(|p| p as f64).collect();
    let m = order + 1;

    // Solve (A^T A) z = e0; the weights are then w_k = sum_p z_p * pos_k^p.
    let mut ata = vec![vec![0.0; m]; m];
    for &pos in &positions {
        let mut powers = vec![1.0; m];
        for p in 1..m {
            powers[p] = powers[p - 1] * pos;
        }
        for r in 0..m {
            for c in 0..m {
                ata[r][c] += powers[r] * powers[c];
            }
        }
    }
    let mut e0 = vec![0.0; m];
    e0[0] = 1.0;
    let z = solve_linear(ata, e0);

    positions
        .iter()
        .map(|&pos| {
            let mut power = 1.0;
            let mut weight = 0.0;
            for &zp in &z {
                weight += zp * power;
                power *= pos;
            }
            weight
        })
        .collect()
}

/// Savitzky–Golay smoothing of one uniformly sampled series.
///
/// Interior samples are smoothed by the precomputed center-evaluation
/// weights; the first and last half-windows are filled by evaluating a
/// polynomial fitted to the boundary window (the interpolating edge
/// treatment). Windows longer than the series are clamped to it.
fn savgol_filter_1d(values: &[f64], window_length: usize, polyorder: usize) -> Vec<f64> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }
    let longest_odd = if n % 2 == 0 { n - 1 } else { n };
    let window = window_length.min(longest_odd).max(1);
    let order = polyorder.min(window - 1);
    let half = window / 2;

    let weights = savgol_weights(window, order);
    let mut out = vec![0.0; n];
    for j in half..n - half {
        out[j] = weights
            .iter()
            .enumerate()
            .map(|(k, &w)| w * values[j - half + k])
            .sum();
    }

    if half > 0 {
        let xs: Vec<f64> = (0..window).map(|k| k as f64).collect();
        let left = polyfit(&xs, &values[..window], order);
        for (j, slot) in out.iter_mut().enumerate().take(half) {
            *slot = polyval(&left, j as f64);
        }
        let start = n - window;
        let right = polyfit(&xs, &values[start..], order);
        for j in n - half..n {
            out[j] = polyval(&right, (j - start) as f64);
        }
    }
    out
}
