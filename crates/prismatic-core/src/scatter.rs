//! Multi-scale noise diagnostics: measured scatter in time bins of
//! increasing size.
//!
//! For uncorrelated Gaussian noise the measured scatter of a light curve
//! should fall as 1 / sqrt(N) as N points are averaged into each bin;
//! correlated noise flattens out instead. This module builds the ladder of
//! progressively binned containers and reports, per rung and per wavelength,
//! the measured scatter, the analytically expected uncertainty, and the
//! uncertainty on the scatter estimate itself. Judging the resulting curve
//! against 1 / sqrt(N) is left to the caller.

use std::fmt;

use serde::Serialize;

use crate::error::{RainbowError, Result};
use crate::rainbow::Rainbow;
use crate::stats;

/// Default acceptance threshold on `ok`: keeps everything but terrible data.
pub const DEFAULT_MINIMUM_ACCEPTABLE_OK: f64 = 1e-10;

// ---------------------------------------------------------------------------
// Scatter statistics
// ---------------------------------------------------------------------------

/// The statistic used to measure the point-to-point scatter of a light curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScatterMethod {
    /// Population standard deviation.
    StandardDeviation,
    /// Median absolute deviation, scaled to a Gaussian-equivalent sigma.
    Mad,
}

impl ScatterMethod {
    /// Resolve a method name; accepts `"standard-deviation"` and `"MAD"`
    /// (case-insensitively, with a few common spellings).
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "standard-deviation" | "standard_deviation" | "std" => {
                Ok(ScatterMethod::StandardDeviation)
            }
            "mad" | "median-absolute-deviation" => Ok(ScatterMethod::Mad),
            _ => Err(RainbowError::UnsupportedMethod {
                method: name.to_string(),
                expected: "`standard-deviation`, `MAD`",
            }),
        }
    }
}

impl fmt::Display for ScatterMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScatterMethod::StandardDeviation => write!(f, "standard-deviation"),
            ScatterMethod::Mad => write!(f, "MAD"),
        }
    }
}

// ---------------------------------------------------------------------------
// Result records
// ---------------------------------------------------------------------------

/// Per-rung statistics of the binning ladder. The three vectors are indexed
/// by wavelength.
#[derive(Debug, Clone, Serialize)]
pub struct ScatterBin {
    /// Cumulative bin multiplicity: how many original time samples were
    /// averaged into each point at this rung.
    pub n: usize,
    /// Median time-sampling interval at this rung.
    pub dt: f64,
    /// Measured scatter of each wavelength's light curve.
    pub scatter: Vec<f64>,
    /// Analytically expected uncertainty per wavelength.
    pub expectation: Vec<f64>,
    /// Uncertainty on the scatter estimate itself:
    /// scatter / sqrt(2 (ntime - 1)) (Sivia & Skilling, eq. 3.48).
    pub uncertainty: Vec<f64>,
}

/// The full ladder, rung order preserved (monotonically increasing `n`).
#[derive(Debug, Clone, Serialize)]
pub struct ScatterInBins {
    pub bins: Vec<ScatterBin>,
}

// ---------------------------------------------------------------------------
// Estimator
// ---------------------------------------------------------------------------

impl Rainbow {
    /// Measured scatter of each wavelength's light curve, over samples whose
    /// `ok` meets the acceptance threshold. A wavelength with no acceptable
    /// samples reports NaN.
    pub fn measured_scatter(
        &self,
        method: ScatterMethod,
        minimum_acceptable_ok: f64,
    ) -> ndarray::Array1<f64> {
        ndarray::Array1::from_iter((0..self.nwave()).map(|i| {
            let values: Vec<f64> = (0..self.ntime())
                .filter(|&j| self.ok[[i, j]] >= minimum_acceptable_ok)
                .map(|j| self.flux[[i, j]])
                .collect();
            match method {
                ScatterMethod::StandardDeviation => stats::nanstd(&values),
                ScatterMethod::Mad => stats::mad_scatter(&values),
            }
        }))
    }

    /// Expected per-point uncertainty of each wavelength's light curve: the
    /// median of the uncertainty array over acceptable samples.
    pub fn expected_uncertainty(&self, minimum_acceptable_ok: f64) -> ndarray::Array1<f64> {
        ndarray::Array1::from_iter((0..self.nwave()).map(|i| {
            let values: Vec<f64> = (0..self.ntime())
                .filter(|&j| self.ok[[i, j]] >= minimum_acceptable_ok)
                .map(|j| self.uncertainty[[i, j]])
                .collect();
            stats::nanmedian(&values)
        }))
    }

    /// Measure scatter in time bins of increasing size.
    ///
    /// Rung 0 is a simplified copy of this container; each further rung bins
    /// the previous one by `ntimes`, as long as the time axis is longer than
    /// two samples. Rungs are reported in order of increasing multiplicity.
    pub fn measured_scatter_in_bins(
        &self,
        ntimes: usize,
        method: ScatterMethod,
        minimum_acceptable_ok: f64,
    ) -> ScatterInBins {
        let ntimes = if ntimes < 2 {
            log::warn!("a bin multiplicity of {ntimes} cannot coarsen the time axis; using 2");
            2
        } else {
            ntimes
        };

        let mut bins = Vec::new();
        let mut current = self.simplified();
        let mut multiplicity = 1usize;
        loop {
            bins.push(scatter_bin(&current, multiplicity, method, minimum_acceptable_ok));
            if current.ntime() <= 2 {
                break;
            }
            current = current.bin_in_time(ntimes, minimum_acceptable_ok);
            multiplicity *= ntimes;
        }
        ScatterInBins { bins }
    }

    /// [`Rainbow::measured_scatter_in_bins`] with the usual defaults:
    /// pairwise binning, standard deviation, keep everything but terrible
    /// data.
    pub fn measured_scatter_in_bins_default(&self) -> ScatterInBins {
        self.measured_scatter_in_bins(
            2,
            ScatterMethod::StandardDeviation,
            DEFAULT_MINIMUM_ACCEPTABLE_OK,
        )
    }
}

fn scatter_bin(
    rainbow: &Rainbow,
    multiplicity: usize,
    method: ScatterMethod,
    minimum_acceptable_ok: f64,
) -> ScatterBin {
    let ntime = rainbow.ntime() as f64;
    let scatter = rainbow.measured_scatter(method, minimum_acceptable_ok);
    let expectation = rainbow.expected_uncertainty(minimum_acceptable_ok);
    let uncertainty: Vec<f64> = scatter
        .iter()
        .map(|s| s / (2.0 * (ntime - 1.0)).sqrt())
        .collect();
    ScatterBin {
        n: multiplicity,
        dt: stats::median_spacing(&rainbow.time().to_vec()),
        scatter: scatter.to_vec(),
        expectation: expectation.to_vec(),
        uncertainty,
    }
}
