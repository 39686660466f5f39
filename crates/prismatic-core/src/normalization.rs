//! Reference-percentile rescaling along a chosen axis.
//!
//! Normalizing along `wavelength` divides every wavelength's light curve by
//! that wavelength's reference value (the NaN-ignoring percentile of its flux
//! across time), flattening the typical spectrum to one. Normalizing along
//! `time` divides every time's spectrum by that time's reference value
//! instead, flattening the typical light curve.

use std::fmt;

use serde::Serialize;

use crate::error::{RainbowError, Result};
use crate::history::HistoryEntry;
use crate::rainbow::Rainbow;
use crate::scatter::{DEFAULT_MINIMUM_ACCEPTABLE_OK, ScatterMethod};
use crate::stats;

// ---------------------------------------------------------------------------
// Axis resolution
// ---------------------------------------------------------------------------

/// The axis divided out by [`Rainbow::normalize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizeAxis {
    Wavelength,
    Time,
}

impl NormalizeAxis {
    /// Resolve an axis name case-insensitively by its first letter, so
    /// `"w"`, `"wave"`, and `"Wavelength"` all mean the same thing.
    pub fn parse(axis: &str) -> Result<Self> {
        match axis.trim().chars().next().map(|c| c.to_ascii_lowercase()) {
            Some('w') => Ok(NormalizeAxis::Wavelength),
            Some('t') => Ok(NormalizeAxis::Time),
            _ => Err(RainbowError::UnsupportedAxis {
                axis: axis.to_string(),
            }),
        }
    }
}

impl fmt::Display for NormalizeAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizeAxis::Wavelength => write!(f, "wavelength"),
            NormalizeAxis::Time => write!(f, "time"),
        }
    }
}

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

impl Rainbow {
    /// Normalize by dividing out the reference spectrum or light curve.
    ///
    /// `percentile` (0–100) selects the reference along the opposite axis;
    /// 50 is the median. Higher values suit normalizing to an out-of-transit
    /// baseline, lower ones to the floor beneath a flare. NaNs are ignored
    /// when the reference is computed.
    ///
    /// Uncertainty is rescaled by the same reference. That rescale is
    /// best-effort by contract — the flux result is never abandoned over an
    /// uncertainty-only problem — though with shapes enforced at construction
    /// the two cannot disagree here.
    pub fn normalize(&self, axis: &str, percentile: f64) -> Result<Rainbow> {
        Ok(self.normalize_axis(NormalizeAxis::parse(axis)?, percentile))
    }

    /// [`Rainbow::normalize`] with the usual defaults: the median spectrum.
    pub fn normalize_default(&self) -> Rainbow {
        self.normalize_axis(NormalizeAxis::Wavelength, 50.0)
    }

    /// Normalize along an already-resolved axis.
    pub fn normalize_axis(&self, axis: NormalizeAxis, percentile: f64) -> Rainbow {
        let entry = HistoryEntry::Normalize { axis, percentile };
        let (nwave, ntime) = self.shape();
        let mut new = self.clone();

        match axis {
            NormalizeAxis::Wavelength => {
                // Reference spectrum: one percentile value per wavelength.
                let reference: Vec<f64> = (0..nwave)
                    .map(|i| stats::nanpercentile(&self.flux.row(i).to_vec(), percentile))
                    .collect();
                for i in 0..nwave {
                    for j in 0..ntime {
                        new.flux[[i, j]] = self.flux[[i, j]] / reference[i];
                        new.uncertainty[[i, j]] = self.uncertainty[[i, j]] / reference[i];
                    }
                }
            }
            NormalizeAxis::Time => {
                // Reference light curve: one percentile value per time.
                let reference: Vec<f64> = (0..ntime)
                    .map(|j| stats::nanpercentile(&self.flux.column(j).to_vec(), percentile))
                    .collect();
                for i in 0..nwave {
                    for j in 0..ntime {
                        new.flux[[i, j]] = self.flux[[i, j]] / reference[j];
                        new.uncertainty[[i, j]] = self.uncertainty[[i, j]] / reference[j];
                    }
                }
            }
        }

        new.push_history(entry);
        new
    }

    /// Guess whether this container has already been normalized.
    ///
    /// True when a normalize entry appears in the history, or when the
    /// spectrum sits close enough to one: the 95th percentile of
    /// |spectrum - 1| / sigma is below 5, with sigma the per-wavelength
    /// maximum of the typical uncertainty and the robust measured scatter.
    /// When no positive sigma exists at all, the fallback is the 95th
    /// percentile of |spectrum - 1| below 0.1.
    pub fn is_probably_normalized(&self) -> bool {
        if self
            .history
            .iter()
            .any(|entry| matches!(entry, HistoryEntry::Normalize { .. }))
        {
            return true;
        }

        let spectrum = self.median_spectrum();
        let typical = self.typical_uncertainty();
        let scatter = self.measured_scatter(ScatterMethod::Mad, DEFAULT_MINIMUM_ACCEPTABLE_OK);
        let sigma: Vec<f64> = typical
            .iter()
            .zip(scatter.iter())
            .map(|(&t, &s)| t.max(s))
            .collect();

        if sigma.iter().any(|&s| s > 0.0) {
            let deviations: Vec<f64> = spectrum
                .iter()
                .zip(&sigma)
                .map(|(&f, &s)| (f - 1.0).abs() / s)
                .collect();
            stats::nanpercentile(&deviations, 95.0) < 5.0
        } else {
            let deviations: Vec<f64> = spectrum.iter().map(|&f| (f - 1.0).abs()).collect();
            stats::nanpercentile(&deviations, 95.0) < 0.1
        }
    }
}
