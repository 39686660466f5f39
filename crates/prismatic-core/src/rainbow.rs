//! The central container: flux versus (wavelength, time), with provenance.
//!
//! A [`Rainbow`] holds a wavelength axis (length Nw), a time axis (length Nt),
//! and the flux-like matrices `flux`, `uncertainty`, and `ok` of shape
//! (Nw, Nt), plus an optional `model` matrix of the same shape, free-form
//! metadata, and the history ledger.
//!
//! Containers are immutable snapshots: every transformation deep-copies the
//! source, edits only the copy, appends one history entry to the copy, and
//! returns it. The source is never observably mutated, even on failure.

use std::collections::BTreeMap;

use ndarray::{Array1, Array2};

use crate::error::{RainbowError, Result};
use crate::history::HistoryEntry;
use crate::metadata::MetadataValue;
use crate::stats;

// ---------------------------------------------------------------------------
// Container
// ---------------------------------------------------------------------------

/// A multi-wavelength time series of brightness measurements.
///
/// Cloning a `Rainbow` deep-copies every array, so a clone (and therefore the
/// result of every transformation) exclusively owns its data.
#[derive(Debug, Clone)]
pub struct Rainbow {
    pub(crate) wavelength: Array1<f64>,
    pub(crate) time: Array1<f64>,
    pub(crate) flux: Array2<f64>,
    pub(crate) uncertainty: Array2<f64>,
    pub(crate) ok: Array2<f64>,
    pub(crate) model: Option<Array2<f64>>,
    pub(crate) metadata: BTreeMap<String, MetadataValue>,
    pub(crate) history: Vec<HistoryEntry>,
}

impl Rainbow {
    /// Build a container from raw arrays, validating every shape invariant.
    ///
    /// `flux`, `uncertainty`, and `ok` must all be (Nw, Nt) where Nw and Nt
    /// are the axis lengths; any violation is a [`RainbowError::ShapeMismatch`]
    /// naming both shapes.
    pub fn new(
        wavelength: Array1<f64>,
        time: Array1<f64>,
        flux: Array2<f64>,
        uncertainty: Array2<f64>,
        ok: Array2<f64>,
    ) -> Result<Self> {
        let nwave = wavelength.len();
        let ntime = time.len();
        for matrix in [&flux, &uncertainty, &ok] {
            let dim = matrix.dim();
            if dim != (nwave, ntime) {
                return Err(RainbowError::ShapeMismatch {
                    nwave,
                    ntime,
                    found: vec![dim.0, dim.1],
                });
            }
        }
        Ok(Self {
            wavelength,
            time,
            flux,
            uncertainty,
            ok,
            model: None,
            metadata: BTreeMap::new(),
            history: Vec::new(),
        })
    }

    /// Build a model-bearing container.
    ///
    /// A model whose shape does not match flux is a non-fatal advisory: a
    /// warning is logged and the container is constructed without it, so
    /// downstream model-dependent operations must either tolerate the absence
    /// or fail explicitly when they need it.
    pub fn with_model(
        wavelength: Array1<f64>,
        time: Array1<f64>,
        flux: Array2<f64>,
        uncertainty: Array2<f64>,
        ok: Array2<f64>,
        model: Array2<f64>,
    ) -> Result<Self> {
        let mut rainbow = Self::new(wavelength, time, flux, uncertainty, ok)?;
        if model.dim() == rainbow.flux.dim() {
            rainbow.model = Some(model);
        } else {
            log::warn!(
                "model of shape {:?} does not match flux of shape {:?}; \
                 constructing without a model",
                model.dim(),
                rainbow.flux.dim()
            );
        }
        Ok(rainbow)
    }

    /// Attach one caller-defined metadata entry (builder style).
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Return a new container with `model` attached.
    ///
    /// Unlike [`Rainbow::with_model`], this is an explicit request to attach a
    /// specific array, so a shape mismatch is fatal.
    pub fn attach_model(&self, model: Array2<f64>) -> Result<Rainbow> {
        let (nwave, ntime) = self.shape();
        if model.dim() != (nwave, ntime) {
            return Err(RainbowError::ShapeMismatch {
                nwave,
                ntime,
                found: vec![model.dim().0, model.dim().1],
            });
        }
        let mut new = self.clone();
        new.model = Some(model);
        new.push_history(HistoryEntry::AttachModel { nwave, ntime });
        Ok(new)
    }

    // -----------------------------------------------------------------------
    // Read accessors
    // -----------------------------------------------------------------------

    /// Number of wavelengths (Nw).
    pub fn nwave(&self) -> usize {
        self.wavelength.len()
    }

    /// Number of times (Nt).
    pub fn ntime(&self) -> usize {
        self.time.len()
    }

    /// Shape of every flux-like array: (Nw, Nt).
    pub fn shape(&self) -> (usize, usize) {
        (self.nwave(), self.ntime())
    }

    pub fn wavelength(&self) -> &Array1<f64> {
        &self.wavelength
    }

    pub fn time(&self) -> &Array1<f64> {
        &self.time
    }

    pub fn flux(&self) -> &Array2<f64> {
        &self.flux
    }

    pub fn uncertainty(&self) -> &Array2<f64> {
        &self.uncertainty
    }

    /// Per-sample validity/confidence weight (1 = good, 0 = bad).
    pub fn ok(&self) -> &Array2<f64> {
        &self.ok
    }

    pub fn model(&self) -> Option<&Array2<f64>> {
        self.model.as_ref()
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    pub fn metadata(&self) -> &BTreeMap<String, MetadataValue> {
        &self.metadata
    }

    /// The provenance ledger, oldest entry first.
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    // -----------------------------------------------------------------------
    // Wavelike/timelike statistics
    // -----------------------------------------------------------------------

    /// Median flux per wavelength, across time (NaNs ignored).
    pub fn median_spectrum(&self) -> Array1<f64> {
        Array1::from_iter((0..self.nwave()).map(|i| stats::nanmedian(&self.flux.row(i).to_vec())))
    }

    /// Median flux per time, across wavelength (NaNs ignored).
    pub fn median_lightcurve(&self) -> Array1<f64> {
        Array1::from_iter(
            (0..self.ntime()).map(|j| stats::nanmedian(&self.flux.column(j).to_vec())),
        )
    }

    /// Median uncertainty per wavelength, across time (NaNs ignored).
    pub fn typical_uncertainty(&self) -> Array1<f64> {
        Array1::from_iter(
            (0..self.nwave()).map(|i| stats::nanmedian(&self.uncertainty.row(i).to_vec())),
        )
    }

    // -----------------------------------------------------------------------
    // Model-dependent views
    // -----------------------------------------------------------------------

    /// Flux minus model. Fails explicitly when no model is attached.
    pub fn residuals(&self) -> Result<Array2<f64>> {
        match &self.model {
            Some(model) => Ok(&self.flux - model),
            None => Err(RainbowError::MissingArgument {
                method: "residuals",
                name: "model",
            }),
        }
    }

    /// Flux minus model, shifted up to sit around one.
    pub fn residuals_plus_one(&self) -> Result<Array2<f64>> {
        Ok(self.residuals()? + 1.0)
    }

    // -----------------------------------------------------------------------
    // Copies
    // -----------------------------------------------------------------------

    /// A stripped-down copy holding only wavelength/time/flux/uncertainty/ok —
    /// no model, no metadata, no history. Used as the base of the binning
    /// ladder so repeated coarsening does not drag extra payload along.
    pub fn simplified(&self) -> Rainbow {
        Rainbow {
            wavelength: self.wavelength.clone(),
            time: self.time.clone(),
            flux: self.flux.clone(),
            uncertainty: self.uncertainty.clone(),
            ok: self.ok.clone(),
            model: None,
            metadata: BTreeMap::new(),
            history: Vec::new(),
        }
    }

    pub(crate) fn push_history(&mut self, entry: HistoryEntry) {
        self.history.push(entry);
    }
}

// ---------------------------------------------------------------------------
// Equality
// ---------------------------------------------------------------------------

/// Elementwise comparison where two NaNs at the same position count as equal.
pub(crate) fn nan_eq(a: f64, b: f64) -> bool {
    (a.is_nan() && b.is_nan()) || a == b
}

fn array1_nan_eq(a: &Array1<f64>, b: &Array1<f64>) -> bool {
    a.len() == b.len() && a.iter().zip(b.iter()).all(|(&x, &y)| nan_eq(x, y))
}

fn array2_nan_eq(a: &Array2<f64>, b: &Array2<f64>) -> bool {
    a.dim() == b.dim() && a.iter().zip(b.iter()).all(|(&x, &y)| nan_eq(x, y))
}

/// Structural equality over axes and flux-like arrays.
///
/// Two containers are equal when their wavelength, time, flux, uncertainty,
/// and ok arrays match elementwise, and model presence agrees (both absent,
/// or both present and matching). Two NaNs at the same position compare equal
/// — deliberately non-standard, so round trips over data containing invalid
/// samples still compare equal. `metadata` and `history` are ignored (a
/// freshly-computed container and a re-derived one may differ in provenance
/// while holding identical data).
impl PartialEq for Rainbow {
    fn eq(&self, other: &Self) -> bool {
        let models_match = match (&self.model, &other.model) {
            (Some(a), Some(b)) => array2_nan_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        models_match
            && array1_nan_eq(&self.wavelength, &other.wavelength)
            && array1_nan_eq(&self.time, &other.time)
            && array2_nan_eq(&self.flux, &other.flux)
            && array2_nan_eq(&self.uncertainty, &other.uncertainty)
            && array2_nan_eq(&self.ok, &other.ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn small() -> Rainbow {
        Rainbow::new(
            array![1.0, 2.0],
            array![0.0, 1.0, 2.0],
            array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]],
            Array2::from_elem((2, 3), 0.1),
            Array2::ones((2, 3)),
        )
        .unwrap()
    }

    #[test]
    fn test_new_rejects_mismatched_flux_shape() {
        let err = Rainbow::new(
            array![1.0, 2.0],
            array![0.0, 1.0, 2.0],
            Array2::ones((3, 2)),
            Array2::ones((2, 3)),
            Array2::ones((2, 3)),
        )
        .unwrap_err();
        assert_eq!(
            err,
            RainbowError::ShapeMismatch {
                nwave: 2,
                ntime: 3,
                found: vec![3, 2],
            }
        );
    }

    #[test]
    fn test_with_model_drops_mismatched_model_with_advisory() {
        let rainbow = Rainbow::with_model(
            array![1.0, 2.0],
            array![0.0, 1.0, 2.0],
            Array2::ones((2, 3)),
            Array2::ones((2, 3)),
            Array2::ones((2, 3)),
            Array2::ones((3, 3)),
        )
        .unwrap();
        assert!(!rainbow.has_model());
    }

    #[test]
    fn test_attach_model_rejects_wrong_shape() {
        let err = small().attach_model(Array2::ones((3, 3))).unwrap_err();
        assert!(matches!(err, RainbowError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_attach_model_records_history() {
        let with_model = small().attach_model(Array2::ones((2, 3))).unwrap();
        assert!(with_model.has_model());
        assert_eq!(with_model.history().len(), 1);
        assert_eq!(with_model.history()[0].name(), "attach_model");
    }

    #[test]
    fn test_residuals_require_a_model() {
        let err = small().residuals().unwrap_err();
        assert_eq!(
            err,
            RainbowError::MissingArgument {
                method: "residuals",
                name: "model",
            }
        );

        let with_model = small().attach_model(Array2::ones((2, 3))).unwrap();
        let residuals = with_model.residuals().unwrap();
        assert_eq!(residuals[[0, 0]], 0.0);
        assert_eq!(residuals[[1, 2]], 5.0);
    }

    #[test]
    fn test_median_spectrum_and_lightcurve() {
        let rainbow = small();
        assert_eq!(rainbow.median_spectrum(), array![2.0, 5.0]);
        assert_eq!(rainbow.median_lightcurve(), array![2.5, 3.5, 4.5]);
    }

    #[test]
    fn test_equality_is_reflexive_with_nans() {
        let mut rainbow = small();
        rainbow.flux[[0, 1]] = f64::NAN;
        let copy = rainbow.clone();
        assert_eq!(rainbow, copy);
    }

    #[test]
    fn test_equality_ignores_metadata_and_history() {
        let a = small().with_metadata("instrument", "NIRSpec");
        let b = small().with_metadata("visit", 3i64);
        assert_eq!(a, b);
    }

    #[test]
    fn test_equality_requires_model_presence_to_agree() {
        let plain = small();
        let with_model = small().attach_model(Array2::ones((2, 3))).unwrap();
        assert_ne!(plain, with_model);
    }

    #[test]
    fn test_equality_detects_value_differences() {
        let a = small();
        let mut b = small();
        b.flux[[1, 1]] += 1e-9;
        assert_ne!(a, b);
    }

    #[test]
    fn test_simplified_strips_model_metadata_history() {
        let full = small()
            .with_metadata("instrument", "NIRSpec")
            .attach_model(Array2::ones((2, 3)))
            .unwrap();
        let simple = full.simplified();
        assert!(!simple.has_model());
        assert!(simple.metadata().is_empty());
        assert!(simple.history().is_empty());
        assert_eq!(simple.flux(), full.flux());
    }
}
