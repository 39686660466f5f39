//! Unified error surface for container construction and transformations.
//!
//! Shape and axis violations are fatal to the single call that triggered them;
//! no partial result is ever observable because transformations only mutate a
//! fresh copy. Missing *optional* tuning parameters never land here — they
//! degrade to documented defaults with a `log::warn!` advisory instead.

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, RainbowError>;

/// Everything that can go wrong while building or transforming a container.
///
/// Every message carries the offending shapes or values, so a failure deep in
/// a pipeline can be diagnosed without re-running it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RainbowError {
    /// An operand or array cannot be cast onto the container's flux-like shape.
    #[error(
        "an array of shape {found:?} cannot be cast onto flux-like arrays of shape ({nwave}, {ntime})"
    )]
    ShapeMismatch {
        nwave: usize,
        ntime: usize,
        found: Vec<usize>,
    },

    /// Two containers were combined but their wavelength/time axes differ.
    #[error(
        "the two containers do not share wavelength/time axes (container shapes {left:?} vs {right:?})"
    )]
    AxesMismatch {
        left: (usize, usize),
        right: (usize, usize),
    },

    /// A 1-D operand was supplied to a square container, so its orientation
    /// cannot be inferred.
    #[error(
        "container has {n} wavelengths and {n} times; a 1-D operand of length {n} could broadcast either way"
    )]
    AmbiguousShape { n: usize },

    /// A required argument was not supplied.
    #[error("method `{method}` requires a `{name}` argument")]
    MissingArgument {
        method: &'static str,
        name: &'static str,
    },

    /// An axis name could not be resolved.
    #[error("unsupported axis `{axis}` (expected `wavelength`/`w` or `time`/`t`)")]
    UnsupportedAxis { axis: String },

    /// A method name could not be resolved.
    #[error("unsupported method `{method}` (valid options: {expected})")]
    UnsupportedMethod {
        method: String,
        expected: &'static str,
    },
}
