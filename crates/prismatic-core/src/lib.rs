//! # prismatic-core
//!
//! **Light curves across many colors.**
//!
//! `prismatic-core` models multi-wavelength time-series brightness
//! measurements from spectroscopic observations: a [`Rainbow`] holds flux
//! (and its uncertainty and per-sample validity) on a wavelength × time
//! grid, and every transformation — arithmetic with uncertainty propagation,
//! normalization, trend removal, time binning — returns a brand-new
//! container with one more entry in its provenance history. Nothing is ever
//! mutated in place.
//!
//! ## Quick start
//!
//! ```
//! use ndarray::{Array1, Array2};
//! use prismatic_core::Rainbow;
//!
//! # fn main() -> prismatic_core::Result<()> {
//! let rainbow = Rainbow::new(
//!     Array1::linspace(1.0, 2.0, 3),   // wavelength
//!     Array1::linspace(0.0, 4.0, 5),   // time
//!     Array2::from_elem((3, 5), 42.0), // flux
//!     Array2::from_elem((3, 5), 0.1),  // uncertainty
//!     Array2::ones((3, 5)),            // ok
//! )?;
//!
//! // Each transformation yields an independent snapshot with provenance.
//! let normalized = rainbow.normalize("wavelength", 50.0)?;
//! assert!(normalized.is_probably_normalized());
//! assert_eq!(normalized.history().len(), 1);
//!
//! // The source container is untouched.
//! assert_eq!(rainbow.flux()[[0, 0]], 42.0);
//! assert!(rainbow.history().is_empty());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! Raw arrays → [`Rainbow`] → transformations → fresh snapshots
//!
//! - **Container & history** ([`rainbow`], [`history`], [`metadata`]):
//!   the immutable snapshot and its append-only provenance ledger.
//! - **Operation engine** ([`operations`]): `+ - * /` against scalars,
//!   broadcastable 1-D arrays, full matrices, or other containers, with
//!   first-order uncertainty propagation.
//! - **Normalizer** ([`normalization`]): reference-percentile rescaling
//!   along either axis.
//! - **Detrender** ([`trends`]): difference, median-filter,
//!   Savitzky–Golay, and custom-model strategies.
//! - **Binning & scatter** ([`binning`], [`scatter`]): time-axis
//!   coarsening and the 1/sqrt(N) noise-scaling diagnostic built on it.
//!
//! The core is single-threaded and purely functional: a transformation
//! either returns a new, independently-owned container or fails atomically.
//! File formats, plotting, unit handling, and model fitting live elsewhere.

pub mod binning;
pub mod error;
pub mod history;
pub mod metadata;
pub mod normalization;
pub mod operations;
pub mod rainbow;
pub mod scatter;
pub mod stats;
pub mod trends;

pub use error::{RainbowError, Result};
pub use history::{HistoryEntry, OperandSummary};
pub use metadata::MetadataValue;
pub use normalization::NormalizeAxis;
pub use operations::{Operand, Operation};
pub use rainbow::Rainbow;
pub use scatter::{
    DEFAULT_MINIMUM_ACCEPTABLE_OK, ScatterBin, ScatterInBins, ScatterMethod,
};
pub use trends::{TREND_METHOD_OPTIONS, TrendOptions};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
