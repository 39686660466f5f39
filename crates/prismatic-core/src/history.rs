//! Provenance ledger: an append-only record of every applied transformation.
//!
//! Each transformation captures its entry *before* it executes (so the record
//! reflects the declared parameters, not internal state), mutates a fresh copy
//! of the container, and appends the entry to the copy's history. The source
//! container's history is never touched.
//!
//! Entries are a closed set of recorded-action variants, each carrying only
//! its documented parameters — never array payloads — so a full history stays
//! small and serializes cleanly.

use serde::Serialize;

use crate::normalization::NormalizeAxis;

// ---------------------------------------------------------------------------
// Operand summaries
// ---------------------------------------------------------------------------

/// Shape-level description of the second operand of an arithmetic operation.
///
/// Records enough to reproduce the call (a scalar's value, an array's shape)
/// without storing the array itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "operand", rename_all = "snake_case")]
pub enum OperandSummary {
    Scalar { value: f64 },
    Vector { len: usize },
    Matrix { rows: usize, cols: usize },
    Container { nwave: usize, ntime: usize },
}

// ---------------------------------------------------------------------------
// History entries
// ---------------------------------------------------------------------------

/// One applied transformation and the parameters it was called with.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum HistoryEntry {
    /// Binary arithmetic (`+`, `-`, `*`, `/`) with uncertainty propagation.
    Operation {
        symbol: char,
        operand: OperandSummary,
    },
    /// Reference-percentile rescaling along an axis.
    Normalize { axis: NormalizeAxis, percentile: f64 },
    /// Smooth-signal removal; optional tuning fields are the values actually
    /// used after defaulting.
    RemoveTrends {
        method: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        size: Option<(usize, usize)>,
        #[serde(skip_serializing_if = "Option::is_none")]
        window_length: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        polyorder: Option<usize>,
    },
    /// A model matrix was attached.
    AttachModel { nwave: usize, ntime: usize },
    /// The time axis was coarsened by grouping consecutive samples.
    BinInTime {
        ntimes: usize,
        minimum_acceptable_ok: f64,
    },
}

impl HistoryEntry {
    /// Stable action name, independent of the entry's parameters.
    pub fn name(&self) -> &'static str {
        match self {
            HistoryEntry::Operation { .. } => "operation",
            HistoryEntry::Normalize { .. } => "normalize",
            HistoryEntry::RemoveTrends { .. } => "remove_trends",
            HistoryEntry::AttachModel { .. } => "attach_model",
            HistoryEntry::BinInTime { .. } => "bin_in_time",
        }
    }
}
