//! Binary arithmetic between a container and a second operand, with
//! first-order uncertainty propagation.
//!
//! The second operand can be a scalar, a 1-D array broadcast across one axis,
//! a full (Nw, Nt) matrix, or another container sharing both axes. Operand
//! resolution:
//!
//! | operand shape            | interpretation                  | error            |
//! |--------------------------|---------------------------------|------------------|
//! | scalar, (1,), (Nw, Nt)   | elementwise                     | —                |
//! | (Nw,)                    | per-wavelength (row) constant   | ambiguous if Nw == Nt |
//! | (Nt,)                    | per-time (column) constant      | ambiguous if Nw == Nt |
//! | container                | elementwise, axes must be equal | axes mismatch    |
//! | anything else            | —                               | shape mismatch   |
//!
//! Two parallel bookkeepings are kept on purpose: the *displayed* flux (and
//! model) come from pushing the raw arrays through the operator, while the
//! propagated uncertainty evaluates the operator's partial derivatives at the
//! model-or-flux operands. With a model attached these can legitimately
//! diverge, and they must not be collapsed into one code path.

use ndarray::{Array2, ArrayView1, ArrayView2, Zip};

use crate::error::{RainbowError, Result};
use crate::history::{HistoryEntry, OperandSummary};
use crate::rainbow::Rainbow;

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// The closed set of supported binary operations. Each carries its elementwise
/// function and the fixed partial derivatives used for error propagation,
/// so no derivative expressions are ever evaluated at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operation {
    /// The operator symbol recorded in history entries.
    pub fn symbol(&self) -> char {
        match self {
            Operation::Add => '+',
            Operation::Subtract => '-',
            Operation::Multiply => '*',
            Operation::Divide => '/',
        }
    }

    fn apply(&self, x: f64, y: f64) -> f64 {
        match self {
            Operation::Add => x + y,
            Operation::Subtract => x - y,
            Operation::Multiply => x * y,
            Operation::Divide => x / y,
        }
    }

    /// dz/dx for z = x op y.
    fn dzdx(&self, _x: f64, y: f64) -> f64 {
        match self {
            Operation::Add | Operation::Subtract => 1.0,
            Operation::Multiply => y,
            Operation::Divide => 1.0 / y,
        }
    }

    /// dz/dy for z = x op y. The sign is irrelevant once squared, so
    /// add/subtract share the same derivative.
    fn dzdy(&self, x: f64, y: f64) -> f64 {
        match self {
            Operation::Add | Operation::Subtract => 1.0,
            Operation::Multiply => x,
            Operation::Divide => -x / (y * y),
        }
    }
}

// ---------------------------------------------------------------------------
// Operands
// ---------------------------------------------------------------------------

/// The second operand of a binary operation.
#[derive(Debug, Clone, Copy)]
pub enum Operand<'a> {
    Scalar(f64),
    Vector(ArrayView1<'a, f64>),
    Matrix(ArrayView2<'a, f64>),
    Container(&'a Rainbow),
}

impl From<f64> for Operand<'static> {
    fn from(value: f64) -> Self {
        Operand::Scalar(value)
    }
}

impl<'a> From<&'a ndarray::Array1<f64>> for Operand<'a> {
    fn from(value: &'a ndarray::Array1<f64>) -> Self {
        Operand::Vector(value.view())
    }
}

impl<'a> From<&'a Array2<f64>> for Operand<'a> {
    fn from(value: &'a Array2<f64>) -> Self {
        Operand::Matrix(value.view())
    }
}

impl<'a> From<ArrayView1<'a, f64>> for Operand<'a> {
    fn from(value: ArrayView1<'a, f64>) -> Self {
        Operand::Vector(value)
    }
}

impl<'a> From<ArrayView2<'a, f64>> for Operand<'a> {
    fn from(value: ArrayView2<'a, f64>) -> Self {
        Operand::Matrix(value)
    }
}

impl<'a> From<&'a Rainbow> for Operand<'a> {
    fn from(value: &'a Rainbow) -> Self {
        Operand::Container(value)
    }
}

fn summarize(operand: &Operand<'_>) -> OperandSummary {
    match operand {
        Operand::Scalar(value) => OperandSummary::Scalar { value: *value },
        Operand::Vector(v) => OperandSummary::Vector { len: v.len() },
        Operand::Matrix(m) => OperandSummary::Matrix {
            rows: m.dim().0,
            cols: m.dim().1,
        },
        Operand::Container(r) => OperandSummary::Container {
            nwave: r.nwave(),
            ntime: r.ntime(),
        },
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn elementwise(op: Operation, a: &Array2<f64>, b: &Array2<f64>) -> Array2<f64> {
    Zip::from(a).and(b).map_collect(|&x, &y| op.apply(x, y))
}

/// Strict axis comparison for combining two containers (NaN never matches).
fn axes_match(a: &Rainbow, b: &Rainbow) -> bool {
    a.wavelength().len() == b.wavelength().len()
        && a.time().len() == b.time().len()
        && a.wavelength()
            .iter()
            .zip(b.wavelength().iter())
            .all(|(x, y)| x == y)
        && a.time().iter().zip(b.time().iter()).all(|(x, y)| x == y)
}

/// Materialize a non-container operand as a full (Nw, Nt) matrix, applying
/// the broadcasting table and its error cases.
fn resolve_array(
    rainbow: &Rainbow,
    operand: &Operand<'_>,
) -> Result<Array2<f64>> {
    let (nwave, ntime) = rainbow.shape();
    match operand {
        Operand::Scalar(value) => Ok(Array2::from_elem((nwave, ntime), *value)),
        Operand::Vector(v) if v.len() == 1 => Ok(Array2::from_elem((nwave, ntime), v[0])),
        Operand::Vector(v) if v.len() == nwave || v.len() == ntime => {
            if nwave == ntime {
                return Err(RainbowError::AmbiguousShape { n: nwave });
            }
            if v.len() == nwave {
                // one constant per wavelength, repeated across time
                Ok(Array2::from_shape_fn((nwave, ntime), |(i, _)| v[i]))
            } else {
                // one constant per time, repeated across wavelength
                Ok(Array2::from_shape_fn((nwave, ntime), |(_, j)| v[j]))
            }
        }
        Operand::Vector(v) => Err(RainbowError::ShapeMismatch {
            nwave,
            ntime,
            found: vec![v.len()],
        }),
        Operand::Matrix(m) if m.dim() == (nwave, ntime) => Ok(m.to_owned()),
        Operand::Matrix(m) => Err(RainbowError::ShapeMismatch {
            nwave,
            ntime,
            found: vec![m.dim().0, m.dim().1],
        }),
        Operand::Container(_) => unreachable!("container operands are resolved by the caller"),
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

impl Rainbow {
    /// Apply `op` between `self` (x) and `operand` (y), returning a new
    /// container with transformed flux (and model, when present) and
    /// propagated uncertainty:
    ///
    /// ```text
    /// variance = sigma_x^2 * (dz/dx)^2 + sigma_y^2 * (dz/dy)^2
    /// ```
    ///
    /// evaluated at x = model-or-flux of `self` and y = model-or-flux of the
    /// operand (sigma_y is zero unless the operand is a container).
    ///
    /// Uncertainty recomputation is best-effort by contract: the flux result
    /// is always produced, and shape problems confined to uncertainty leave
    /// the copied uncertainty untouched rather than failing the call.
    pub fn apply_operation<'a>(
        &self,
        op: Operation,
        operand: impl Into<Operand<'a>>,
    ) -> Result<Rainbow> {
        let operand = operand.into();
        // Capture the record before executing, so it reflects the declared
        // parameters rather than anything the transformation computes.
        let entry = HistoryEntry::Operation {
            symbol: op.symbol(),
            operand: summarize(&operand),
        };

        let mut result = self.clone();
        let (y_alg, sigma_y): (Array2<f64>, Option<&Array2<f64>>) = match operand {
            Operand::Container(other) => {
                if !axes_match(self, other) {
                    return Err(RainbowError::AxesMismatch {
                        left: self.shape(),
                        right: other.shape(),
                    });
                }
                result.flux = elementwise(op, &self.flux, other.flux());
                let other_alg = other.model().unwrap_or(other.flux());
                if let Some(model) = &self.model {
                    result.model = Some(elementwise(op, model, other_alg));
                }
                (other_alg.clone(), Some(other.uncertainty()))
            }
            ref array_like => {
                let y = resolve_array(self, array_like)?;
                result.flux = elementwise(op, &self.flux, &y);
                if let Some(model) = &self.model {
                    result.model = Some(elementwise(op, model, &y));
                }
                (y, None)
            }
        };

        let x_alg = self.model.as_ref().unwrap_or(&self.flux);
        let mut variance = Zip::from(x_alg)
            .and(&y_alg)
            .and(&self.uncertainty)
            .map_collect(|&x, &y, &sx| (sx * op.dzdx(x, y)).powi(2));
        if let Some(sy) = sigma_y {
            Zip::from(&mut variance)
                .and(x_alg)
                .and(&y_alg)
                .and(sy)
                .for_each(|v, &x, &y, &s| *v += (s * op.dzdy(x, y)).powi(2));
        }
        result.uncertainty = variance.mapv(f64::sqrt);

        result.push_history(entry);
        Ok(result)
    }

    /// `self + other`, with propagated uncertainty.
    pub fn add<'a>(&self, other: impl Into<Operand<'a>>) -> Result<Rainbow> {
        self.apply_operation(Operation::Add, other)
    }

    /// `self - other`, with propagated uncertainty.
    pub fn subtract<'a>(&self, other: impl Into<Operand<'a>>) -> Result<Rainbow> {
        self.apply_operation(Operation::Subtract, other)
    }

    /// `self * other`, with propagated uncertainty.
    pub fn multiply<'a>(&self, other: impl Into<Operand<'a>>) -> Result<Rainbow> {
        self.apply_operation(Operation::Multiply, other)
    }

    /// `self / other`, with propagated uncertainty.
    pub fn divide<'a>(&self, other: impl Into<Operand<'a>>) -> Result<Rainbow> {
        self.apply_operation(Operation::Divide, other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, array};

    fn rainbow(nwave: usize, ntime: usize, flux: f64, sigma: f64) -> Rainbow {
        Rainbow::new(
            Array1::linspace(1.0, nwave as f64, nwave),
            Array1::linspace(0.0, (ntime - 1) as f64, ntime),
            Array2::from_elem((nwave, ntime), flux),
            Array2::from_elem((nwave, ntime), sigma),
            Array2::ones((nwave, ntime)),
        )
        .unwrap()
    }

    #[test]
    fn test_wavelength_length_vector_broadcasts_per_row() {
        let a = rainbow(3, 5, 0.0, 0.1);
        let result = a.add(&array![10.0, 20.0, 30.0]).unwrap();
        for j in 0..5 {
            assert_eq!(result.flux()[[0, j]], 10.0);
            assert_eq!(result.flux()[[1, j]], 20.0);
            assert_eq!(result.flux()[[2, j]], 30.0);
        }
    }

    #[test]
    fn test_time_length_vector_broadcasts_per_column() {
        let a = rainbow(3, 5, 0.0, 0.1);
        let result = a.add(&array![1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        for i in 0..3 {
            for j in 0..5 {
                assert_eq!(result.flux()[[i, j]], (j + 1) as f64);
            }
        }
    }

    #[test]
    fn test_full_matrix_applies_elementwise() {
        let a = rainbow(3, 5, 1.0, 0.1);
        let other = Array2::from_shape_fn((3, 5), |(i, j)| (i * 5 + j) as f64);
        let result = a.add(&other).unwrap();
        assert_eq!(result.flux()[[0, 0]], 1.0);
        assert_eq!(result.flux()[[2, 4]], 15.0);
    }

    #[test]
    fn test_wrong_length_vector_is_shape_mismatch() {
        let a = rainbow(3, 5, 1.0, 0.1);
        let err = a.add(&array![1.0, 2.0, 3.0, 4.0]).unwrap_err();
        assert_eq!(
            err,
            RainbowError::ShapeMismatch {
                nwave: 3,
                ntime: 5,
                found: vec![4],
            }
        );
    }

    #[test]
    fn test_square_container_rejects_any_matching_vector() {
        let a = rainbow(4, 4, 1.0, 0.1);
        let err = a.add(&array![1.0, 2.0, 3.0, 4.0]).unwrap_err();
        assert_eq!(err, RainbowError::AmbiguousShape { n: 4 });
        // A full matrix stays unambiguous even on a square container.
        assert!(a.add(&Array2::ones((4, 4))).is_ok());
        assert!(a.add(2.0).is_ok());
    }

    #[test]
    fn test_length_one_vector_acts_as_scalar() {
        let a = rainbow(3, 5, 1.0, 0.1);
        let result = a.add(&array![2.0]).unwrap();
        assert!(result.flux().iter().all(|&f| f == 3.0));
    }

    #[test]
    fn test_container_operand_requires_matching_axes() {
        let a = rainbow(3, 5, 1.0, 0.1);
        let mut b = rainbow(3, 5, 1.0, 0.1);
        b.time[2] += 0.5;
        let err = a.add(&b).unwrap_err();
        assert_eq!(
            err,
            RainbowError::AxesMismatch {
                left: (3, 5),
                right: (3, 5),
            }
        );
    }

    #[test]
    fn test_multiplication_propagates_uncertainty() {
        // x = 2 +- 0.1, y = 3 +- 0.2:
        // sigma_z = sqrt(0.1^2 * 3^2 + 0.2^2 * 2^2) = 0.5
        let x = rainbow(2, 3, 2.0, 0.1);
        let y = rainbow(2, 3, 3.0, 0.2);
        let z = x.multiply(&y).unwrap();
        for value in z.flux() {
            assert!((value - 6.0).abs() < 1e-12);
        }
        for sigma in z.uncertainty() {
            assert!((sigma - 0.5).abs() < 1e-12);
        }
    }

    #[test]
    fn test_scalar_round_trip_restores_flux_and_uncertainty() {
        let a = rainbow(3, 5, 1.5, 0.07);
        let round_trip = a.add(2.5).unwrap().subtract(2.5).unwrap();
        for (original, recovered) in a.flux().iter().zip(round_trip.flux().iter()) {
            assert!((original - recovered).abs() < 1e-12);
        }
        // A raw-array operand carries no uncertainty, so sigma is unchanged.
        for (original, recovered) in a.uncertainty().iter().zip(round_trip.uncertainty().iter()) {
            assert!((original - recovered).abs() < 1e-12);
        }
    }

    #[test]
    fn test_container_round_trip_flux_and_propagated_sigma() {
        let a = rainbow(3, 5, 10.0, 0.3);
        let b = rainbow(3, 5, 4.0, 0.1);
        let round_trip = a.add(&b).unwrap().subtract(&b).unwrap();
        for (original, recovered) in a.flux().iter().zip(round_trip.flux().iter()) {
            assert!((original - recovered).abs() < 1e-12);
        }
        // b's uncertainty enters once per operation: sqrt(0.3^2 + 2 * 0.1^2).
        let expected = (0.3f64.powi(2) + 2.0 * 0.1f64.powi(2)).sqrt();
        for sigma in round_trip.uncertainty() {
            assert!((sigma - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_uncertainty_uses_model_when_attached() {
        // Displayed flux divides the raw flux; the propagated uncertainty
        // evaluates the derivatives at the attached model instead.
        let x = rainbow(1, 2, 4.0, 0.1)
            .attach_model(Array2::from_elem((1, 2), 8.0))
            .unwrap();
        let y = rainbow(1, 2, 2.0, 0.2);
        let z = x.divide(&y).unwrap();
        assert_eq!(z.flux()[[0, 0]], 2.0);
        assert_eq!(z.model().unwrap()[[0, 0]], 4.0);
        // variance = (0.1 / 2)^2 + (0.2 * 8 / 4)^2
        let expected = (0.0025f64 + 0.16).sqrt();
        assert!((z.uncertainty()[[0, 0]] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_vector_operand_scales_uncertainty_without_sigma_y() {
        let a = rainbow(2, 3, 5.0, 0.1);
        let z = a.multiply(2.0).unwrap();
        for sigma in z.uncertainty() {
            assert!((sigma - 0.2).abs() < 1e-12);
        }
    }

    #[test]
    fn test_operations_record_history() {
        let a = rainbow(2, 3, 1.0, 0.1);
        let z = a.add(2.0).unwrap();
        assert_eq!(z.history().len(), 1);
        assert_eq!(
            z.history()[0],
            HistoryEntry::Operation {
                symbol: '+',
                operand: OperandSummary::Scalar { value: 2.0 },
            }
        );
        // The source container's ledger is untouched.
        assert!(a.history().is_empty());
    }

    #[test]
    fn test_failed_operation_leaves_source_untouched() {
        let a = rainbow(3, 5, 1.0, 0.1);
        let before = a.clone();
        let _ = a.add(&array![1.0, 2.0]).unwrap_err();
        assert_eq!(a, before);
        assert!(a.history().is_empty());
    }
}
