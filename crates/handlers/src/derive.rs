//! Per-time-step derivation of the output field.
//!
//! Inputs arrive as one time slice per raw variable, already permuted into
//! canonical order `[lat, lon, extra..., reduction]`. No state is carried
//! between steps.

use ndarray::{ArrayD, ArrayViewD, Axis, Zip};

use crate::error::DeriveError;

/// How a handler turns raw slices into the CMIP slice.
#[derive(Debug, Clone, PartialEq)]
pub enum Derivation {
    /// Pass the single input through unchanged.
    Identity,
    /// Pass the single input through; the handler's sign convention is
    /// declared as metadata only.
    Signed,
    /// Sum the single input over its trailing (vertical) axis and cap the
    /// sum at `threshold`, but only where some level is positive.
    VerticalSumCapped {
        /// Source dimension name of the vertical axis.
        axis: String,
        /// Cap applied to the column sum.
        threshold: f64,
    },
    /// Elementwise sum of all inputs, multiplied by `scale`.
    LinearSum {
        /// Unit conversion factor.
        scale: f64,
    },
}

impl Derivation {
    /// Short name for logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Derivation::Identity => "identity",
            Derivation::Signed => "signed",
            Derivation::VerticalSumCapped { .. } => "vertical-sum-capped",
            Derivation::LinearSum { .. } => "linear-sum",
        }
    }

    /// Source dimension reduced away by this derivation, if any.
    pub fn reduction_axis(&self) -> Option<&str> {
        match self {
            Derivation::VerticalSumCapped { axis, .. } => Some(axis),
            _ => None,
        }
    }

    /// Fewest and most inputs accepted; `None` means unbounded.
    pub fn arity(&self) -> (usize, Option<usize>) {
        match self {
            Derivation::LinearSum { .. } => (1, None),
            _ => (1, Some(1)),
        }
    }

    /// Returns `true` if the derivation accepts `n` inputs.
    pub fn accepts(&self, n: usize) -> bool {
        let (min, max) = self.arity();
        n >= min && max.is_none_or(|max| n <= max)
    }

    /// Derive one output slice.
    ///
    /// # Errors
    ///
    /// Returns [`DeriveError`] on wrong input count, mismatched input shapes,
    /// or a reduction over a 0-dimensional slice.
    pub fn derive(&self, inputs: &[ArrayViewD<'_, f64>]) -> Result<ArrayD<f64>, DeriveError> {
        if !self.accepts(inputs.len()) {
            let (min, max) = self.arity();
            return Err(DeriveError::Arity {
                kind: self.kind(),
                min,
                max,
                got: inputs.len(),
            });
        }
        match self {
            Derivation::Identity | Derivation::Signed => {
                Ok(inputs[0].as_standard_layout().into_owned())
            }
            Derivation::VerticalSumCapped { threshold, .. } => {
                vertical_sum_capped(&inputs[0], *threshold)
            }
            Derivation::LinearSum { scale } => linear_sum(inputs, *scale),
        }
    }
}

/// Column sum over the trailing axis with a masked cap.
///
/// The mask is taken from the unreduced levels: a column whose levels are all
/// `<= 0` keeps its raw sum even when that sum exceeds `threshold`.
fn vertical_sum_capped(input: &ArrayViewD<'_, f64>, threshold: f64) -> Result<ArrayD<f64>, DeriveError> {
    let ndim = input.ndim();
    if ndim == 0 {
        return Err(DeriveError::NothingToReduce { ndim });
    }
    let axis = Axis(ndim - 1);

    let mask = input.map_axis(axis, |levels| levels.iter().any(|&v| v > 0.0));
    let sum = input.sum_axis(axis);

    Ok(Zip::from(&sum)
        .and(&mask)
        .map_collect(|&s, &any_positive| {
            if any_positive && s > threshold {
                threshold
            } else {
                s
            }
        }))
}

fn linear_sum(inputs: &[ArrayViewD<'_, f64>], scale: f64) -> Result<ArrayD<f64>, DeriveError> {
    let first = &inputs[0];
    let mut out = first.as_standard_layout().into_owned();
    for other in &inputs[1..] {
        if other.shape() != first.shape() {
            return Err(DeriveError::ShapeMismatch {
                first: first.shape().to_vec(),
                other: other.shape().to_vec(),
            });
        }
        out += other;
    }
    out.mapv_inplace(|v| v * scale);
    Ok(out)
}
