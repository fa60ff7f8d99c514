//! Error types for e2c-handlers.

use std::path::PathBuf;

use e2c_cmor::EngineError;
use e2c_io::IoError;

/// Error type for a single handler invocation or dispatch request.
///
/// Every variant is fatal to one variable only; the dispatcher reports it and
/// moves on to the next requested variable.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// Session, dataset-config, or table setup failed before any axis or
    /// variable was declared.
    #[error("setup failed for '{variable}': {source}")]
    HandlerSetupFailure {
        /// CMIP variable being produced.
        variable: String,
        /// Underlying engine error.
        #[source]
        source: EngineError,
    },

    /// A dimension the handler needs is absent from the raw variable.
    #[error("axis '{axis}' not found on raw variable '{variable}'")]
    MissingAxis {
        /// Raw variable inspected.
        variable: String,
        /// Dimension that was looked up.
        axis: String,
    },

    /// Coordinate values, bounds, or time units are absent or malformed.
    #[error("missing coordinate data '{name}' in {}: {reason}", path.display())]
    MissingCoordinateData {
        /// Coordinate or bounds variable.
        name: String,
        /// File inspected.
        path: PathBuf,
        /// What was wrong.
        reason: String,
    },

    /// A raw variable has a dimension the handler cannot place.
    #[error("raw variable '{variable}' has unexpected dimension '{dimension}'")]
    UnexpectedDimension {
        /// Raw variable inspected.
        variable: String,
        /// The unplaced dimension.
        dimension: String,
    },

    /// A time step failed under the abort policy.
    #[error(
        "write failed for '{variable}' at step {step} (last successful step: {last_success:?}): {reason}"
    )]
    WriteFailure {
        /// CMIP variable being produced.
        variable: String,
        /// Step that failed.
        step: usize,
        /// Last step written successfully, if any.
        last_success: Option<usize>,
        /// Description of the step failure.
        reason: String,
    },

    /// The run was cancelled between time steps.
    #[error("cancelled while writing '{variable}' (last successful step: {last_success:?})")]
    Cancelled {
        /// CMIP variable being produced.
        variable: String,
        /// Last step written successfully, if any.
        last_success: Option<usize>,
    },

    /// No handler is registered under the requested name.
    #[error("no handler registered for '{name}'")]
    UnknownVariable {
        /// Requested CMIP variable name.
        name: String,
    },

    /// A required raw variable is in none of the supplied input files, or an
    /// input path does not exist.
    #[error("raw variable '{raw}' for '{variable}' not found in {} input file(s)", searched.len())]
    MissingInputFile {
        /// CMIP variable being produced.
        variable: String,
        /// Raw variable (or path) that could not be located.
        raw: String,
        /// Paths that were searched.
        searched: Vec<PathBuf>,
    },

    /// The engine rejected an axis or variable declaration.
    #[error("engine error for '{variable}': {source}")]
    Engine {
        /// CMIP variable being produced.
        variable: String,
        /// Underlying engine error.
        #[source]
        source: EngineError,
    },

    /// Reading a source file failed.
    #[error(transparent)]
    Io(#[from] IoError),
}

/// Per-step derivation failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DeriveError {
    /// The derivation received the wrong number of inputs.
    #[error("{kind} expects {} input(s), got {got}", input_range(*min, *max))]
    Arity {
        /// Derivation kind.
        kind: &'static str,
        /// Fewest inputs accepted.
        min: usize,
        /// Most inputs accepted, if bounded.
        max: Option<usize>,
        /// Actual input count.
        got: usize,
    },

    /// Inputs that must be combined elementwise have different shapes.
    #[error("input shapes differ: {first:?} vs {other:?}")]
    ShapeMismatch {
        /// Shape of the first input.
        first: Vec<usize>,
        /// Shape of the offending input.
        other: Vec<usize>,
    },

    /// A reduction was requested over a slice without a trailing axis.
    #[error("cannot reduce a {ndim}-dimensional slice")]
    NothingToReduce {
        /// Dimensionality of the slice.
        ndim: usize,
    },
}

fn input_range(min: usize, max: Option<usize>) -> String {
    match max {
        Some(max) if max == min => min.to_string(),
        Some(max) => format!("{min} to {max}"),
        None => format!("at least {min}"),
    }
}
