//! The generic handler: one [`HandlerSpec`] in, one CMIP variable out.

use e2c_cmor::{Engine, OutputVariable, VariableDecl};
use e2c_io::{RawVariable, SourceFile};
use tracing::{debug, info};

use crate::axis::build_axes;
use crate::context::RunContext;
use crate::error::HandlerError;
use crate::sequencer::WriteSequencer;
use crate::spec::HandlerSpec;

/// Raw inputs located for one invocation.
pub struct HandlerInputs {
    /// Raw variables in the spec's order; the first is the primary.
    pub raw: Vec<RawVariable>,
    /// File the primary was read from. Supplies coordinates and bounds.
    pub grid: Box<dyn SourceFile>,
}

impl std::fmt::Debug for HandlerInputs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerInputs")
            .field("raw", &self.raw.iter().map(RawVariable::name).collect::<Vec<_>>())
            .field("grid", &self.grid.path())
            .finish()
    }
}

/// Result of a successful invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerOutcome {
    /// CMIP variable produced.
    pub variable: String,
    /// Number of time steps written.
    pub written: usize,
    /// Time steps skipped under the continue policy.
    pub skipped: Vec<usize>,
}

/// Produce `spec`'s variable from `inputs` through `engine`.
///
/// Axes are resolved before the engine session starts, so a missing axis or
/// coordinate never leaves a declared variable behind. Once the variable is
/// declared it is closed exactly once whatever happens next.
///
/// # Errors
///
/// - Axis errors from [`build_axes`].
/// - [`HandlerError::HandlerSetupFailure`] if session setup, the dataset
///   description, or the table load fails.
/// - [`HandlerError::Engine`] if an axis or the variable is rejected.
/// - Sequencing errors from [`WriteSequencer::run`].
pub fn handle(
    spec: &HandlerSpec,
    inputs: &HandlerInputs,
    ctx: &RunContext,
    engine: &mut dyn Engine,
) -> Result<HandlerOutcome, HandlerError> {
    let name = spec.name();
    let plan = build_axes(&inputs.raw, inputs.grid.as_ref(), spec)?;

    let setup_failure = |source| HandlerError::HandlerSetupFailure {
        variable: name.to_string(),
        source,
    };
    engine
        .setup(&ctx.session_for(name))
        .map_err(setup_failure)?;
    engine
        .dataset_json(ctx.dataset_config())
        .map_err(setup_failure)?;
    engine.load_table(spec.table()).map_err(setup_failure)?;

    let engine_error = |source| HandlerError::Engine {
        variable: name.to_string(),
        source,
    };
    let axes = plan
        .descriptors
        .iter()
        .map(|d| engine.axis(d))
        .collect::<Result<Vec<_>, _>>()
        .map_err(engine_error)?;
    debug!(variable = name, n_axes = axes.len(), "declared axes");

    let decl = VariableDecl {
        name: name.to_string(),
        units: spec.units().to_string(),
        axes,
        positive: spec.positive(),
    };
    let output = OutputVariable::declare(engine, &decl).map_err(engine_error)?;

    let mut sequencer = WriteSequencer::new(
        name,
        &inputs.raw,
        &plan,
        spec.derivation(),
        spec.failure_policy(),
        ctx.cancel(),
    );
    let report = sequencer.run(output)?;

    info!(
        variable = name,
        table = spec.table(),
        written = report.written,
        "produced"
    );
    Ok(HandlerOutcome {
        variable: name.to_string(),
        written: report.written,
        skipped: report.skipped,
    })
}
