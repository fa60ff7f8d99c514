//! Handler specifications.

use e2c_cmor::Positive;

use crate::derive::Derivation;

/// Time-bounds variable names tried in order.
pub const DEFAULT_TIME_BOUNDS: &[&str] = &["time_bnds", "time_bounds"];

/// What to do when one time step fails to derive or write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log the failed step, skip it, and keep writing the remaining steps.
    #[default]
    Continue,
    /// Stop at the failed step and fail the whole variable.
    Abort,
}

/// A non-spatial axis carried through to the output, such as soil depth.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtraAxis {
    /// Dimension name in the source file (`levgrnd`).
    pub source: String,
    /// CMIP6 coordinate table entry (`sdepth`).
    pub table_entry: String,
    /// Units of the coordinate values.
    pub units: String,
}

impl ExtraAxis {
    /// Create an extra-axis mapping.
    pub fn new(
        source: impl Into<String>,
        table_entry: impl Into<String>,
        units: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            table_entry: table_entry.into(),
            units: units.into(),
        }
    }
}

/// Everything the generic pipeline needs to produce one CMIP variable.
///
/// Built once at startup with the `with_*` methods and never mutated after
/// registration.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerSpec {
    name: String,
    units: String,
    table: String,
    raw_variables: Vec<String>,
    derivation: Derivation,
    positive: Option<Positive>,
    extra_axes: Vec<ExtraAxis>,
    failure_policy: FailurePolicy,
    time_bounds: Vec<String>,
}

impl HandlerSpec {
    /// Create a spec producing `name` in `units` from table `table`.
    ///
    /// Defaults: identity derivation, no raw variables, no sign convention,
    /// no extra axes, [`FailurePolicy::Continue`], and time bounds read from
    /// `time_bnds` or `time_bounds`.
    pub fn new(name: impl Into<String>, units: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            units: units.into(),
            table: table.into(),
            raw_variables: Vec::new(),
            derivation: Derivation::Identity,
            positive: None,
            extra_axes: Vec::new(),
            failure_policy: FailurePolicy::default(),
            time_bounds: DEFAULT_TIME_BOUNDS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Set the raw input variable names. The first is the primary input
    /// whose coordinates define the output grid.
    pub fn with_raw(mut self, names: &[&str]) -> Self {
        self.raw_variables = names.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Set the derivation.
    pub fn with_derivation(mut self, derivation: Derivation) -> Self {
        self.derivation = derivation;
        self
    }

    /// Set the sign convention.
    pub fn with_positive(mut self, positive: Positive) -> Self {
        self.positive = Some(positive);
        self
    }

    /// Append an extra output axis.
    pub fn with_extra_axis(mut self, axis: ExtraAxis) -> Self {
        self.extra_axes.push(axis);
        self
    }

    /// Set the per-step failure policy.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Set the time-bounds variable names, tried in order.
    pub fn with_time_bounds(mut self, names: &[&str]) -> Self {
        self.time_bounds = names.iter().map(|s| s.to_string()).collect();
        self
    }

    /// CMIP variable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Output units.
    pub fn units(&self) -> &str {
        &self.units
    }

    /// CMIP6 table file name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Raw input variable names, primary first.
    pub fn raw_variables(&self) -> &[String] {
        &self.raw_variables
    }

    /// The derivation.
    pub fn derivation(&self) -> &Derivation {
        &self.derivation
    }

    /// Sign convention.
    pub fn positive(&self) -> Option<Positive> {
        self.positive
    }

    /// Extra output axes, in output order.
    pub fn extra_axes(&self) -> &[ExtraAxis] {
        &self.extra_axes
    }

    /// Per-step failure policy.
    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    /// Time-bounds variable names.
    pub fn time_bounds(&self) -> &[String] {
        &self.time_bounds
    }
}
