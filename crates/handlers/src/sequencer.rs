//! The per-time-step derive/write loop.

use e2c_cmor::{EngineError, OutputVariable, TimeSlice};
use e2c_io::RawVariable;
use ndarray::{ArrayD, ArrayViewD};
use tracing::{debug, error, info, warn};

use crate::axis::AxisPlan;
use crate::context::CancelFlag;
use crate::derive::Derivation;
use crate::error::{DeriveError, HandlerError};
use crate::spec::FailurePolicy;

/// One derived time step, built and discarded inside one loop iteration.
#[derive(Debug, Clone)]
pub struct TimeStep {
    /// Position along the time axis.
    pub index: usize,
    /// Time coordinate value.
    pub value: f64,
    /// Time cell bounds.
    pub bounds: [f64; 2],
    /// Derived slice in declared axis order.
    pub data: ArrayD<f64>,
}

/// Where the sequencer is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    /// The output variable is declared; nothing written yet.
    Opened,
    /// Working on the given step.
    Writing(usize),
    /// The output variable has been closed.
    Closed,
}

/// Outcome of a completed sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceReport {
    /// Number of steps written.
    pub written: usize,
    /// Steps skipped under [`FailurePolicy::Continue`], in order.
    pub skipped: Vec<usize>,
}

#[derive(Debug, thiserror::Error)]
enum StepError {
    #[error("derive: {0}")]
    Derive(#[from] DeriveError),
    #[error("write: {0}")]
    Write(#[from] EngineError),
}

/// Drives `derive -> write` over every time step of one output variable.
///
/// The cursor only moves forward. Cancellation is checked between steps, so
/// a write in progress always completes.
#[derive(Debug)]
pub struct WriteSequencer<'a> {
    variable: &'a str,
    inputs: &'a [RawVariable],
    plan: &'a AxisPlan,
    derivation: &'a Derivation,
    policy: FailurePolicy,
    cancel: &'a CancelFlag,
    state: SequencerState,
    last_success: Option<usize>,
}

impl<'a> WriteSequencer<'a> {
    /// Create a sequencer over `inputs`, laid out by `plan`.
    pub fn new(
        variable: &'a str,
        inputs: &'a [RawVariable],
        plan: &'a AxisPlan,
        derivation: &'a Derivation,
        policy: FailurePolicy,
        cancel: &'a CancelFlag,
    ) -> Self {
        Self {
            variable,
            inputs,
            plan,
            derivation,
            policy,
            cancel,
            state: SequencerState::Opened,
            last_success: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SequencerState {
        self.state
    }

    /// Last step written successfully.
    pub fn last_success(&self) -> Option<usize> {
        self.last_success
    }

    /// Write every time step to `output`, then close it.
    ///
    /// `output` is closed exactly once on every path: explicitly here on
    /// success, abort, or cancellation, and by its `Drop` on unwind.
    ///
    /// # Errors
    ///
    /// - [`HandlerError::WriteFailure`] if a step fails under
    ///   [`FailurePolicy::Abort`].
    /// - [`HandlerError::Cancelled`] if the cancel flag was raised.
    /// - [`HandlerError::Engine`] if the final close fails.
    pub fn run(&mut self, mut output: OutputVariable<'_>) -> Result<SequenceReport, HandlerError> {
        let mut report = SequenceReport::default();

        for index in 0..self.plan.time.len() {
            if self.cancel.is_cancelled() {
                warn!(variable = self.variable, step = index, "cancelled");
                self.finish(output);
                return Err(HandlerError::Cancelled {
                    variable: self.variable.to_string(),
                    last_success: self.last_success,
                });
            }

            self.state = SequencerState::Writing(index);
            match self.write_step(&mut output, index) {
                Ok(()) => {
                    self.last_success = Some(index);
                    report.written += 1;
                }
                Err(e) => match self.policy {
                    FailurePolicy::Continue => {
                        error!(variable = self.variable, step = index, error = %e, "skipping time step");
                        report.skipped.push(index);
                    }
                    FailurePolicy::Abort => {
                        error!(variable = self.variable, step = index, error = %e, "aborting");
                        self.finish(output);
                        return Err(HandlerError::WriteFailure {
                            variable: self.variable.to_string(),
                            step: index,
                            last_success: self.last_success,
                            reason: e.to_string(),
                        });
                    }
                },
            }
        }

        self.state = SequencerState::Closed;
        output.close().map_err(|source| HandlerError::Engine {
            variable: self.variable.to_string(),
            source,
        })?;

        info!(
            variable = self.variable,
            written = report.written,
            skipped = report.skipped.len(),
            "finished writing"
        );
        Ok(report)
    }

    /// Derive step `index` without writing it.
    fn derive_step(&self, index: usize) -> Result<TimeStep, DeriveError> {
        let slices: Vec<ArrayViewD<'_, f64>> = self
            .inputs
            .iter()
            .zip(&self.plan.layouts)
            .map(|(input, layout)| layout.slice(input.data(), index))
            .collect();
        let data = self.derivation.derive(&slices)?;
        Ok(TimeStep {
            index,
            value: self.plan.time.values[index],
            bounds: self.plan.time.bounds[index],
            data,
        })
    }

    fn write_step(&self, output: &mut OutputVariable<'_>, index: usize) -> Result<(), StepError> {
        let step = self.derive_step(index)?;
        output.write(&TimeSlice {
            data: step.data.view(),
            time: step.value,
            bounds: step.bounds,
        })?;
        debug!(variable = self.variable, step = step.index, "wrote time step");
        Ok(())
    }

    /// Close after an early stop. The close error is logged because the
    /// caller is already returning the cause of the stop.
    fn finish(&mut self, output: OutputVariable<'_>) {
        self.state = SequencerState::Closed;
        if let Err(e) = output.close() {
            warn!(variable = self.variable, error = %e, "close after early stop failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use e2c_cmor::{
        AxisDescriptor, Engine, FileAction, RecordingEngine, Session, VariableDecl,
    };
    use e2c_io::{Dimension, TimeUnits};
    use std::path::PathBuf;

    use super::*;
    use crate::axis::{SliceLayout, TimeAxis};

    const N_TIME: usize = 10;

    /// Ten steps on a 1x2 grid; step `i` holds `[i, 10 + i]`.
    fn fixture() -> (Vec<RawVariable>, AxisPlan) {
        let values: Vec<f64> = (0..N_TIME)
            .flat_map(|i| [i as f64, 10.0 + i as f64])
            .collect();
        let raw = RawVariable::new(
            "TS",
            vec![
                Dimension::new("time", N_TIME),
                Dimension::new("lat", 1),
                Dimension::new("lon", 2),
            ],
            values,
        )
        .unwrap();
        let units = TimeUnits::parse("days since 2000-01-01").unwrap();
        let plan = AxisPlan {
            descriptors: vec![
                AxisDescriptor::time(units.as_str()),
                AxisDescriptor::spatial("latitude", "degrees_north", vec![0.0], None),
                AxisDescriptor::spatial("longitude", "degrees_east", vec![0.0, 180.0], None),
            ],
            time: TimeAxis {
                units,
                values: (0..N_TIME).map(|i| i as f64 + 0.5).collect(),
                bounds: (0..N_TIME).map(|i| [i as f64, i as f64 + 1.0]).collect(),
            },
            layouts: vec![SliceLayout::new(0, vec![0, 1])],
        };
        (vec![raw], plan)
    }

    fn declare(engine: &mut RecordingEngine, plan: &AxisPlan) -> VariableDecl {
        engine
            .setup(&Session {
                tables_path: PathBuf::from("/tables"),
                file_action: FileAction::Replace,
                logfile: None,
            })
            .unwrap();
        engine.load_table("CMIP6_Amon.json").unwrap();
        let axes = plan
            .descriptors
            .iter()
            .map(|d| engine.axis(d).unwrap())
            .collect();
        VariableDecl {
            name: "ts".to_string(),
            units: "K".to_string(),
            axes,
            positive: None,
        }
    }

    fn run(
        engine: &mut RecordingEngine,
        policy: FailurePolicy,
        cancel: &CancelFlag,
    ) -> (Result<SequenceReport, HandlerError>, SequencerState) {
        let (inputs, plan) = fixture();
        let decl = declare(engine, &plan);
        let output = OutputVariable::declare(engine, &decl).unwrap();
        let mut seq = WriteSequencer::new("ts", &inputs, &plan, &Derivation::Identity, policy, cancel);
        assert_eq!(seq.state(), SequencerState::Opened);
        let result = seq.run(output);
        (result, seq.state())
    }

    #[test]
    fn writes_every_step_in_order() {
        let mut engine = RecordingEngine::new();
        let (result, state) = run(&mut engine, FailurePolicy::Continue, &CancelFlag::new());
        let report = result.unwrap();
        assert_eq!(report.written, N_TIME);
        assert!(report.skipped.is_empty());
        assert_eq!(state, SequencerState::Closed);

        let writes = engine.writes();
        assert_eq!(writes.len(), N_TIME);
        for (i, (time, data)) in writes.iter().enumerate() {
            assert_eq!(*time, i as f64 + 0.5);
            assert_eq!(*data, &[i as f64, 10.0 + i as f64]);
        }
        assert_eq!(engine.n_closes(), 1);
    }

    #[test]
    fn continue_skips_failed_step() {
        let mut engine = RecordingEngine::new().with_failing_write(3);
        let (result, _) = run(&mut engine, FailurePolicy::Continue, &CancelFlag::new());
        let report = result.unwrap();
        assert_eq!(report.written, N_TIME - 1);
        assert_eq!(report.skipped, vec![3]);
        assert_eq!(engine.n_writes(), N_TIME);
        assert_eq!(engine.n_closes(), 1);
    }

    #[test]
    fn abort_stops_at_failed_step() {
        let mut engine = RecordingEngine::new().with_failing_write(3);
        let (result, state) = run(&mut engine, FailurePolicy::Abort, &CancelFlag::new());
        match result.unwrap_err() {
            HandlerError::WriteFailure {
                step, last_success, ..
            } => {
                assert_eq!(step, 3);
                assert_eq!(last_success, Some(2));
            }
            other => panic!("expected WriteFailure, got {other:?}"),
        }
        assert_eq!(state, SequencerState::Closed);
        assert_eq!(engine.n_writes(), 4);
        assert_eq!(engine.n_closes(), 1);
    }

    #[test]
    fn cancelled_before_first_step() {
        let mut engine = RecordingEngine::new();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let (result, _) = run(&mut engine, FailurePolicy::Continue, &cancel);
        assert!(matches!(
            result,
            Err(HandlerError::Cancelled {
                last_success: None,
                ..
            })
        ));
        assert_eq!(engine.n_writes(), 0);
        assert_eq!(engine.n_closes(), 1);
    }

    #[test]
    fn derive_failure_is_a_step_failure() {
        let mut engine = RecordingEngine::new();
        let (inputs, plan) = fixture();
        let decl = declare(&mut engine, &plan);
        let output = OutputVariable::declare(&mut engine, &decl).unwrap();
        let cancel = CancelFlag::new();
        // Two inputs where identity expects one.
        let doubled = [inputs[0].clone(), inputs[0].clone()];
        let plan = AxisPlan {
            layouts: vec![plan.layouts[0].clone(), plan.layouts[0].clone()],
            ..plan
        };
        let mut seq = WriteSequencer::new(
            "ts",
            &doubled,
            &plan,
            &Derivation::Identity,
            FailurePolicy::Continue,
            &cancel,
        );
        let report = seq.run(output).unwrap();
        assert_eq!(report.written, 0);
        assert_eq!(report.skipped.len(), N_TIME);
        assert_eq!(seq.last_success(), None);
        assert_eq!(engine.n_writes(), 0);
        assert_eq!(engine.n_closes(), 1);
    }
}
