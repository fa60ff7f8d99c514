//! An in-memory [`Engine`] that records calls instead of writing files.
//!
//! Used for dry runs and as the observation point in tests: the recorded
//! call log shows exactly which declarations and writes a handler issued, in
//! order. Failures can be injected at table load or at a given write.

use std::path::{Path, PathBuf};

use tracing::trace;

use crate::decl::{AxisDescriptor, AxisId, VarId, VariableDecl};
use crate::engine::{Engine, Session, TimeSlice};
use crate::error::EngineError;

/// One recorded engine call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    /// [`Engine::setup`].
    Setup(Session),
    /// [`Engine::dataset_json`].
    DatasetJson(PathBuf),
    /// [`Engine::load_table`].
    LoadTable(String),
    /// [`Engine::axis`].
    Axis(AxisDescriptor),
    /// [`Engine::variable`].
    Variable(VariableDecl),
    /// [`Engine::write`].
    Write {
        /// Target variable.
        var: VarId,
        /// Time value.
        time: f64,
        /// Time bounds.
        bounds: [f64; 2],
        /// Slice shape.
        shape: Vec<usize>,
        /// Slice values in row-major order.
        data: Vec<f64>,
    },
    /// [`Engine::close`].
    Close(VarId),
}

#[derive(Debug, Clone)]
struct VarState {
    name: String,
    shape: Vec<usize>,
    n_writes: usize,
    closed: bool,
}

/// Records engine calls. See the module docs.
#[derive(Debug, Clone, Default)]
pub struct RecordingEngine {
    calls: Vec<Call>,
    session: bool,
    table: Option<String>,
    axes: Vec<AxisDescriptor>,
    vars: Vec<VarState>,
    fail_table: Option<String>,
    fail_write_at: Option<usize>,
}

impl RecordingEngine {
    /// Create an engine that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make [`Engine::load_table`] fail for `table`.
    pub fn with_failing_table(mut self, table: impl Into<String>) -> Self {
        self.fail_table = Some(table.into());
        self
    }

    /// Make the write at 0-based per-variable time index `index` fail.
    pub fn with_failing_write(mut self, index: usize) -> Self {
        self.fail_write_at = Some(index);
        self
    }

    /// All recorded calls, in order.
    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    /// Forget recorded calls and declarations, keeping injected failures.
    pub fn reset(&mut self) {
        self.calls.clear();
        self.session = false;
        self.table = None;
        self.axes.clear();
        self.vars.clear();
    }

    /// Recorded writes as `(time, data)` pairs.
    pub fn writes(&self) -> Vec<(f64, &[f64])> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Write { time, data, .. } => Some((*time, data.as_slice())),
                _ => None,
            })
            .collect()
    }

    /// Number of recorded write calls.
    pub fn n_writes(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::Write { .. }))
            .count()
    }

    /// Number of recorded close calls.
    pub fn n_closes(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::Close(_)))
            .count()
    }

    /// Recorded axis declarations, in order.
    pub fn axes(&self) -> &[AxisDescriptor] {
        &self.axes
    }

    fn var_mut(&mut self, var: VarId) -> Result<&mut VarState, EngineError> {
        self.vars
            .get_mut(var.0)
            .ok_or(EngineError::UnknownVariableId { id: var.0 })
    }
}

impl Engine for RecordingEngine {
    fn setup(&mut self, session: &Session) -> Result<(), EngineError> {
        self.calls.push(Call::Setup(session.clone()));
        self.session = true;
        self.table = None;
        Ok(())
    }

    fn dataset_json(&mut self, path: &Path) -> Result<(), EngineError> {
        self.calls.push(Call::DatasetJson(path.to_path_buf()));
        if !self.session {
            return Err(EngineError::Session {
                reason: "dataset_json before setup".to_string(),
            });
        }
        Ok(())
    }

    fn load_table(&mut self, table: &str) -> Result<(), EngineError> {
        self.calls.push(Call::LoadTable(table.to_string()));
        if !self.session {
            return Err(EngineError::Session {
                reason: "load_table before setup".to_string(),
            });
        }
        if self.fail_table.as_deref() == Some(table) {
            return Err(EngineError::TableLoad {
                path: PathBuf::from(table),
                reason: "injected failure".to_string(),
            });
        }
        self.table = Some(table.to_string());
        Ok(())
    }

    fn axis(&mut self, axis: &AxisDescriptor) -> Result<AxisId, EngineError> {
        self.calls.push(Call::Axis(axis.clone()));
        if self.table.is_none() {
            return Err(EngineError::NoTableLoaded);
        }
        self.axes.push(axis.clone());
        Ok(AxisId(self.axes.len() - 1))
    }

    fn variable(&mut self, decl: &VariableDecl) -> Result<VarId, EngineError> {
        self.calls.push(Call::Variable(decl.clone()));
        if self.table.is_none() {
            return Err(EngineError::NoTableLoaded);
        }
        let mut shape = Vec::new();
        for id in &decl.axes {
            let axis = self
                .axes
                .get(id.0)
                .ok_or(EngineError::UnknownAxis { id: id.0 })?;
            if let Some(n) = axis.len() {
                shape.push(n);
            }
        }
        self.vars.push(VarState {
            name: decl.name.clone(),
            shape,
            n_writes: 0,
            closed: false,
        });
        Ok(VarId(self.vars.len() - 1))
    }

    fn write(&mut self, var: VarId, slice: &TimeSlice<'_>) -> Result<(), EngineError> {
        self.calls.push(Call::Write {
            var,
            time: slice.time,
            bounds: slice.bounds,
            shape: slice.data.shape().to_vec(),
            data: slice.data.iter().copied().collect(),
        });
        let fail_at = self.fail_write_at;
        let state = self.var_mut(var)?;
        if state.closed {
            return Err(EngineError::AlreadyClosed { id: var.0 });
        }
        let index = state.n_writes;
        state.n_writes += 1;
        if slice.data.shape() != state.shape.as_slice() {
            return Err(EngineError::ShapeMismatch {
                name: state.name.clone(),
                expected: state.shape.clone(),
                got: slice.data.shape().to_vec(),
            });
        }
        if fail_at == Some(index) {
            return Err(EngineError::WriteRejected {
                id: var.0,
                index,
                reason: "injected failure".to_string(),
            });
        }
        trace!(var = var.0, index, time = slice.time, "recorded write");
        Ok(())
    }

    fn close(&mut self, var: VarId) -> Result<(), EngineError> {
        self.calls.push(Call::Close(var));
        let state = self.var_mut(var)?;
        if state.closed {
            return Err(EngineError::AlreadyClosed { id: var.0 });
        }
        state.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ndarray::ArrayD;

    use super::*;
    use crate::engine::{FileAction, OutputVariable};

    fn session() -> Session {
        Session {
            tables_path: PathBuf::from("/tables"),
            file_action: FileAction::Replace,
            logfile: None,
        }
    }

    fn declared(engine: &mut RecordingEngine) -> VariableDecl {
        engine.setup(&session()).unwrap();
        engine.load_table("CMIP6_Amon.json").unwrap();
        let t = engine.axis(&AxisDescriptor::time("days since 1850-01-01")).unwrap();
        let lat = engine
            .axis(&AxisDescriptor::spatial("latitude", "degrees_north", vec![0.0, 1.0], None))
            .unwrap();
        VariableDecl {
            name: "clt".to_string(),
            units: "%".to_string(),
            axes: vec![t, lat],
            positive: None,
        }
    }

    #[test]
    fn axis_requires_table() {
        let mut engine = RecordingEngine::new();
        engine.setup(&session()).unwrap();
        let err = engine.axis(&AxisDescriptor::time("days since 1850-01-01")).unwrap_err();
        assert!(matches!(err, EngineError::NoTableLoaded));
    }

    #[test]
    fn injected_table_failure() {
        let mut engine = RecordingEngine::new().with_failing_table("CMIP6_Lmon.json");
        engine.setup(&session()).unwrap();
        assert!(engine.load_table("CMIP6_Amon.json").is_ok());
        assert!(matches!(
            engine.load_table("CMIP6_Lmon.json"),
            Err(EngineError::TableLoad { .. })
        ));
    }

    #[test]
    fn write_checks_shape() {
        let mut engine = RecordingEngine::new();
        let decl = declared(&mut engine);
        let id = engine.variable(&decl).unwrap();
        let good = ArrayD::<f64>::zeros(ndarray::IxDyn(&[2]));
        let bad = ArrayD::<f64>::zeros(ndarray::IxDyn(&[3]));
        let slice = |data| TimeSlice {
            data,
            time: 0.0,
            bounds: [0.0, 1.0],
        };
        assert!(engine.write(id, &slice(good.view())).is_ok());
        assert!(matches!(
            engine.write(id, &slice(bad.view())),
            Err(EngineError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn guard_closes_once_on_drop() {
        let mut engine = RecordingEngine::new();
        let decl = declared(&mut engine);
        {
            let _var = OutputVariable::declare(&mut engine, &decl).unwrap();
        }
        assert_eq!(engine.n_closes(), 1);
    }

    #[test]
    fn explicit_close_is_not_repeated_by_drop() {
        let mut engine = RecordingEngine::new();
        let decl = declared(&mut engine);
        let var = OutputVariable::declare(&mut engine, &decl).unwrap();
        var.close().unwrap();
        assert_eq!(engine.n_closes(), 1);
    }

    #[test]
    fn second_close_is_rejected() {
        let mut engine = RecordingEngine::new();
        let decl = declared(&mut engine);
        let id = engine.variable(&decl).unwrap();
        engine.close(id).unwrap();
        assert!(matches!(
            engine.close(id),
            Err(EngineError::AlreadyClosed { id: 0 })
        ));
    }
}
