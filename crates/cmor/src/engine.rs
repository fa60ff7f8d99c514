//! The archival engine contract and the scoped output-variable handle.

use std::path::{Path, PathBuf};

use ndarray::ArrayViewD;
use tracing::warn;

use crate::decl::{AxisDescriptor, AxisId, VarId, VariableDecl};
use crate::error::EngineError;

/// What to do when the output file already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FileAction {
    /// Overwrite existing output.
    #[default]
    Replace,
    /// Refuse to touch existing output.
    Preserve,
    /// Append time slices to existing output.
    Append,
}

/// Per-invocation engine session settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Directory holding the CMIP6 JSON tables.
    pub tables_path: PathBuf,
    /// Existing-output policy.
    pub file_action: FileAction,
    /// Engine log destination for this session.
    pub logfile: Option<PathBuf>,
}

/// One time slice handed to [`Engine::write`].
#[derive(Debug, Clone)]
pub struct TimeSlice<'a> {
    /// Spatial data in declared axis order, time axis excluded.
    pub data: ArrayViewD<'a, f64>,
    /// Time coordinate value.
    pub time: f64,
    /// Time cell bounds.
    pub bounds: [f64; 2],
}

/// An archival serialization engine.
///
/// Calls follow `setup -> dataset_json -> load_table -> axis* -> variable ->
/// write* -> close`. The sequence is not reentrant: one handler drives an
/// engine at a time, which `&mut self` enforces.
pub trait Engine {
    /// Begin a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session log cannot be opened.
    fn setup(&mut self, session: &Session) -> Result<(), EngineError>;

    /// Supply the dataset description JSON.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::DatasetConfig`] if the document is unusable.
    fn dataset_json(&mut self, path: &Path) -> Result<(), EngineError>;

    /// Load a CMIP6 table by file name, making it current.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::TableLoad`] if the table cannot be loaded.
    fn load_table(&mut self, table: &str) -> Result<(), EngineError>;

    /// Declare an axis.
    ///
    /// # Errors
    ///
    /// Returns an error if no session or table is active.
    fn axis(&mut self, axis: &AxisDescriptor) -> Result<AxisId, EngineError>;

    /// Declare a variable over previously declared axes.
    ///
    /// # Errors
    ///
    /// Returns an error if the variable is not in the current table, its sign
    /// convention disagrees with the table, or an axis id is unknown.
    fn variable(&mut self, decl: &VariableDecl) -> Result<VarId, EngineError>;

    /// Write one time slice.
    ///
    /// # Errors
    ///
    /// Returns an error if the variable is unknown or closed, or the slice
    /// shape differs from the declared axes.
    fn write(&mut self, var: VarId, slice: &TimeSlice<'_>) -> Result<(), EngineError>;

    /// Release a variable, flushing its output.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AlreadyClosed`] on a second close.
    fn close(&mut self, var: VarId) -> Result<(), EngineError>;
}

/// A declared output variable, closed exactly once.
///
/// [`close`](Self::close) releases it explicitly and reports the outcome. If
/// the handle is dropped without that call (early return, `?`, or panic), the
/// drop closes it and logs any failure.
pub struct OutputVariable<'e> {
    engine: &'e mut dyn Engine,
    id: VarId,
    name: String,
    closed: bool,
}

impl<'e> OutputVariable<'e> {
    /// Declare `decl` on `engine` and take ownership of the resulting handle.
    ///
    /// # Errors
    ///
    /// Propagates the engine's declaration error; nothing needs closing then.
    pub fn declare(engine: &'e mut dyn Engine, decl: &VariableDecl) -> Result<Self, EngineError> {
        let id = engine.variable(decl)?;
        Ok(Self {
            engine,
            id,
            name: decl.name.clone(),
            closed: false,
        })
    }

    /// Engine id of this variable.
    pub fn id(&self) -> VarId {
        self.id
    }

    /// CMIP variable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Write one time slice.
    ///
    /// # Errors
    ///
    /// Propagates the engine's write error.
    pub fn write(&mut self, slice: &TimeSlice<'_>) -> Result<(), EngineError> {
        self.engine.write(self.id, slice)
    }

    /// Close the variable.
    ///
    /// # Errors
    ///
    /// Propagates the engine's close error. The handle counts as released
    /// either way.
    pub fn close(mut self) -> Result<(), EngineError> {
        self.closed = true;
        self.engine.close(self.id)
    }
}

impl Drop for OutputVariable<'_> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.engine.close(self.id) {
            warn!(variable = %self.name, error = %e, "failed to close output variable");
        }
    }
}

impl std::fmt::Debug for OutputVariable<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputVariable")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("closed", &self.closed)
            .finish()
    }
}
