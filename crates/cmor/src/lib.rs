//! # e2c-cmor
//!
//! The archival serialization engine seam. The conversion pipeline talks to
//! an [`Engine`] through a fixed call sequence:
//!
//! ```text
//! setup -> dataset_json -> load_table -> axis* -> variable -> write* -> close
//! ```
//!
//! Two engines are provided:
//!
//! - [`NetcdfEngine`] writes CMIP6-style NetCDF files, validating variables
//!   against the loaded CMIP6 JSON table.
//! - [`RecordingEngine`] records every call in memory, for dry runs and tests.
//!
//! [`OutputVariable`] wraps a declared variable so it is closed exactly once
//! on every exit path.

mod dataset;
mod decl;
mod engine;
mod error;
mod netcdf_engine;
mod recording;
mod table;

pub use dataset::DatasetConfig;
pub use decl::{AxisDescriptor, AxisId, Positive, VarId, VariableDecl};
pub use engine::{Engine, FileAction, OutputVariable, Session, TimeSlice};
pub use error::EngineError;
pub use netcdf_engine::NetcdfEngine;
pub use recording::{Call, RecordingEngine};
pub use table::{CmorTable, DEFAULT_MISSING_VALUE, VariableEntry};
