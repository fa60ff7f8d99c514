//! Error types for e2c-cmor.

use std::path::PathBuf;

/// Error type for all fallible engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Returned when an operation needs a session that was never set up.
    #[error("engine session not set up: {reason}")]
    Session {
        /// What was attempted.
        reason: String,
    },

    /// Returned when the dataset description cannot be read or parsed.
    #[error("invalid dataset config {}: {reason}", path.display())]
    DatasetConfig {
        /// Path to the dataset JSON.
        path: PathBuf,
        /// Description of the failure.
        reason: String,
    },

    /// Returned when a CMIP6 table cannot be loaded.
    #[error("unable to load table {}: {reason}", path.display())]
    TableLoad {
        /// Path the table was looked up at.
        path: PathBuf,
        /// Description of the failure.
        reason: String,
    },

    /// Returned when a declaration precedes any table load.
    #[error("no table loaded")]
    NoTableLoaded,

    /// Returned when a variable is not listed in the loaded table.
    #[error("variable '{name}' not found in table {table}")]
    UnknownTableEntry {
        /// Requested variable name.
        name: String,
        /// Table identifier.
        table: String,
    },

    /// Returned when the table requires a sign convention that was not given,
    /// or a different one was given.
    #[error("variable '{name}' requires positive='{expected}', got {got:?}")]
    PositiveMismatch {
        /// Variable name.
        name: String,
        /// Convention required by the table.
        expected: String,
        /// Convention supplied by the caller.
        got: Option<String>,
    },

    /// Returned when a variable references an axis id that was never declared.
    #[error("unknown axis id {id}")]
    UnknownAxis {
        /// The offending id.
        id: usize,
    },

    /// Returned when an operation references an unknown variable id.
    #[error("unknown variable id {id}")]
    UnknownVariableId {
        /// The offending id.
        id: usize,
    },

    /// Returned when a variable handle is used after it was closed.
    #[error("variable id {id} already closed")]
    AlreadyClosed {
        /// The closed id.
        id: usize,
    },

    /// Returned when a slice does not match the declared spatial shape.
    #[error("shape mismatch for '{name}': declared {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Variable name.
        name: String,
        /// Declared shape of one time slice.
        expected: Vec<usize>,
        /// Shape supplied to the write.
        got: Vec<usize>,
    },

    /// Returned when the output file already exists and the file action
    /// forbids replacing it.
    #[error("output file exists: {}", path.display())]
    OutputExists {
        /// Existing file.
        path: PathBuf,
    },

    /// Returned when a write is rejected by the engine itself.
    #[error("write rejected for variable id {id} at time index {index}: {reason}")]
    WriteRejected {
        /// Variable id.
        id: usize,
        /// Time index of the rejected write.
        index: usize,
        /// Description of the rejection.
        reason: String,
    },

    /// Wraps an error originating from the NetCDF library.
    #[error("netcdf error: {reason}")]
    Netcdf {
        /// Description of the underlying NetCDF failure.
        reason: String,
    },

    /// Wraps a file-system error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<netcdf::Error> for EngineError {
    fn from(e: netcdf::Error) -> Self {
        EngineError::Netcdf {
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_table_load() {
        let err = EngineError::TableLoad {
            path: PathBuf::from("/tables/CMIP6_Amon.json"),
            reason: "not found".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "unable to load table /tables/CMIP6_Amon.json: not found"
        );
    }

    #[test]
    fn display_unknown_table_entry() {
        let err = EngineError::UnknownTableEntry {
            name: "mrfso".to_string(),
            table: "Amon".to_string(),
        };
        assert_eq!(err.to_string(), "variable 'mrfso' not found in table Amon");
    }

    #[test]
    fn display_shape_mismatch() {
        let err = EngineError::ShapeMismatch {
            name: "clt".to_string(),
            expected: vec![2, 2],
            got: vec![2, 3],
        };
        assert_eq!(
            err.to_string(),
            "shape mismatch for 'clt': declared [2, 2], got [2, 3]"
        );
    }

    #[test]
    fn display_positive_mismatch() {
        let err = EngineError::PositiveMismatch {
            name: "tauv".to_string(),
            expected: "down".to_string(),
            got: None,
        };
        assert_eq!(
            err.to_string(),
            "variable 'tauv' requires positive='down', got None"
        );
    }

    #[test]
    fn from_netcdf_error() {
        let err: EngineError = netcdf::Error::Str("bad header".to_string()).into();
        assert!(matches!(err, EngineError::Netcdf { .. }));
    }

    #[test]
    fn error_is_send_sync_and_std_error() {
        fn assert_bounds<T: Send + Sync + std::error::Error>() {}
        assert_bounds::<EngineError>();
    }
}
