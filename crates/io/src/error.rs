//! Error types for e2c-io.

use std::path::PathBuf;

/// Error type for all fallible operations in the e2c-io crate.
///
/// Covers missing files, failures reported by the NetCDF library, and
/// structural problems with the variables read from a model output file.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// Returned when a required file does not exist on disk.
    #[error("file not found: {}", path.display())]
    FileNotFound {
        /// Path that could not be found.
        path: PathBuf,
    },

    /// Wraps an error originating from the NetCDF library.
    #[error("netcdf error: {reason}")]
    Netcdf {
        /// Description of the underlying NetCDF failure.
        reason: String,
    },

    /// Returned when a required variable is not present in a file.
    #[error("variable '{name}' not found in {}", path.display())]
    MissingVariable {
        /// Name of the missing variable.
        name: String,
        /// Path to the file that was inspected.
        path: PathBuf,
    },

    /// Returned when a dimension has an unexpected size or count.
    #[error("dimension '{name}' mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Name of the dimension (or variable) being checked.
        name: String,
        /// Expected size.
        expected: usize,
        /// Actual size.
        got: usize,
    },

    /// Returned when a time units string cannot be parsed.
    #[error("invalid time: {reason}")]
    InvalidTime {
        /// Description of the time parsing issue.
        reason: String,
    },
}

impl From<netcdf::Error> for IoError {
    fn from(e: netcdf::Error) -> Self {
        IoError::Netcdf {
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_file_not_found() {
        let err = IoError::FileNotFound {
            path: PathBuf::from("/tmp/missing.nc"),
        };
        assert_eq!(err.to_string(), "file not found: /tmp/missing.nc");
    }

    #[test]
    fn display_missing_variable() {
        let err = IoError::MissingVariable {
            name: "SOILICE".to_string(),
            path: PathBuf::from("/data/elm.h0.nc"),
        };
        assert_eq!(
            err.to_string(),
            "variable 'SOILICE' not found in /data/elm.h0.nc"
        );
    }

    #[test]
    fn display_dimension_mismatch() {
        let err = IoError::DimensionMismatch {
            name: "lat_bnds".to_string(),
            expected: 2,
            got: 3,
        };
        assert_eq!(
            err.to_string(),
            "dimension 'lat_bnds' mismatch: expected 2, got 3"
        );
    }

    #[test]
    fn display_invalid_time() {
        let err = IoError::InvalidTime {
            reason: "no 'since' keyword".to_string(),
        };
        assert_eq!(err.to_string(), "invalid time: no 'since' keyword");
    }

    #[test]
    fn from_netcdf_error() {
        let nc_err = netcdf::Error::Str("test nc error".to_string());
        let err: IoError = nc_err.into();
        assert!(matches!(err, IoError::Netcdf { .. }));
        assert!(err.to_string().contains("test nc error"));
    }

    #[test]
    fn error_is_send_sync_and_std_error() {
        fn assert_bounds<T: Send + Sync + std::error::Error>() {}
        assert_bounds::<IoError>();
    }
}
