//! NetCDF-backed [`SourceFile`].

use std::path::{Path, PathBuf};

use netcdf::AttributeValue;
use tracing::debug;

use crate::error::IoError;
use crate::raw::{Dimension, RawVariable};
use crate::source::{SourceFile, SourceReader};

/// Open a NetCDF file at `path`, returning [`IoError::FileNotFound`] if the
/// path does not exist on disk.
pub(crate) fn open_file(path: &Path) -> Result<netcdf::File, IoError> {
    if !path.exists() {
        return Err(IoError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    Ok(netcdf::open(path)?)
}

/// A model output file opened through the NetCDF library.
///
/// The handle is released when the value is dropped.
pub struct NetcdfSource {
    path: PathBuf,
    file: netcdf::File,
}

impl NetcdfSource {
    /// Open the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::FileNotFound`] if the path does not exist, or
    /// [`IoError::Netcdf`] if the library cannot open it.
    pub fn open(path: &Path) -> Result<Self, IoError> {
        let file = open_file(path)?;
        debug!(path = %path.display(), "opened source file");
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }
}

impl std::fmt::Debug for NetcdfSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetcdfSource")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SourceFile for NetcdfSource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn has_variable(&self, name: &str) -> bool {
        self.file.variable(name).is_some()
    }

    fn read_variable(&self, name: &str) -> Result<RawVariable, IoError> {
        let var = self
            .file
            .variable(name)
            .ok_or_else(|| IoError::MissingVariable {
                name: name.to_string(),
                path: self.path.clone(),
            })?;

        let dims: Vec<Dimension> = var
            .dimensions()
            .iter()
            .map(|d| Dimension::new(d.name(), d.len()))
            .collect();

        let mut values = var.get_values::<f64, _>(..)?;

        let missing: Vec<f64> = ["_FillValue", "missing_value"]
            .iter()
            .filter_map(|attr| numeric_attribute(&var, attr))
            .collect();
        if !missing.is_empty() {
            let mut n_masked = 0usize;
            for v in values.iter_mut() {
                if missing.contains(v) {
                    *v = f64::NAN;
                    n_masked += 1;
                }
            }
            debug!(variable = name, n_masked, "masked fill values");
        }

        let mut raw = RawVariable::new(name, dims, values)?;
        if let Some(units) = string_attribute(&var, "units") {
            raw = raw.with_units(units);
        }
        Ok(raw)
    }
}

/// Opens [`NetcdfSource`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetcdfReader;

impl SourceReader for NetcdfReader {
    fn open(&self, path: &Path) -> Result<Box<dyn SourceFile>, IoError> {
        Ok(Box::new(NetcdfSource::open(path)?))
    }
}

/// Read a string attribute, ignoring attributes of other types.
fn string_attribute(var: &netcdf::Variable<'_>, name: &str) -> Option<String> {
    match var.attribute_value(name)?.ok()? {
        AttributeValue::Str(s) => Some(s),
        _ => None,
    }
}

/// Read a scalar numeric attribute as `f64`.
fn numeric_attribute(var: &netcdf::Variable<'_>, name: &str) -> Option<f64> {
    match var.attribute_value(name)?.ok()? {
        AttributeValue::Double(v) => Some(v),
        AttributeValue::Float(v) => Some(f64::from(v)),
        AttributeValue::Int(v) => Some(f64::from(v)),
        AttributeValue::Short(v) => Some(f64::from(v)),
        AttributeValue::Doubles(v) => v.first().copied(),
        AttributeValue::Floats(v) => v.first().map(|&x| f64::from(x)),
        _ => None,
    }
}
