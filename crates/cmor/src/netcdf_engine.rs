//! NetCDF-backed [`Engine`].
//!
//! Writes one CF/CMIP-style NetCDF file per declared variable under the
//! dataset `outpath`, with an unlimited time dimension extended one slice per
//! write. Coordinate axes are written up front from the axis declarations.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::dataset::DatasetConfig;
use crate::decl::{AxisDescriptor, AxisId, VarId, VariableDecl};
use crate::engine::{Engine, FileAction, Session, TimeSlice};
use crate::error::EngineError;
use crate::table::CmorTable;

/// Name of the bounds dimension in written files.
const BNDS_DIM: &str = "bnds";

struct OpenVar {
    name: String,
    path: PathBuf,
    file: Option<netcdf::FileMut>,
    shape: Vec<usize>,
    missing_value: f64,
    n_written: usize,
}

/// Writes declared variables to NetCDF files. See the module docs.
#[derive(Default)]
pub struct NetcdfEngine {
    session: Option<Session>,
    log: Option<File>,
    dataset: Option<DatasetConfig>,
    table: Option<CmorTable>,
    axes: Vec<AxisDescriptor>,
    /// Keyed by `VarId`; closed entries are dropped on the next `setup`.
    vars: BTreeMap<usize, OpenVar>,
    next_var: usize,
}

impl NetcdfEngine {
    /// Create an engine with no active session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Path of the file written for a declared variable, until the next
    /// session drops it if closed.
    pub fn output_path(&self, var: VarId) -> Option<&Path> {
        self.vars.get(&var.0).map(|v| v.path.as_path())
    }

    fn log_line(&mut self, line: std::fmt::Arguments<'_>) -> Result<(), EngineError> {
        if let Some(log) = self.log.as_mut() {
            writeln!(log, "{line}")?;
        }
        Ok(())
    }

    fn session(&self) -> Result<&Session, EngineError> {
        self.session.as_ref().ok_or_else(|| EngineError::Session {
            reason: "no active session".to_string(),
        })
    }

    fn open_output(&self, path: &Path) -> Result<(netcdf::FileMut, bool), EngineError> {
        let action = self.session()?.file_action;
        let exists = path.exists();
        match action {
            FileAction::Preserve if exists => Err(EngineError::OutputExists {
                path: path.to_path_buf(),
            }),
            FileAction::Append if exists => Ok((netcdf::append(path)?, true)),
            _ => Ok((netcdf::create(path)?, false)),
        }
    }
}

impl std::fmt::Debug for NetcdfEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetcdfEngine")
            .field("session", &self.session)
            .field("n_axes", &self.axes.len())
            .field("open_vars", &self.vars.values().filter(|v| v.file.is_some()).count())
            .finish_non_exhaustive()
    }
}

impl Engine for NetcdfEngine {
    fn setup(&mut self, session: &Session) -> Result<(), EngineError> {
        self.log = match &session.logfile {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                Some(File::create(path)?)
            }
            None => None,
        };
        self.session = Some(session.clone());
        self.dataset = None;
        self.table = None;
        self.axes.clear();
        self.vars.retain(|_, v| v.file.is_some());
        self.log_line(format_args!(
            "setup tables={} action={:?}",
            session.tables_path.display(),
            session.file_action
        ))
    }

    fn dataset_json(&mut self, path: &Path) -> Result<(), EngineError> {
        self.session()?;
        let dataset = DatasetConfig::load(path)?;
        self.log_line(format_args!(
            "dataset source_id={} experiment_id={}",
            dataset.source_id, dataset.experiment_id
        ))?;
        self.dataset = Some(dataset);
        Ok(())
    }

    fn load_table(&mut self, table: &str) -> Result<(), EngineError> {
        let tables_path = self.session()?.tables_path.clone();
        let loaded = CmorTable::load(&tables_path, table)?;
        self.log_line(format_args!("load_table {}", loaded.path().display()))?;
        self.table = Some(loaded);
        Ok(())
    }

    fn axis(&mut self, axis: &AxisDescriptor) -> Result<AxisId, EngineError> {
        if self.table.is_none() {
            return Err(EngineError::NoTableLoaded);
        }
        self.axes.push(axis.clone());
        self.log_line(format_args!(
            "axis {} units={} len={:?}",
            axis.table_entry,
            axis.units,
            axis.len()
        ))?;
        Ok(AxisId(self.axes.len() - 1))
    }

    fn variable(&mut self, decl: &VariableDecl) -> Result<VarId, EngineError> {
        let table = self.table.as_ref().ok_or(EngineError::NoTableLoaded)?;
        let dataset = self.dataset.as_ref().ok_or_else(|| EngineError::Session {
            reason: "variable declared before dataset_json".to_string(),
        })?;

        let entry = table
            .variable(&decl.name)
            .ok_or_else(|| EngineError::UnknownTableEntry {
                name: decl.name.clone(),
                table: table.table_id().to_string(),
            })?;
        if !entry.positive.is_empty()
            && decl.positive.map(|p| p.as_str()) != Some(entry.positive.as_str())
        {
            return Err(EngineError::PositiveMismatch {
                name: decl.name.clone(),
                expected: entry.positive.clone(),
                got: decl.positive.map(|p| p.to_string()),
            });
        }
        if entry.units != decl.units {
            warn!(
                variable = %decl.name,
                table_units = %entry.units,
                units = %decl.units,
                "declared units differ from table"
            );
        }

        let axes: Vec<AxisDescriptor> = decl
            .axes
            .iter()
            .map(|id| {
                self.axes
                    .get(id.0)
                    .cloned()
                    .ok_or(EngineError::UnknownAxis { id: id.0 })
            })
            .collect::<Result<_, _>>()?;
        let time_axis = axes.iter().find(|a| a.is_time());
        let spatial: Vec<&AxisDescriptor> = axes.iter().filter(|a| !a.is_time()).collect();
        let shape: Vec<usize> = spatial.iter().filter_map(|a| a.len()).collect();

        std::fs::create_dir_all(&dataset.outpath)?;
        let path = dataset
            .outpath
            .join(dataset.file_name(&decl.name, table.table_id()));
        let table_id = table.table_id().to_string();
        let missing_value = table.missing_value();
        let entry = entry.clone();
        let dataset = dataset.clone();

        let (mut file, appending) = self.open_output(&path)?;
        let n_written = if appending {
            file.dimension("time").map_or(0, |d| d.len())
        } else {
            file.add_unlimited_dimension("time")?;
            file.add_dimension(BNDS_DIM, 2)?;

            if let Some(t) = time_axis {
                {
                    let mut var = file.add_variable::<f64>("time", &["time"])?;
                    var.put_attribute("units", t.units.as_str())?;
                    var.put_attribute("bounds", "time_bnds")?;
                    var.put_attribute("axis", "T")?;
                }
                file.add_variable::<f64>("time_bnds", &["time", BNDS_DIM])?;
            }

            for axis in &spatial {
                let name = axis.out_name();
                let bnds_name = format!("{name}_bnds");
                let values = axis.coord_vals.clone().unwrap_or_default();
                file.add_dimension(name, values.len())?;
                {
                    let mut var = file.add_variable::<f64>(name, &[name])?;
                    var.put_attribute("units", axis.units.as_str())?;
                    if axis.cell_bounds.is_some() {
                        var.put_attribute("bounds", bnds_name.as_str())?;
                    }
                    var.put_values(&values, ..)?;
                }
                if let Some(bounds) = &axis.cell_bounds {
                    let flat: Vec<f64> = bounds.iter().flat_map(|b| [b[0], b[1]]).collect();
                    let mut bvar = file.add_variable::<f64>(&bnds_name, &[name, BNDS_DIM])?;
                    bvar.put_values(&flat, ..)?;
                }
            }

            let mut dims: Vec<&str> = Vec::with_capacity(spatial.len() + 1);
            if time_axis.is_some() {
                dims.push("time");
            }
            dims.extend(spatial.iter().map(|a| a.out_name()));
            {
                let mut var = file.add_variable::<f64>(&decl.name, &dims)?;
                var.put_attribute("units", decl.units.as_str())?;
                var.put_attribute("_FillValue", missing_value)?;
                var.put_attribute("missing_value", missing_value)?;
                if !entry.standard_name.is_empty() {
                    var.put_attribute("standard_name", entry.standard_name.as_str())?;
                }
                if !entry.long_name.is_empty() {
                    var.put_attribute("long_name", entry.long_name.as_str())?;
                }
                if let Some(p) = decl.positive {
                    var.put_attribute("positive", p.as_str())?;
                }
            }

            file.add_attribute("Conventions", "CF-1.7 CMIP-6.2")?;
            file.add_attribute("table_id", table_id.as_str())?;
            file.add_attribute("variable_id", decl.name.as_str())?;
            file.add_attribute("experiment_id", dataset.experiment_id.as_str())?;
            file.add_attribute("source_id", dataset.source_id.as_str())?;
            file.add_attribute("institution_id", dataset.institution_id.as_str())?;
            file.add_attribute("variant_label", dataset.variant_label.as_str())?;
            file.add_attribute("grid_label", dataset.grid_label.as_str())?;
            for (key, value) in dataset.global_attributes() {
                file.add_attribute(key, value.as_str())?;
            }
            0
        };

        info!(variable = %decl.name, path = %path.display(), appending, "declared output variable");
        let id = VarId(self.next_var);
        self.next_var += 1;
        self.vars.insert(
            id.0,
            OpenVar {
                name: decl.name.clone(),
                path,
                file: Some(file),
                shape,
                missing_value,
                n_written,
            },
        );
        self.log_line(format_args!("variable {} id={}", decl.name, id.0))?;
        Ok(id)
    }

    fn write(&mut self, var: VarId, slice: &TimeSlice<'_>) -> Result<(), EngineError> {
        let state = self
            .vars
            .get_mut(&var.0)
            .ok_or(EngineError::UnknownVariableId { id: var.0 })?;
        let file = state
            .file
            .as_mut()
            .ok_or(EngineError::AlreadyClosed { id: var.0 })?;
        if slice.data.shape() != state.shape.as_slice() {
            return Err(EngineError::ShapeMismatch {
                name: state.name.clone(),
                expected: state.shape.clone(),
                got: slice.data.shape().to_vec(),
            });
        }

        let index = state.n_written;
        let mv = state.missing_value;
        let values: Vec<f64> = slice
            .data
            .iter()
            .map(|&v| if v.is_nan() { mv } else { v })
            .collect();

        if let Some(mut t) = file.variable_mut("time") {
            t.put_values(&[slice.time], (index,))?;
        }
        if let Some(mut tb) = file.variable_mut("time_bnds") {
            tb.put_values(&slice.bounds, (index, ..))?;
        }
        {
            let mut data_var =
                file.variable_mut(&state.name)
                    .ok_or_else(|| EngineError::WriteRejected {
                        id: var.0,
                        index,
                        reason: format!("variable '{}' missing from output file", state.name),
                    })?;
            match state.shape.len() {
                1 => data_var.put_values(&values, (index, ..))?,
                2 => data_var.put_values(&values, (index, .., ..))?,
                3 => data_var.put_values(&values, (index, .., .., ..))?,
                rank => {
                    return Err(EngineError::WriteRejected {
                        id: var.0,
                        index,
                        reason: format!("unsupported spatial rank {rank}"),
                    });
                }
            }
        }
        state.n_written += 1;
        debug!(variable = %state.name, index, time = slice.time, "wrote time slice");
        self.log_line(format_args!("write id={} index={index} time={}", var.0, slice.time))
    }

    fn close(&mut self, var: VarId) -> Result<(), EngineError> {
        let state = self
            .vars
            .get_mut(&var.0)
            .ok_or(EngineError::UnknownVariableId { id: var.0 })?;
        let file = state
            .file
            .take()
            .ok_or(EngineError::AlreadyClosed { id: var.0 })?;
        drop(file);
        let (name, n_written) = (state.name.clone(), state.n_written);
        info!(variable = %name, n_written, "closed output variable");
        self.log_line(format_args!("close {name} slices={n_written}"))
    }
}
