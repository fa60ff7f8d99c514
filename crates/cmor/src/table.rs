//! CMIP6 JSON table loading.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::EngineError;

/// Missing value used when a table header does not define one.
pub const DEFAULT_MISSING_VALUE: f64 = 1.0e20;

#[derive(Debug, Deserialize)]
struct TableFile {
    #[serde(rename = "Header")]
    header: TableHeader,
    #[serde(default)]
    variable_entry: BTreeMap<String, VariableEntry>,
}

#[derive(Debug, Deserialize)]
struct TableHeader {
    table_id: String,
    #[serde(default)]
    missing_value: Option<serde_json::Value>,
}

/// One `variable_entry` of a CMIP6 table.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct VariableEntry {
    /// Canonical units.
    pub units: String,
    /// Required sign convention; empty when the variable has none.
    #[serde(default)]
    pub positive: String,
    /// Space-separated dimension table entries.
    #[serde(default)]
    pub dimensions: String,
    /// CF standard name.
    #[serde(default)]
    pub standard_name: String,
    /// Human-readable long name.
    #[serde(default)]
    pub long_name: String,
    /// Output variable name, when it differs from the entry key.
    #[serde(default)]
    pub out_name: Option<String>,
}

/// A loaded CMIP6 table such as `CMIP6_Amon.json`.
#[derive(Debug, Clone)]
pub struct CmorTable {
    path: PathBuf,
    table_id: String,
    missing_value: f64,
    variables: BTreeMap<String, VariableEntry>,
}

impl CmorTable {
    /// Load `name` from the `tables_path` directory.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::TableLoad`] if the file is missing or is not a
    /// CMIP6 table.
    pub fn load(tables_path: &Path, name: &str) -> Result<Self, EngineError> {
        let path = tables_path.join(name);
        let text = std::fs::read_to_string(&path).map_err(|e| EngineError::TableLoad {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let mut table = Self::parse(&text).map_err(|reason| EngineError::TableLoad {
            path: path.clone(),
            reason,
        })?;
        table.path = path;
        debug!(
            table = %table.table_id,
            n_variables = table.variables.len(),
            "loaded table"
        );
        Ok(table)
    }

    /// Parse table JSON text.
    fn parse(text: &str) -> Result<Self, String> {
        let file: TableFile = serde_json::from_str(text).map_err(|e| e.to_string())?;
        let table_id = file
            .header
            .table_id
            .strip_prefix("Table ")
            .unwrap_or(&file.header.table_id)
            .to_string();
        let missing_value = match file.header.missing_value {
            None => DEFAULT_MISSING_VALUE,
            Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(DEFAULT_MISSING_VALUE),
            Some(serde_json::Value::String(s)) => s
                .trim()
                .parse()
                .map_err(|_| format!("invalid missing_value '{s}'"))?,
            Some(other) => return Err(format!("invalid missing_value {other}")),
        };
        Ok(Self {
            path: PathBuf::new(),
            table_id,
            missing_value,
            variables: file.variable_entry,
        })
    }

    /// Short table identifier, e.g. `Amon`.
    pub fn table_id(&self) -> &str {
        &self.table_id
    }

    /// File the table was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Value written in place of NaN.
    pub fn missing_value(&self) -> f64 {
        self.missing_value
    }

    /// Look up a variable entry.
    pub fn variable(&self, name: &str) -> Option<&VariableEntry> {
        self.variables.get(name)
    }
}
