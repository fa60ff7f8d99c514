//! User-supplied dataset description (the `--user-input` JSON).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::EngineError;

/// Archival metadata shared by every variable written in a run.
///
/// The well-known keys are parsed; every other string or number is kept in
/// `extra` and copied onto the output file as a global attribute.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DatasetConfig {
    /// Directory output files are written under.
    #[serde(default = "default_outpath")]
    pub outpath: PathBuf,
    /// CMIP6 experiment identifier, e.g. `historical`.
    pub experiment_id: String,
    /// Model identifier, e.g. `E3SM-1-0`.
    pub source_id: String,
    /// Institution identifier.
    #[serde(default)]
    pub institution_id: String,
    /// Ensemble member label, e.g. `r1i1p1f1`.
    #[serde(default = "default_variant_label")]
    pub variant_label: String,
    /// Grid label.
    #[serde(default = "default_grid_label")]
    pub grid_label: String,
    /// Remaining keys.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn default_outpath() -> PathBuf {
    PathBuf::from("CMIP6")
}
fn default_variant_label() -> String {
    "r1i1p1f1".to_string()
}
fn default_grid_label() -> String {
    "gr".to_string()
}

impl DatasetConfig {
    /// Read and parse the dataset JSON at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::DatasetConfig`] if the file cannot be read or
    /// lacks the required keys.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let text = std::fs::read_to_string(path).map_err(|e| EngineError::DatasetConfig {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&text).map_err(|e| EngineError::DatasetConfig {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Output file name for `variable` in `table_id`.
    pub fn file_name(&self, variable: &str, table_id: &str) -> String {
        format!(
            "{variable}_{table_id}_{}_{}_{}_{}.nc",
            self.source_id, self.experiment_id, self.variant_label, self.grid_label
        )
    }

    /// Extra keys rendered as attribute strings. Nested values are skipped.
    pub fn global_attributes(&self) -> impl Iterator<Item = (&str, String)> {
        self.extra.iter().filter_map(|(k, v)| match v {
            serde_json::Value::String(s) => Some((k.as_str(), s.clone())),
            serde_json::Value::Number(n) => Some((k.as_str(), n.to_string())),
            serde_json::Value::Bool(b) => Some((k.as_str(), b.to_string())),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_and_extra_keys() {
        let cfg: DatasetConfig = serde_json::from_str(
            r#"{"experiment_id": "historical", "source_id": "E3SM-1-0",
                "institution_id": "E3SM-Project", "outpath": "/out",
                "activity_id": "CMIP", "forcing_index": 1, "nested": {"a": 1}}"#,
        )
        .unwrap();
        assert_eq!(cfg.outpath, PathBuf::from("/out"));
        assert_eq!(cfg.variant_label, "r1i1p1f1");
        let attrs: Vec<(&str, String)> = cfg.global_attributes().collect();
        assert_eq!(
            attrs,
            vec![
                ("activity_id", "CMIP".to_string()),
                ("forcing_index", "1".to_string())
            ]
        );
    }

    #[test]
    fn file_name_layout() {
        let cfg: DatasetConfig =
            serde_json::from_str(r#"{"experiment_id": "piControl", "source_id": "E3SM-1-0"}"#)
                .unwrap();
        assert_eq!(
            cfg.file_name("clt", "Amon"),
            "clt_Amon_E3SM-1-0_piControl_r1i1p1f1_gr.nc"
        );
    }

    #[test]
    fn missing_required_key_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user_input.json");
        std::fs::write(&path, r#"{"source_id": "E3SM-1-0"}"#).unwrap();
        let err = DatasetConfig::load(&path).unwrap_err();
        assert!(matches!(err, EngineError::DatasetConfig { .. }));
    }
}
