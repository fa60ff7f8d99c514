use std::path::PathBuf;

use serde::Deserialize;

/// Top-level e2c configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct E2cConfig {
    /// Input and output locations.
    #[serde(default)]
    pub paths: PathsToml,

    /// What to convert and how.
    #[serde(default)]
    pub run: RunToml,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathsToml {
    pub tables: Option<PathBuf>,
    pub user_input: Option<PathBuf>,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(default)]
    pub inputs: Vec<PathBuf>,
}

impl Default for PathsToml {
    fn default() -> Self {
        Self {
            tables: None,
            user_input: None,
            log_dir: default_log_dir(),
            inputs: Vec::new(),
        }
    }
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunToml {
    #[serde(default)]
    pub variables: Vec<String>,
    #[serde(default = "default_file_action")]
    pub file_action: String,
}

impl Default for RunToml {
    fn default() -> Self {
        Self {
            variables: Vec::new(),
            file_action: default_file_action(),
        }
    }
}

fn default_file_action() -> String {
    "replace".to_string()
}
