//! Pure conversion functions: TOML config and CLI flags -> run settings.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};

use e2c_cmor::FileAction;

use crate::cli::RunArgs;
use crate::config::E2cConfig;

/// Extension of model output files picked up from input directories.
const NETCDF_EXTENSION: &str = "nc";

/// Everything `run` needs, after CLI flags override the config file.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub variables: Vec<String>,
    pub inputs: Vec<PathBuf>,
    pub tables: PathBuf,
    pub user_input: PathBuf,
    pub log_dir: PathBuf,
    pub file_action: FileAction,
    pub dry_run: bool,
}

/// Parses a file action name into the corresponding enum variant.
pub fn parse_file_action(s: &str) -> Result<FileAction> {
    match s.to_lowercase().as_str() {
        "replace" => Ok(FileAction::Replace),
        "preserve" => Ok(FileAction::Preserve),
        "append" => Ok(FileAction::Append),
        other => bail!("unknown file action: {other:?}"),
    }
}

/// Merges CLI flags over the TOML configuration.
pub fn build_run_settings(args: &RunArgs, config: &E2cConfig) -> Result<RunSettings> {
    let variables = if args.var_list.is_empty() {
        config.run.variables.clone()
    } else {
        args.var_list.clone()
    };
    let inputs = if args.inputs.is_empty() {
        config.paths.inputs.clone()
    } else {
        args.inputs.clone()
    };
    let tables = args
        .tables_path
        .clone()
        .or_else(|| config.paths.tables.clone())
        .ok_or_else(|| anyhow!("no tables path: use --tables-path or set [paths].tables"))?;
    let user_input = args
        .user_input
        .clone()
        .or_else(|| config.paths.user_input.clone())
        .ok_or_else(|| {
            anyhow!("no dataset description: use --user-input or set [paths].user_input")
        })?;
    let log_dir = args
        .logdir
        .clone()
        .unwrap_or_else(|| config.paths.log_dir.clone());
    let file_action =
        parse_file_action(args.file_action.as_deref().unwrap_or(&config.run.file_action))?;

    Ok(RunSettings {
        variables,
        inputs,
        tables,
        user_input,
        log_dir,
        file_action,
        dry_run: args.dry_run,
    })
}

/// Expands directories to their `*.nc` files, sorted by name.
///
/// Plain paths are passed through unchanged, including paths that do not
/// exist; the dispatcher reports those per variable.
pub fn expand_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for path in inputs {
        if path.is_dir() {
            out.extend(netcdf_files(path)?);
        } else {
            out.push(path.clone());
        }
    }
    Ok(out)
}

fn netcdf_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read input directory: {}", dir.display()))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("failed to read input directory: {}", dir.display()))?
            .path();
        if path.is_file() && path.extension().is_some_and(|e| e == NETCDF_EXTENSION) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> RunArgs {
        RunArgs {
            config: None,
            var_list: Vec::new(),
            inputs: Vec::new(),
            tables_path: None,
            user_input: None,
            logdir: None,
            file_action: None,
            dry_run: false,
        }
    }

    #[test]
    fn file_actions() {
        assert_eq!(parse_file_action("Replace").unwrap(), FileAction::Replace);
        assert_eq!(parse_file_action("preserve").unwrap(), FileAction::Preserve);
        assert_eq!(parse_file_action("APPEND").unwrap(), FileAction::Append);
        assert!(parse_file_action("overwrite").is_err());
    }

    #[test]
    fn flags_override_config() {
        let config: E2cConfig = toml::from_str(
            r#"
            [paths]
            tables = "/cfg/tables"
            user_input = "/cfg/user.json"
            [run]
            variables = ["ts"]
            file_action = "preserve"
            "#,
        )
        .unwrap();
        let mut a = args();
        a.var_list = vec!["mrfso".to_string()];
        a.tables_path = Some(PathBuf::from("/cli/tables"));

        let s = build_run_settings(&a, &config).unwrap();
        assert_eq!(s.variables, vec!["mrfso"]);
        assert_eq!(s.tables, PathBuf::from("/cli/tables"));
        assert_eq!(s.user_input, PathBuf::from("/cfg/user.json"));
        assert_eq!(s.log_dir, PathBuf::from("logs"));
        assert_eq!(s.file_action, FileAction::Preserve);
    }

    #[test]
    fn tables_path_is_required() {
        let mut a = args();
        a.user_input = Some(PathBuf::from("/u.json"));
        let err = build_run_settings(&a, &E2cConfig::default()).unwrap_err();
        assert!(err.to_string().contains("--tables-path"));
    }

    #[test]
    fn directories_expand_to_sorted_netcdf_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.nc", "a.nc", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let single = PathBuf::from("/elsewhere/c.nc");
        let out = expand_inputs(&[dir.path().to_path_buf(), single.clone()]).unwrap();
        assert_eq!(
            out,
            vec![dir.path().join("a.nc"), dir.path().join("b.nc"), single]
        );
    }
}
