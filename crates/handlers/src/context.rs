//! Shared run configuration passed into every handler invocation.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use e2c_cmor::{FileAction, Session};

/// Cooperative cancellation flag, checked between time steps only.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Create an unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. In-flight writes complete first.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Returns `true` once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Configuration shared by every handler in a run.
#[derive(Debug, Clone)]
pub struct RunContext {
    tables_path: PathBuf,
    dataset_config: PathBuf,
    log_dir: PathBuf,
    file_action: FileAction,
    cancel: CancelFlag,
}

impl RunContext {
    /// Create a context. Logs go to `logs/` under the working directory by
    /// default.
    pub fn new(tables_path: impl Into<PathBuf>, dataset_config: impl Into<PathBuf>) -> Self {
        Self {
            tables_path: tables_path.into(),
            dataset_config: dataset_config.into(),
            log_dir: PathBuf::from("logs"),
            file_action: FileAction::default(),
            cancel: CancelFlag::new(),
        }
    }

    /// Set the per-invocation log directory.
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
    }

    /// Set the existing-output policy.
    pub fn with_file_action(mut self, action: FileAction) -> Self {
        self.file_action = action;
        self
    }

    /// Share a cancellation flag with the caller.
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Directory holding the CMIP6 tables.
    pub fn tables_path(&self) -> &Path {
        &self.tables_path
    }

    /// Dataset description JSON, passed through to the engine verbatim.
    pub fn dataset_config(&self) -> &Path {
        &self.dataset_config
    }

    /// Per-invocation log directory.
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Existing-output policy.
    pub fn file_action(&self) -> FileAction {
        self.file_action
    }

    /// Cancellation flag.
    pub fn cancel(&self) -> &CancelFlag {
        &self.cancel
    }

    /// Log file for the invocation producing `variable`.
    pub fn log_path_for(&self, variable: &str) -> PathBuf {
        self.log_dir.join(format!("{variable}.log"))
    }

    /// Engine session settings for the invocation producing `variable`.
    pub fn session_for(&self, variable: &str) -> Session {
        Session {
            tables_path: self.tables_path.clone(),
            file_action: self.file_action,
            logfile: Some(self.log_path_for(variable)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_uses_variable_log() {
        let ctx = RunContext::new("/tables", "/user.json").with_log_dir("/work/logs");
        let session = ctx.session_for("mrfso");
        assert_eq!(session.tables_path, PathBuf::from("/tables"));
        assert_eq!(session.file_action, FileAction::Replace);
        assert_eq!(session.logfile, Some(PathBuf::from("/work/logs/mrfso.log")));
    }

    #[test]
    fn cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let ctx = RunContext::new("/t", "/u").with_cancel(flag.clone());
        assert!(!ctx.cancel().is_cancelled());
        flag.cancel();
        assert!(ctx.cancel().is_cancelled());
    }
}
