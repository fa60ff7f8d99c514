//! Handler lookup and dispatch.

use std::collections::BTreeMap;
use std::path::PathBuf;

use e2c_cmor::Engine;
use e2c_io::{IoError, SourceFile, SourceReader};
use tracing::{error, info, info_span, warn};

use crate::context::RunContext;
use crate::error::HandlerError;
use crate::handler::{HandlerInputs, HandlerOutcome, handle};
use crate::spec::HandlerSpec;

/// Request keyword that expands to every registered handler.
pub const ALL: &str = "all";

/// Handler specs keyed by CMIP variable name.
#[derive(Debug, Clone, Default)]
pub struct HandlerRegistry {
    handlers: BTreeMap<String, HandlerSpec>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `spec` under its name. A later registration replaces an
    /// earlier one with the same name.
    pub fn register(&mut self, spec: HandlerSpec) {
        let name = spec.name().to_string();
        if self.handlers.insert(name.clone(), spec).is_some() {
            warn!(variable = %name, "replacing registered handler");
        }
    }

    /// Look up a handler.
    pub fn get(&self, name: &str) -> Option<&HandlerSpec> {
        self.handlers.get(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }

    /// Registered specs, sorted by name.
    pub fn specs(&self) -> impl Iterator<Item = &HandlerSpec> {
        self.handlers.values()
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Expand a user request into variable names.
    ///
    /// [`ALL`] expands to every registered name. Duplicates are dropped and
    /// the first occurrence keeps its place. Unregistered names are kept so
    /// that dispatch reports them.
    pub fn resolve_request<S: AsRef<str>>(&self, requested: &[S]) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for name in requested.iter().map(|s| s.as_ref().trim()) {
            if name.is_empty() {
                continue;
            }
            if name == ALL {
                for n in self.handlers.keys() {
                    if !out.contains(n) {
                        out.push(n.clone());
                    }
                }
            } else if !out.iter().any(|o| o == name) {
                out.push(name.to_string());
            }
        }
        out
    }
}

/// Per-run outcome of [`Dispatcher::dispatch_all`].
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Variables produced, in dispatch order.
    pub produced: Vec<HandlerOutcome>,
    /// Variables that failed, with the reason.
    pub failed: Vec<(String, HandlerError)>,
}

impl RunSummary {
    /// Returns `true` if no variable failed.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Resolves requested variables to handlers and runs them.
pub struct Dispatcher {
    registry: HandlerRegistry,
    reader: Box<dyn SourceReader>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Create a dispatcher reading inputs through `reader`.
    pub fn new(registry: HandlerRegistry, reader: Box<dyn SourceReader>) -> Self {
        Self { registry, reader }
    }

    /// The handler registry.
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Produce one variable.
    ///
    /// # Errors
    ///
    /// - [`HandlerError::UnknownVariable`] if no handler is registered.
    /// - [`HandlerError::MissingInputFile`] if an input path does not exist
    ///   or a raw variable is in none of the inputs.
    /// - Any error from [`handle`].
    pub fn dispatch(
        &self,
        name: &str,
        input_paths: &[PathBuf],
        ctx: &RunContext,
        engine: &mut dyn Engine,
    ) -> Result<HandlerOutcome, HandlerError> {
        let spec = self
            .registry
            .get(name)
            .ok_or_else(|| HandlerError::UnknownVariable {
                name: name.to_string(),
            })?;
        let inputs = self.locate(spec, input_paths)?;
        handle(spec, &inputs, ctx, engine)
    }

    /// Produce every variable in `names`, in order.
    ///
    /// A failure is recorded and the next variable is dispatched. Once the
    /// cancel flag is raised the remaining variables are recorded as
    /// cancelled without being started.
    pub fn dispatch_all<S: AsRef<str>>(
        &self,
        names: &[S],
        input_paths: &[PathBuf],
        ctx: &RunContext,
        engine: &mut dyn Engine,
    ) -> RunSummary {
        let mut summary = RunSummary::default();
        for name in names.iter().map(|s| s.as_ref()) {
            let _span = info_span!("dispatch", variable = name).entered();
            if ctx.cancel().is_cancelled() {
                summary.failed.push((
                    name.to_string(),
                    HandlerError::Cancelled {
                        variable: name.to_string(),
                        last_success: None,
                    },
                ));
                continue;
            }
            match self.dispatch(name, input_paths, ctx, engine) {
                Ok(outcome) => summary.produced.push(outcome),
                Err(e) => {
                    error!(variable = name, error = %e, "handler failed");
                    summary.failed.push((name.to_string(), e));
                }
            }
        }
        info!(
            produced = summary.produced.len(),
            failed = summary.failed.len(),
            "dispatch finished"
        );
        summary
    }

    /// Open every input once and find each raw variable in the first file
    /// that has it.
    fn locate(&self, spec: &HandlerSpec, paths: &[PathBuf]) -> Result<HandlerInputs, HandlerError> {
        let missing = |raw: String| HandlerError::MissingInputFile {
            variable: spec.name().to_string(),
            raw,
            searched: paths.to_vec(),
        };

        let mut files: Vec<Box<dyn SourceFile>> = Vec::with_capacity(paths.len());
        for path in paths {
            match self.reader.open(path) {
                Ok(file) => files.push(file),
                Err(IoError::FileNotFound { path }) => {
                    return Err(missing(path.display().to_string()));
                }
                Err(e) => return Err(e.into()),
            }
        }

        let mut raw = Vec::with_capacity(spec.raw_variables().len());
        let mut primary_file = None;
        for name in spec.raw_variables() {
            let Some(index) = files.iter().position(|f| f.has_variable(name)) else {
                return Err(missing(name.clone()));
            };
            raw.push(files[index].read_variable(name)?);
            primary_file.get_or_insert(index);
        }

        let grid = primary_file
            .and_then(|i| files.into_iter().nth(i))
            .ok_or_else(|| missing("no raw variables".to_string()))?;
        Ok(HandlerInputs { raw, grid })
    }
}
