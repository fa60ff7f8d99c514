//! Run command: convert the requested variables.

use anyhow::{Context, Result, bail};
use tracing::{info, info_span};

use e2c_cmor::{NetcdfEngine, RecordingEngine};
use e2c_handlers::{Dispatcher, RunContext, RunSummary, builtin_registry};
use e2c_io::NetcdfReader;

use crate::cli::RunArgs;
use crate::config::E2cConfig;
use crate::convert;

/// Run the conversion pipeline.
pub fn run(args: RunArgs) -> Result<()> {
    let _cmd = info_span!("run").entered();
    // 1. Load optional project TOML
    let config = match &args.config {
        Some(path) => {
            let toml_str = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file: {}", path.display()))?;
            toml::from_str::<E2cConfig>(&toml_str).context("failed to parse TOML config")?
        }
        None => E2cConfig::default(),
    };
    let settings = convert::build_run_settings(&args, &config)?;

    // 2. Resolve variables and inputs
    let registry = builtin_registry();
    let names = registry.resolve_request(&settings.variables);
    if names.is_empty() {
        bail!("no variables requested: use --var-list or set [run].variables");
    }
    let inputs = convert::expand_inputs(&settings.inputs)?;
    if inputs.is_empty() {
        bail!("no input files: use --input or set [paths].inputs");
    }
    info!(
        n_variables = names.len(),
        n_inputs = inputs.len(),
        dry_run = settings.dry_run,
        "starting run"
    );

    // 3. Per-variable engine logs
    std::fs::create_dir_all(&settings.log_dir).with_context(|| {
        format!(
            "failed to create log directory: {}",
            settings.log_dir.display()
        )
    })?;
    let ctx = RunContext::new(&settings.tables, &settings.user_input)
        .with_log_dir(&settings.log_dir)
        .with_file_action(settings.file_action);

    // 4. Dispatch
    let dispatcher = Dispatcher::new(registry, Box::new(NetcdfReader));
    let summary = if settings.dry_run {
        dry_run(&dispatcher, &names, &inputs, &ctx)
    } else {
        let mut engine = NetcdfEngine::new();
        dispatcher.dispatch_all(&names, &inputs, &ctx, &mut engine)
    };

    // 5. Report
    for outcome in &summary.produced {
        println!(
            "{}: {} step(s) written, {} skipped",
            outcome.variable,
            outcome.written,
            outcome.skipped.len()
        );
    }
    for (name, e) in &summary.failed {
        eprintln!("{name}: {e}");
    }
    if !summary.is_success() {
        bail!(
            "{} of {} variable(s) failed",
            summary.failed.len(),
            names.len()
        );
    }
    Ok(())
}

/// Dispatch against a [`RecordingEngine`], one variable at a time so the call
/// count can be logged per variable.
fn dry_run(
    dispatcher: &Dispatcher,
    names: &[String],
    inputs: &[std::path::PathBuf],
    ctx: &RunContext,
) -> RunSummary {
    let mut engine = RecordingEngine::new();
    let mut summary = RunSummary::default();
    for name in names {
        engine.reset();
        let one = dispatcher.dispatch_all(std::slice::from_ref(name), inputs, ctx, &mut engine);
        info!(
            variable = %name,
            calls = engine.calls().len(),
            writes = engine.n_writes(),
            "dry run"
        );
        summary.produced.extend(one.produced);
        summary.failed.extend(one.failed);
    }
    summary
}
