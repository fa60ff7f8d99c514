use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// E3SM to CMIP6 variable converter.
#[derive(Parser)]
#[command(
    name = "e2c",
    version,
    about = "Convert E3SM model output variables to CMIP6"
)]
pub struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Convert the requested variables.
    Run(RunArgs),
    /// List registered handlers.
    List(ListArgs),
}

/// Arguments for the `run` subcommand.
#[derive(clap::Args)]
pub struct RunArgs {
    /// Optional TOML configuration file. Flags override its values.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Comma-separated CMIP variable names, or `all`.
    #[arg(long = "var-list", value_delimiter = ',')]
    pub var_list: Vec<String>,

    /// Input NetCDF files or directories of them. Repeatable.
    #[arg(short, long = "input")]
    pub inputs: Vec<PathBuf>,

    /// Directory holding the CMIP6 JSON tables.
    #[arg(long)]
    pub tables_path: Option<PathBuf>,

    /// Dataset description JSON.
    #[arg(long)]
    pub user_input: Option<PathBuf>,

    /// Directory for per-variable engine logs.
    #[arg(long)]
    pub logdir: Option<PathBuf>,

    /// What to do with existing output: replace, preserve, or append.
    #[arg(long)]
    pub file_action: Option<String>,

    /// Record engine calls instead of writing files.
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `list` subcommand.
#[derive(clap::Args)]
pub struct ListArgs {
    /// Only list handlers writing to this CMIP6 table (e.g. `CMIP6_Lmon.json`).
    #[arg(long)]
    pub table: Option<String>,
}
