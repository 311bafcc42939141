// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::DEFAULT_CONFIG_FILE;
use crate::context::parse_param_override;

/// Command-line arguments for `builddag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "builddag",
    version,
    about = "Plan and run a graph of build targets.",
    long_about = None
)]
pub struct CliArgs {
    /// Targets to run.
    ///
    /// Default: `[config].default_target`.
    #[arg(value_name = "TARGET")]
    pub targets: Vec<String>,

    /// Path to the config file (TOML).
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
    pub config: String,

    /// Build root. Defaults to the directory containing the config file.
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Parameter value, overriding the environment and the config default.
    #[arg(
        short = 'p',
        long = "param",
        value_name = "KEY=VALUE",
        value_parser = parse_param_override
    )]
    pub params: Vec<(String, String)>,

    /// Partition index (0-based) for partitioned targets, e.g. a CI matrix
    /// job number.
    #[arg(long, value_name = "INDEX")]
    pub partition: Option<usize>,

    /// Maximum number of targets running at once (overrides
    /// `[config].max_parallel`).
    #[arg(long, value_name = "N", value_parser = parse_parallel)]
    pub parallel: Option<usize>,

    /// Keep running independent targets after a failure.
    #[arg(long = "continue")]
    pub continue_on_failure: bool,

    /// Print the execution plan without running anything.
    #[arg(long)]
    pub plan: bool,

    /// List declared targets and exit.
    #[arg(long, conflicts_with = "plan")]
    pub list: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BUILDDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

fn parse_parallel(raw: &str) -> Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
