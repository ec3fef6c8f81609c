// Copyright 2026 The Quiver Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quiver_engine::SolverConfig;

mod script;

use script::{Command, Runner};

/// Build complex-number diagrams from a script and solve them.
#[derive(Parser)]
#[command(name = "quiver")]
#[command(version)]
struct Cli {
    /// Log solver activity (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a JSON script of diagram commands and print the arrows as TSV
    Run {
        /// Path to the script: a JSON array of commands
        script: PathBuf,

        /// Solver configuration (JSON); unspecified fields keep defaults
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Don't print the final table
        #[arg(short, long)]
        quiet: bool,
    },
}

fn load_config(path: Option<&Path>) -> Result<SolverConfig> {
    let Some(path) = path else {
        return Ok(SolverConfig::default());
    };
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    SolverConfig::from_json(&contents).with_context(|| format!("loading {}", path.display()))
}

fn run(script: &Path, config: Option<&Path>, quiet: bool) -> Result<()> {
    let config = load_config(config)?;
    let contents =
        fs::read_to_string(script).with_context(|| format!("reading {}", script.display()))?;
    let commands: Vec<Command> = serde_json::from_str(&contents)
        .with_context(|| format!("parsing {}", script.display()))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut runner = Runner::new(config);
    for (i, command) in commands.iter().enumerate() {
        runner
            .apply(command, &mut out)
            .with_context(|| format!("command {} of {}", i + 1, script.display()))?;
    }
    if !quiet {
        runner.print(&mut out)?;
    }
    out.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(io::stderr),
        )
        .init();

    match cli.command {
        Commands::Run {
            script,
            config,
            quiet,
        } => run(&script, config.as_deref(), quiet),
    }
}
