// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pagebridge — native/page RPC bridge
//
// Entry point. Initialises logging, loads the bridge config, and runs the
// selected command.

mod services;
#[cfg(feature = "wry")]
mod window;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use pagebridge_core::BridgeConfig;
use pagebridge_core::error::Result;

use services::data_dir;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file; defaults to the per-user data directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the bridge scenarios against the headless engine.
    Selftest,
    /// Print the effective configuration.
    Config {
        /// Write the defaults to the config file first.
        #[arg(long)]
        init: bool,
    },
    /// Open a window on URL with demo functions exposed to the page.
    #[cfg(feature = "wry")]
    Open { url: String },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let path = cli.config.unwrap_or_else(data_dir::config_path);

    tracing::info!(config = %path.display(), "Pagebridge starting");

    let outcome = match cli.command {
        Command::Selftest => selftest(&BridgeConfig::load_or_default(&path)),
        Command::Config { init } => show_config(&path, init),
        #[cfg(feature = "wry")]
        Command::Open { url } => window::open(&url, BridgeConfig::load_or_default(&path)),
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = %e, "pagebridge failed");
            ExitCode::FAILURE
        }
    }
}

fn selftest(config: &BridgeConfig) -> Result<bool> {
    let checks = services::selftest::run(config)?;
    let failed = checks.iter().filter(|c| !c.passed()).count();
    for check in &checks {
        let mark = if check.passed() { "ok  " } else { "FAIL" };
        println!("{mark} {}", check.name);
    }
    println!("{} passed, {failed} failed", checks.len() - failed);
    Ok(failed == 0)
}

fn show_config(path: &Path, init: bool) -> Result<bool> {
    if init {
        BridgeConfig::default().save(path)?;
        tracing::info!(path = %path.display(), "default config written");
    }
    let config = BridgeConfig::load_or_default(path);
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(true)
}
