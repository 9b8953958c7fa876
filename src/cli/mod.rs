// CLI module - Entry point wiring configuration, lock, signals and supervisor

pub mod output;

use crate::backend::select_backend;
use crate::config::{Config, Overrides};
use crate::error::{WardenError, Result};
use crate::lock;
use crate::process::Supervisor;
use crate::signals;
use clap::Parser;
use std::path::PathBuf;

/// serve-warden - Keep a local HTTP server running until interrupted
#[derive(Debug, Parser)]
#[command(name = "serve-warden")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Directory to serve (relative paths resolve against the binary's directory)
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// Listen port, overrides the PORT environment variable
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
    pub port: Option<u16>,

    /// Config file (TOML or JSON), defaults to serve-warden.toml next to the binary
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Resolve configuration and select a backend without starting it
    #[arg(long)]
    pub check: bool,
}

impl Cli {
    /// Run the parsed command and return the process exit status
    pub async fn execute(self) -> Result<i32> {
        let overrides = Overrides {
            dir: self.dir,
            port: self.port,
            config_file: self.config,
        };
        let config = Config::from_environment(&overrides)?;

        if self.check {
            let backend = select_backend(&config.backends)?;
            output::print_plan(&config, &backend);
            return Ok(0);
        }

        let shutdown = signals::listen_for_interrupts().map_err(|e| {
            WardenError::SignalError(format!("Failed to install interrupt handler: {}", e))
        })?;

        let lock = lock::detect(config.wake_lock);
        let supervisor = Supervisor::start(config, lock, &shutdown).await?;
        output::print_running(&supervisor);

        let report = supervisor.run(shutdown.requested()).await;
        output::print_report(&report);

        Ok(report.exit_code())
    }
}
