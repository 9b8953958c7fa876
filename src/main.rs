use clap::Parser;
use serve_warden::cli::{output, Cli};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // Diagnostics go to stderr; RUST_LOG overrides the default level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.execute().await {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            output::print_error(&e.to_string());
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
