use crate::backend::SelectedBackend;
use crate::config::Config;
use crate::error::{WardenError, Result};
use crate::logs::LogSink;
use crate::process::types::ServerProcess;
use std::process::Stdio;
use tokio::process::Command;
use tracing::info;

/// Spawn the selected backend with its output appended to the log sink
///
/// The child runs in the served directory with stdin closed. It is killed if
/// its handle is dropped, so no exit path can leave it orphaned.
pub fn spawn_backend(
    backend: &SelectedBackend,
    config: &Config,
    log: &LogSink,
) -> Result<ServerProcess> {
    let args = backend
        .spec
        .render_args(config.port, &config.working_dir, &config.app);
    let (stdout, stderr) = log.child_stdio()?;

    let mut command = Command::new(&backend.program);
    command
        .args(&args)
        .current_dir(&config.working_dir)
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr)
        .kill_on_drop(true);

    let child = command.spawn().map_err(|e| {
        WardenError::SpawnError(backend.name().to_string(), e.to_string())
    })?;

    let pid = child.id().ok_or_else(|| {
        WardenError::SpawnError(
            backend.name().to_string(),
            "Failed to get PID for the new process".to_string(),
        )
    })?;

    info!(
        "Spawned backend {} (PID: {}): {} {}",
        backend.name(),
        pid,
        backend.program.display(),
        args.join(" ")
    );

    Ok(ServerProcess::new(backend.name().to_string(), pid, child))
}
