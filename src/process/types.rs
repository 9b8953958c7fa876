use crate::error::{WardenError, Result};
use std::process::ExitStatus;
use std::time::{Duration, Instant};
use tokio::process::Child;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    Stopping,
    /// Terminated at the supervisor's request
    Stopped,
    /// Exited on its own
    Exited,
}

impl std::fmt::Display for ProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessState::Running => write!(f, "running"),
            ProcessState::Stopping => write!(f, "stopping"),
            ProcessState::Stopped => write!(f, "stopped"),
            ProcessState::Exited => write!(f, "exited"),
        }
    }
}

/// The one child process a supervisor owns
#[derive(Debug)]
pub struct ServerProcess {
    pub backend: String,
    pub pid: u32,
    pub state: ProcessState,
    started_at: Instant,
    termination_requested: bool,
    exit_status: Option<ExitStatus>,
    child: Child,
}

impl ServerProcess {
    pub fn new(backend: String, pid: u32, child: Child) -> Self {
        Self {
            backend,
            pid,
            state: ProcessState::Running,
            started_at: Instant::now(),
            termination_requested: false,
            exit_status: None,
            child,
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Whether a stop signal was ever sent to this process
    pub fn termination_requested(&self) -> bool {
        self.termination_requested
    }

    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    /// Non-blocking liveness check; records the exit status once observed
    pub fn poll_exit(&mut self) -> Result<Option<ExitStatus>> {
        if let Some(status) = self.exit_status {
            return Ok(Some(status));
        }

        match self.child.try_wait()? {
            Some(status) => {
                self.exit_status = Some(status);
                self.state = ProcessState::Exited;
                Ok(Some(status))
            }
            None => Ok(None),
        }
    }

    /// Ask the process to exit, escalating to SIGKILL after `timeout`
    pub async fn terminate(&mut self, timeout: Duration) -> Result<ExitStatus> {
        if let Some(status) = self.poll_exit()? {
            debug!("Backend {} already exited, not signalling it", self.backend);
            return Ok(status);
        }

        self.state = ProcessState::Stopping;
        self.termination_requested = true;

        info!(
            "Stopping backend {} (PID: {}) with SIGTERM",
            self.backend, self.pid
        );
        self.send_terminate()?;

        let status = match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(status)) => {
                info!("Backend {} exited with status: {}", self.backend, status);
                status
            }
            Ok(Err(e)) => {
                return Err(WardenError::StopError(
                    self.backend.clone(),
                    format!("Wait failed: {}", e),
                ));
            }
            Err(_) => {
                warn!(
                    "Backend {} did not exit within {:?}, sending SIGKILL",
                    self.backend, timeout
                );
                self.child.kill().await.map_err(|e| {
                    WardenError::StopError(
                        self.backend.clone(),
                        format!("Failed to send SIGKILL after timeout: {}", e),
                    )
                })?;
                self.child.wait().await?
            }
        };

        self.exit_status = Some(status);
        self.state = ProcessState::Stopped;
        Ok(status)
    }

    #[cfg(unix)]
    fn send_terminate(&mut self) -> Result<()> {
        use nix::errno::Errno;
        use nix::sys::signal::{self, Signal};
        use nix::unistd::Pid;

        match signal::kill(Pid::from_raw(self.pid as i32), Signal::SIGTERM) {
            Ok(()) => Ok(()),
            // Exited between the liveness check and the signal
            Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(WardenError::SignalError(format!(
                "Failed to send SIGTERM to {}: {}",
                self.pid, e
            ))),
        }
    }

    #[cfg(not(unix))]
    fn send_terminate(&mut self) -> Result<()> {
        self.child
            .start_kill()
            .map_err(|e| WardenError::SignalError(format!("Failed to stop {}: {}", self.pid, e)))
    }
}
