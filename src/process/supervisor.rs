use crate::backend::{select_backend, SelectedBackend};
use crate::config::Config;
use crate::error::{WardenError, Result};
use crate::lock::{LockGuard, ResourceLock};
use crate::logs::LogSink;
use crate::process::spawner::spawn_backend;
use crate::process::types::ServerProcess;
use crate::signals::Shutdown;
use std::future::Future;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Why supervision ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Operator interrupt; the backend was asked to stop
    Interrupted,
    /// The backend exited on its own
    BackendExited,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Interrupted => write!(f, "interrupted"),
            Outcome::BackendExited => write!(f, "backend exited unexpectedly"),
        }
    }
}

/// Final status handed back to the operator
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: Outcome,
    pub backend: String,
    pub pid: u32,
    pub exit_status: Option<ExitStatus>,
    pub uptime: Duration,
    /// Whether a stop signal was sent to the backend
    pub termination_sent: bool,
    /// Whether the resource lock had been acquired (and was therefore released)
    pub lock_released: bool,
    pub log_file: PathBuf,
}

impl RunReport {
    /// Both outcomes end in an orderly cleanup, so the supervisor exits cleanly
    pub fn exit_code(&self) -> i32 {
        0
    }
}

/// Single-child supervisor: owns the backend process, the log sink and the lock
///
/// A `Supervisor` only exists while its backend is running; `run` consumes it
/// and stops the backend, leaving a [`RunReport`].
#[derive(Debug)]
pub struct Supervisor {
    config: Config,
    backend: SelectedBackend,
    lock: LockGuard,
    log: LogSink,
    process: ServerProcess,
}

impl Supervisor {
    /// Acquire the lock, select a backend, open the log and spawn the child
    ///
    /// A shutdown requested while the backend is still starting is not a
    /// spawn failure: `start` returns and the next `run` stops the backend.
    /// On error the lock is released and the child is killed on drop.
    pub async fn start(
        config: Config,
        lock: Box<dyn ResourceLock>,
        shutdown: &Shutdown,
    ) -> Result<Self> {
        let lock = LockGuard::acquire_async(lock).await?;

        match Self::prepare(&config, shutdown).await {
            Ok((backend, log, process)) => Ok(Self {
                config,
                backend,
                lock,
                log,
                process,
            }),
            Err(e) => {
                lock.release_async().await;
                Err(e)
            }
        }
    }

    async fn prepare(
        config: &Config,
        shutdown: &Shutdown,
    ) -> Result<(SelectedBackend, LogSink, ServerProcess)> {
        let backend = select_backend(&config.backends)?;

        let mut log = LogSink::open(&config.log_file)?;
        if let Err(e) = log.write_marker(&format!(
            "session started: backend={} port={} dir={}",
            backend.name(),
            config.port,
            config.working_dir.display()
        )) {
            warn!("Failed to write session marker: {}", e);
        }

        let process = match launch(&backend, config, &log, shutdown).await {
            Ok(process) => process,
            Err(e) => {
                let _ = log.write_marker(&format!("session aborted: {}", e));
                return Err(e);
            }
        };

        info!(
            "HTTP server is running at http://0.0.0.0:{} (backend: {}, PID: {})",
            config.port,
            backend.name(),
            process.pid
        );
        info!("Logs are being saved to {}", config.log_file.display());

        Ok((backend, log, process))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn backend(&self) -> &SelectedBackend {
        &self.backend
    }

    pub fn process(&self) -> &ServerProcess {
        &self.process
    }

    pub fn lock_held(&self) -> bool {
        self.lock.is_held()
    }

    /// Poll the backend until `shutdown` resolves or the backend exits
    ///
    /// The shutdown future races the poll timer, so an interrupt never waits
    /// for the next poll boundary. Cleanup runs on both paths.
    pub async fn run<F>(mut self, shutdown: F) -> RunReport
    where
        F: Future<Output = ()>,
    {
        info!(
            "Supervising backend {} (PID: {}), checking every {:?}",
            self.process.backend, self.process.pid, self.config.poll_interval
        );

        tokio::pin!(shutdown);

        let outcome = loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping backend {}", self.process.backend);
                    break Outcome::Interrupted;
                }

                _ = sleep(self.config.poll_interval) => {
                    match self.process.poll_exit() {
                        Ok(Some(status)) => {
                            error!(
                                "Backend {} (PID: {}) stopped unexpectedly with status: {}",
                                self.process.backend, self.process.pid, status
                            );
                            break Outcome::BackendExited;
                        }
                        Ok(None) => debug!("Backend {} is alive", self.process.backend),
                        Err(e) => error!(
                            "Failed to check backend {}: {}",
                            self.process.backend, e
                        ),
                    }
                }
            }
        };

        if outcome == Outcome::Interrupted {
            if let Err(e) = self.process.terminate(self.config.stop_timeout).await {
                error!("Failed to stop backend {}: {}", self.process.backend, e);
            }
        }

        self.cleanup(outcome).await
    }

    /// Release the lock, close the log and build the report; errors are only logged
    async fn cleanup(self, outcome: Outcome) -> RunReport {
        let Self {
            config,
            lock,
            mut log,
            process,
            ..
        } = self;

        let lock_released = lock.is_held();
        lock.release_async().await;

        // Only touch the log once nothing else holds it
        if let Some(status) = process.exit_status() {
            if let Err(e) = log.write_marker(&format!(
                "session ended: {} (backend {} {})",
                outcome, process.backend, status
            )) {
                warn!("Failed to write session marker: {}", e);
            }
        }
        if let Err(e) = log.close() {
            warn!("Failed to close log file {}: {}", config.log_file.display(), e);
        }

        let report = RunReport {
            outcome,
            backend: process.backend.clone(),
            pid: process.pid,
            exit_status: process.exit_status(),
            uptime: process.uptime(),
            termination_sent: process.termination_requested(),
            lock_released,
            log_file: config.log_file.clone(),
        };

        info!(
            "Supervisor finished: {} after {:?}",
            report.outcome, report.uptime
        );

        report
    }
}

async fn launch(
    backend: &SelectedBackend,
    config: &Config,
    log: &LogSink,
    shutdown: &Shutdown,
) -> Result<ServerProcess> {
    let mut process = spawn_backend(backend, config, log)?;
    await_startup(&mut process, config.startup_grace, shutdown).await?;
    Ok(process)
}

/// A backend that dies inside the grace window never really started
///
/// An interrupt from the terminal reaches the whole process group, so a
/// backend that dies once shutdown has been requested was stopped, not broken.
async fn await_startup(
    process: &mut ServerProcess,
    grace: Duration,
    shutdown: &Shutdown,
) -> Result<()> {
    if grace.is_zero() {
        return Ok(());
    }

    tokio::select! {
        biased;

        _ = shutdown.clone().requested() => {
            debug!("Shutdown requested while {} was starting", process.backend);
            return Ok(());
        }

        _ = sleep(grace) => {}
    }

    match process.poll_exit()? {
        Some(status) if shutdown.is_requested() => {
            debug!(
                "Backend {} exited with {} after shutdown was requested",
                process.backend, status
            );
            Ok(())
        }
        Some(status) => Err(WardenError::SpawnError(
            process.backend.clone(),
            format!("exited during startup with {}", status),
        )),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendSpec;
    use crate::config::{EnvVars, Overrides};
    use crate::lock::NoLock;
    use crate::process::ProcessState;
    use crate::signals;
    use tempfile::TempDir;

    fn test_config(temp_dir: &TempDir, backends: Vec<BackendSpec>) -> Config {
        std::fs::create_dir_all(temp_dir.path().join("site")).unwrap();
        Config::resolve(temp_dir.path(), &Overrides::default(), &EnvVars::default())
            .unwrap()
            .with_backends(backends)
            .with_poll_interval(Duration::from_millis(100))
            .with_stop_timeout(Duration::from_secs(5))
            .with_startup_grace(Duration::from_millis(100))
    }

    #[tokio::test]
    async fn test_start_enters_running() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir, vec![BackendSpec::new("sleeper", "sleep", &["30"])]);

        let (_trigger, shutdown) = signals::channel();
        let supervisor = Supervisor::start(config, Box::new(NoLock), &shutdown)
            .await
            .unwrap();
        assert_eq!(supervisor.process().state, ProcessState::Running);
        assert_eq!(supervisor.backend().name(), "sleeper");
        assert!(supervisor.process().pid > 0);

        let report = supervisor.run(async {}).await;
        assert_eq!(report.outcome, Outcome::Interrupted);
    }

    #[tokio::test]
    async fn test_no_backend_fails_before_log_is_opened() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(
            &temp_dir,
            vec![BackendSpec::new("ghost", "serve-warden-no-such-binary", &[])],
        );
        let log_file = config.log_file.clone();

        let (_trigger, shutdown) = signals::channel();
        let result = Supervisor::start(config, Box::new(NoLock), &shutdown).await;
        assert!(matches!(result, Err(WardenError::NoBackendAvailable(_))));
        assert!(!log_file.exists());
    }

    #[tokio::test]
    async fn test_immediate_exit_is_spawn_failure() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(
            &temp_dir,
            vec![BackendSpec::new("crasher", "sh", &["-c", "echo address in use >&2; exit 1"])],
        )
        .with_startup_grace(Duration::from_millis(500));
        let log_file = config.log_file.clone();

        let (_trigger, shutdown) = signals::channel();
        let result = Supervisor::start(config, Box::new(NoLock), &shutdown).await;
        match result {
            Err(e @ WardenError::SpawnError(..)) => assert_eq!(e.exit_code(), 1),
            other => panic!("Expected SpawnError, got {:?}", other),
        }

        let content = std::fs::read_to_string(log_file).unwrap();
        assert!(content.contains("address in use"));
        assert!(content.contains("session aborted"));
    }

    #[tokio::test]
    async fn test_exit_after_interrupt_during_startup_is_not_a_failure() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(
            &temp_dir,
            vec![BackendSpec::new("sleeper", "sh", &["-c", "sleep 0.1; exit 130"])],
        )
        .with_startup_grace(Duration::from_millis(1000));
        let log_file = config.log_file.clone();

        let (trigger, shutdown) = signals::channel();
        tokio::spawn(async move {
            sleep(Duration::from_millis(300)).await;
            trigger.trigger();
        });

        let supervisor = Supervisor::start(config, Box::new(NoLock), &shutdown)
            .await
            .unwrap();
        let report = supervisor.run(shutdown.requested()).await;

        assert_eq!(report.outcome, Outcome::Interrupted);
        assert_eq!(report.exit_code(), 0);
        assert!(!report.termination_sent);
        assert_eq!(report.exit_status.and_then(|s| s.code()), Some(130));

        let content = std::fs::read_to_string(log_file).unwrap();
        assert!(content.contains("session ended: interrupted"));
        assert!(!content.contains("session aborted"));
    }
}
