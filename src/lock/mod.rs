// Lock module - Optional platform resource lock (wake-lock)

use crate::error::{WardenError, Result};
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

/// A best-effort platform capability held while the server runs
pub trait ResourceLock: Send {
    /// Human-readable name used in logs
    fn name(&self) -> &str;

    fn acquire(&mut self) -> Result<()>;

    fn release(&mut self) -> Result<()>;

    /// True for implementations that do nothing at all
    fn is_noop(&self) -> bool {
        false
    }
}

/// Stand-in for platforms without a lock
#[derive(Debug, Default)]
pub struct NoLock;

impl ResourceLock for NoLock {
    fn name(&self) -> &str {
        "none"
    }

    fn acquire(&mut self) -> Result<()> {
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        Ok(())
    }

    fn is_noop(&self) -> bool {
        true
    }
}

/// Termux wake-lock driven through the termux-api helper commands
#[derive(Debug, Clone)]
pub struct WakeLock {
    acquire_cmd: String,
    release_cmd: String,
}

impl WakeLock {
    pub fn new() -> Self {
        Self::with_commands("termux-wake-lock", "termux-wake-unlock")
    }

    /// Use custom helper commands
    pub fn with_commands(acquire_cmd: &str, release_cmd: &str) -> Self {
        Self {
            acquire_cmd: acquire_cmd.to_string(),
            release_cmd: release_cmd.to_string(),
        }
    }

    fn run(command: &str) -> Result<()> {
        let status = Command::new(command)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| WardenError::LockError(format!("Failed to run {}: {}", command, e)))?;

        if status.success() {
            Ok(())
        } else {
            Err(WardenError::LockError(format!(
                "{} exited with {}",
                command, status
            )))
        }
    }
}

impl Default for WakeLock {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceLock for WakeLock {
    fn name(&self) -> &str {
        "wake-lock"
    }

    fn acquire(&mut self) -> Result<()> {
        Self::run(&self.acquire_cmd)
    }

    fn release(&mut self) -> Result<()> {
        Self::run(&self.release_cmd)
    }
}

/// Pick the lock implementation for the probed platform
pub fn detect(wanted: bool) -> Box<dyn ResourceLock> {
    if wanted {
        Box::new(WakeLock::new())
    } else {
        Box::new(NoLock)
    }
}

/// Owns one lock and pairs every release with a successful acquire
///
/// Release happens at most once, either explicitly or on drop.
pub struct LockGuard {
    lock: Box<dyn ResourceLock>,
    held: bool,
}

impl LockGuard {
    /// Try to take the lock; failure is logged and supervision continues without it
    pub fn acquire(mut lock: Box<dyn ResourceLock>) -> Self {
        if lock.is_noop() {
            return Self { lock, held: false };
        }

        let held = match lock.acquire() {
            Ok(()) => {
                info!("Acquired {}", lock.name());
                true
            }
            Err(e) => {
                warn!("Failed to acquire {}, continuing without it: {}", lock.name(), e);
                false
            }
        };

        Self { lock, held }
    }

    /// [`LockGuard::acquire`] on the blocking pool, for use inside the runtime
    pub async fn acquire_async(lock: Box<dyn ResourceLock>) -> Result<Self> {
        tokio::task::spawn_blocking(move || Self::acquire(lock))
            .await
            .map_err(|e| WardenError::LockError(format!("Lock task failed: {}", e)))
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    /// Release on the blocking pool; the guard is consumed
    pub async fn release_async(mut self) {
        if !self.held {
            return;
        }

        let name = self.lock.name().to_string();
        if let Err(e) = tokio::task::spawn_blocking(move || self.release()).await {
            warn!("Failed to release {}: {}", name, e);
        }
    }

    /// Release the lock if it was acquired; errors are logged and swallowed
    pub fn release(&mut self) {
        if !self.held {
            debug!("No {} held, nothing to release", self.lock.name());
            return;
        }
        self.held = false;

        match self.lock.release() {
            Ok(()) => info!("Released {}", self.lock.name()),
            Err(e) => warn!("Failed to release {}: {}", self.lock.name(), e),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("lock", &self.lock.name())
            .field("held", &self.held)
            .finish()
    }
}
