use crate::error::{WardenError, Result};
use chrono::{DateTime, Local};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;

/// Append-mode log file shared with the child through duplicated descriptors
///
/// The supervisor writes only session markers, and only while no child holds
/// the descriptors; everything else in the file comes from the server.
#[derive(Debug)]
pub struct LogSink {
    path: PathBuf,
    file: File,
}

impl LogSink {
    /// Open (or create) the log file in append mode
    ///
    /// Existing content is never truncated.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                WardenError::LogFileError(format!(
                    "Failed to create log directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                WardenError::LogFileError(format!("{}: {}", path.display(), e))
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current size of the log file in bytes
    pub fn len(&self) -> u64 {
        self.file.metadata().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Duplicate the descriptor for the child's stdout and stderr
    pub fn child_stdio(&self) -> Result<(Stdio, Stdio)> {
        let stdout = self.file.try_clone().map_err(|e| {
            WardenError::LogFileError(format!("Failed to duplicate log descriptor: {}", e))
        })?;
        let stderr = self.file.try_clone().map_err(|e| {
            WardenError::LogFileError(format!("Failed to duplicate log descriptor: {}", e))
        })?;

        Ok((Stdio::from(stdout), Stdio::from(stderr)))
    }

    /// Append a timestamped supervisor line
    pub fn write_marker(&mut self, message: &str) -> Result<()> {
        let line = format_marker(&Local::now(), message);
        self.file.write_all(line.as_bytes())?;
        self.file.flush()?;
        Ok(())
    }

    /// Flush to disk and close the supervisor's descriptor
    pub fn close(self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}

/// Format: [YYYY-MM-DD HH:MM:SS.mmm] [serve-warden] <message>
fn format_marker(timestamp: &DateTime<Local>, message: &str) -> String {
    format!(
        "[{}] [serve-warden] {}\n",
        timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
        message.trim_end()
    )
}
