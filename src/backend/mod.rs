// Backend module - Server backend candidates and ordered selection

use crate::error::{WardenError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default application entry point handed to application-server backends
pub const DEFAULT_APP: &str = "app:app";

/// Deployment profile, which decides the default candidate order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Development,
    Production,
}

impl Profile {
    /// Interpret the value of the deployment-environment variable
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "production" || v == "prod" => Profile::Production,
            _ => Profile::Development,
        }
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Profile::Development => write!(f, "development"),
            Profile::Production => write!(f, "production"),
        }
    }
}

/// One candidate launch specification
///
/// Arguments are templates: `{port}`, `{dir}` and `{app}` are substituted
/// when the backend is selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendSpec {
    /// Display name used in logs and reports
    pub name: String,

    /// Executable looked up on the search path
    pub command: String,

    /// Argument templates
    #[serde(default)]
    pub args: Vec<String>,
}

impl BackendSpec {
    pub fn new(name: &str, command: &str, args: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            command: command.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// BusyBox httpd in foreground mode, serving the working directory
    pub fn busybox_httpd() -> Self {
        Self::new(
            "busybox-httpd",
            "busybox",
            &["httpd", "-f", "-p", "{port}", "-h", "{dir}"],
        )
    }

    /// Python's built-in static file server
    pub fn python_http_server() -> Self {
        Self::new(
            "python-http-server",
            "python3",
            &[
                "-m",
                "http.server",
                "{port}",
                "--bind",
                "0.0.0.0",
                "--directory",
                "{dir}",
            ],
        )
    }

    /// Gunicorn application server
    pub fn gunicorn() -> Self {
        Self::new(
            "gunicorn",
            "gunicorn",
            &["--bind", "0.0.0.0:{port}", "--chdir", "{dir}", "{app}"],
        )
    }

    /// Expand the argument templates for a concrete launch
    pub fn render_args(&self, port: u16, dir: &Path, app: &str) -> Vec<String> {
        let port = port.to_string();
        let dir = dir.display().to_string();
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{port}", &port)
                    .replace("{dir}", &dir)
                    .replace("{app}", app)
            })
            .collect()
    }
}

/// Default candidate list for a profile, most preferred first
pub fn default_candidates(profile: Profile) -> Vec<BackendSpec> {
    let mut candidates = Vec::new();
    if profile == Profile::Production {
        candidates.push(BackendSpec::gunicorn());
    }
    candidates.push(BackendSpec::busybox_httpd());
    candidates.push(BackendSpec::python_http_server());
    candidates
}

/// Backend chosen by selection, with its executable resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedBackend {
    pub spec: BackendSpec,

    /// Absolute path of the executable found on the search path
    pub program: PathBuf,

    /// Names of preferred candidates that were skipped
    pub skipped: Vec<String>,
}

impl SelectedBackend {
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Whether a fallback candidate replaced the preferred one
    pub fn is_fallback(&self) -> bool {
        !self.skipped.is_empty()
    }
}

/// Look up an executable on the search path without running it
pub fn locate(command: &str) -> Option<PathBuf> {
    which::which(command).ok()
}

/// Select the first candidate whose executable is on the search path
pub fn select_backend(candidates: &[BackendSpec]) -> Result<SelectedBackend> {
    select_with(candidates, locate)
}

/// Ordered probe-then-fallback selection with a caller-supplied probe
///
/// The probe must not have side effects; nothing is spawned here.
pub fn select_with<F>(candidates: &[BackendSpec], probe: F) -> Result<SelectedBackend>
where
    F: Fn(&str) -> Option<PathBuf>,
{
    let mut skipped = Vec::new();

    for spec in candidates {
        match probe(&spec.command) {
            Some(program) => {
                if let Some(preferred) = skipped.first() {
                    warn!(
                        "Preferred backend '{}' is unavailable, falling back to '{}'",
                        preferred, spec.name
                    );
                } else {
                    debug!("Backend '{}' found at {}", spec.name, program.display());
                }
                info!("Selected backend '{}' ({})", spec.name, program.display());

                return Ok(SelectedBackend {
                    spec: spec.clone(),
                    program,
                    skipped,
                });
            }
            None => {
                debug!(
                    "Backend '{}' not available: '{}' not found on PATH",
                    spec.name, spec.command
                );
                skipped.push(spec.name.clone());
            }
        }
    }

    Err(WardenError::NoBackendAvailable(
        candidates.iter().map(|c| c.name.clone()).collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn probe_only(available: &'static [&'static str]) -> impl Fn(&str) -> Option<PathBuf> {
        move |cmd: &str| {
            available
                .iter()
                .any(|a| *a == cmd)
                .then(|| PathBuf::from(format!("/usr/bin/{}", cmd)))
        }
    }

    #[test]
    fn test_profile_from_env_value() {
        assert_eq!(Profile::from_env_value(None), Profile::Development);
        assert_eq!(Profile::from_env_value(Some("staging")), Profile::Development);
        assert_eq!(Profile::from_env_value(Some("production")), Profile::Production);
        assert_eq!(Profile::from_env_value(Some(" PROD ")), Profile::Production);
    }

    #[test]
    fn test_default_candidate_order() {
        let dev: Vec<_> = default_candidates(Profile::Development)
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(dev, vec!["busybox-httpd", "python-http-server"]);

        let prod: Vec<_> = default_candidates(Profile::Production)
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(prod, vec!["gunicorn", "busybox-httpd", "python-http-server"]);
    }

    #[test]
    fn test_render_args_substitutes_placeholders() {
        let dir = Path::new("/srv/site");

        let args = BackendSpec::busybox_httpd().render_args(8080, dir, DEFAULT_APP);
        assert_eq!(args, vec!["httpd", "-f", "-p", "8080", "-h", "/srv/site"]);

        let args = BackendSpec::gunicorn().render_args(9090, dir, "wsgi:application");
        assert_eq!(
            args,
            vec!["--bind", "0.0.0.0:9090", "--chdir", "/srv/site", "wsgi:application"]
        );
    }

    #[test]
    fn test_select_preferred_when_available() {
        let candidates = default_candidates(Profile::Development);
        let selected = select_with(&candidates, probe_only(&["busybox", "python3"])).unwrap();

        assert_eq!(selected.name(), "busybox-httpd");
        assert_eq!(selected.program, PathBuf::from("/usr/bin/busybox"));
        assert!(!selected.is_fallback());
    }

    #[test]
    fn test_select_falls_back_in_order() {
        let candidates = default_candidates(Profile::Production);
        let selected = select_with(&candidates, probe_only(&["python3"])).unwrap();

        assert_eq!(selected.name(), "python-http-server");
        assert_eq!(selected.skipped, vec!["gunicorn", "busybox-httpd"]);
        assert!(selected.is_fallback());
    }

    #[test]
    fn test_select_fails_when_nothing_available() {
        let candidates = default_candidates(Profile::Development);
        let result = select_with(&candidates, probe_only(&[]));

        match result {
            Err(WardenError::NoBackendAvailable(tried)) => {
                assert_eq!(tried, vec!["busybox-httpd", "python-http-server"]);
            }
            other => panic!("Expected NoBackendAvailable, got {:?}", other),
        }
    }

    #[test]
    fn test_probing_stops_at_first_hit() {
        let probed = RefCell::new(Vec::new());
        let candidates = default_candidates(Profile::Production);

        let selected = select_with(&candidates, |cmd| {
            probed.borrow_mut().push(cmd.to_string());
            (cmd == "busybox").then(|| PathBuf::from("/bin/busybox"))
        })
        .unwrap();

        assert_eq!(selected.name(), "busybox-httpd");
        assert_eq!(*probed.borrow(), vec!["gunicorn", "busybox"]);
    }

    #[test]
    fn test_locate_real_executable() {
        assert!(locate("sh").is_some());
        assert!(locate("serve-warden-no-such-binary").is_none());
    }
}
