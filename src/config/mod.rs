// Config module - One-shot resolution of the supervisor's immutable settings

mod file;

pub use file::ConfigFile;

use crate::backend::{default_candidates, BackendSpec, Profile, DEFAULT_APP};
use crate::error::{WardenError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Port used when nothing overrides it
pub const DEFAULT_PORT: u16 = 8080;

/// Directory served when nothing overrides it, relative to the binary
pub const DEFAULT_SITE_DIR: &str = "site";

/// Log file name inside the served directory
pub const LOG_FILE_NAME: &str = "server.log";

/// Config file names looked up next to the binary, in order
pub const CONFIG_FILE_NAMES: [&str; 2] = ["serve-warden.toml", "serve-warden.json"];

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_STOP_TIMEOUT_SECS: u64 = 10;

/// How long a fresh child must survive before the spawn counts as successful
pub const DEFAULT_STARTUP_GRACE: Duration = Duration::from_millis(500);

/// Port override
pub const PORT_VAR: &str = "PORT";

/// Present only inside Termux, where the wake-lock is available
pub const PLATFORM_VAR: &str = "TERMUX_VERSION";

/// Deployment environment, `production` prefers an application server
pub const PROFILE_VAR: &str = "APP_ENV";

/// Snapshot of the environment variables resolution reads
#[derive(Debug, Clone, Default)]
pub struct EnvVars {
    vars: HashMap<String, String>,
}

impl EnvVars {
    /// Capture the current process environment
    ///
    /// Entries whose key or value is not valid UTF-8 are skipped, so such a
    /// variable reads as unset.
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }
}

/// Values supplied on the command line, highest precedence
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub dir: Option<PathBuf>,
    pub port: Option<u16>,
    pub config_file: Option<PathBuf>,
}

/// Fully resolved supervisor configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Directory containing the binary; relative paths resolve against it
    pub base_dir: PathBuf,

    /// Served directory (absolute, verified to exist)
    pub working_dir: PathBuf,

    pub port: u16,

    /// Append-mode log file receiving the child's stdout and stderr
    pub log_file: PathBuf,

    pub profile: Profile,

    /// Backend candidates, most preferred first
    pub backends: Vec<BackendSpec>,

    /// Application entry point for application-server backends
    pub app: String,

    /// Whether the platform probe asks for a wake-lock
    pub wake_lock: bool,

    pub poll_interval: Duration,
    pub stop_timeout: Duration,

    /// A child that dies within this window is reported as a spawn failure
    pub startup_grace: Duration,
}

impl Config {
    /// Resolve against the binary's location and the live environment
    pub fn from_environment(overrides: &Overrides) -> Result<Self> {
        Self::resolve(&binary_dir()?, overrides, &EnvVars::from_process())
    }

    /// Resolve configuration with precedence defaults < file < environment < flags
    pub fn resolve(base_dir: &Path, overrides: &Overrides, env: &EnvVars) -> Result<Self> {
        if !base_dir.is_absolute() {
            return Err(WardenError::ConfigError(format!(
                "Base directory must be absolute: {}",
                base_dir.display()
            )));
        }

        let file = load_config_file(base_dir, overrides.config_file.as_deref())?;

        let working_dir = base_dir.join(
            overrides
                .dir
                .clone()
                .or_else(|| file.dir.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SITE_DIR)),
        );

        if !working_dir.is_dir() {
            return Err(WardenError::MissingDirectory(working_dir));
        }

        let port = match overrides.port {
            Some(port) => port,
            None => env_port(env).or(file.port).unwrap_or(DEFAULT_PORT),
        };

        let log_file = match file.log_file {
            Some(ref path) => working_dir.join(path),
            None => working_dir.join(LOG_FILE_NAME),
        };

        let profile = Profile::from_env_value(env.get(PROFILE_VAR));

        let backends = file
            .backends
            .clone()
            .unwrap_or_else(|| default_candidates(profile));

        let wake_lock = env.contains(PLATFORM_VAR) && file.wake_lock != Some(false);

        let config = Self {
            base_dir: base_dir.to_path_buf(),
            working_dir,
            port,
            log_file,
            profile,
            backends,
            app: file.app.clone().unwrap_or_else(|| DEFAULT_APP.to_string()),
            wake_lock,
            poll_interval: Duration::from_secs(
                file.poll_interval_secs.unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            ),
            stop_timeout: Duration::from_secs(
                file.stop_timeout_secs.unwrap_or(DEFAULT_STOP_TIMEOUT_SECS),
            ),
            startup_grace: DEFAULT_STARTUP_GRACE,
        };

        debug!("Resolved configuration: {:?}", config);
        Ok(config)
    }

    pub fn with_backends(mut self, backends: Vec<BackendSpec>) -> Self {
        self.backends = backends;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn with_startup_grace(mut self, grace: Duration) -> Self {
        self.startup_grace = grace;
        self
    }

    pub fn with_wake_lock(mut self, wake_lock: bool) -> Self {
        self.wake_lock = wake_lock;
        self
    }
}

/// Directory containing the running binary
pub fn binary_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe().map_err(|e| {
        WardenError::ConfigError(format!("Cannot locate the running binary: {}", e))
    })?;
    let exe = exe.canonicalize().unwrap_or(exe);

    exe.parent().map(Path::to_path_buf).ok_or_else(|| {
        WardenError::ConfigError(format!("Binary has no parent directory: {}", exe.display()))
    })
}

/// Parse a listen port, accepting only 1..=65535
pub fn parse_port(value: &str) -> Result<u16> {
    match value.trim().parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(WardenError::InvalidPort(value.to_string())),
    }
}

fn env_port(env: &EnvVars) -> Option<u16> {
    let raw = env.get(PORT_VAR)?;
    match parse_port(raw) {
        Ok(port) => Some(port),
        Err(e) => {
            warn!("Ignoring {}: {}", PORT_VAR, e);
            None
        }
    }
}

fn load_config_file(base_dir: &Path, explicit: Option<&Path>) -> Result<ConfigFile> {
    if let Some(path) = explicit {
        return ConfigFile::from_file(&base_dir.join(path));
    }

    for name in CONFIG_FILE_NAMES {
        let candidate = base_dir.join(name);
        if candidate.is_file() {
            debug!("Loading config file {}", candidate.display());
            return ConfigFile::from_file(&candidate);
        }
    }

    Ok(ConfigFile::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn base_with_site() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join(DEFAULT_SITE_DIR)).unwrap();
        temp_dir
    }

    #[test]
    fn test_parse_port() {
        assert_eq!(parse_port("9090").unwrap(), 9090);
        assert_eq!(parse_port(" 80 ").unwrap(), 80);
        assert_eq!(parse_port("65535").unwrap(), 65535);
        assert!(matches!(parse_port("0"), Err(WardenError::InvalidPort(_))));
        assert!(matches!(parse_port("65536"), Err(WardenError::InvalidPort(_))));
        assert!(matches!(parse_port("-1"), Err(WardenError::InvalidPort(_))));
        assert!(matches!(parse_port("http"), Err(WardenError::InvalidPort(_))));
    }

    #[test]
    fn test_resolve_defaults() {
        let base = base_with_site();
        let config =
            Config::resolve(base.path(), &Overrides::default(), &EnvVars::default()).unwrap();

        let site = base.path().join(DEFAULT_SITE_DIR);
        assert_eq!(config.working_dir, site);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.log_file, site.join(LOG_FILE_NAME));
        assert_eq!(config.profile, Profile::Development);
        assert_eq!(config.backends, default_candidates(Profile::Development));
        assert_eq!(config.app, DEFAULT_APP);
        assert!(!config.wake_lock);
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.stop_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_env_port_override() {
        let base = base_with_site();
        let env = EnvVars::from_pairs([(PORT_VAR, "9090")]);
        let config = Config::resolve(base.path(), &Overrides::default(), &env).unwrap();
        assert_eq!(config.port, 9090);
    }

    #[test]
    fn test_invalid_env_port_falls_back_to_default() {
        let base = base_with_site();
        for bad in ["abc", "0", "70000", ""] {
            let env = EnvVars::from_pairs([(PORT_VAR, bad)]);
            let config = Config::resolve(base.path(), &Overrides::default(), &env).unwrap();
            assert_eq!(config.port, DEFAULT_PORT, "value {:?}", bad);
        }
    }

    #[test]
    fn test_flag_port_beats_env() {
        let base = base_with_site();
        let env = EnvVars::from_pairs([(PORT_VAR, "9090")]);
        let overrides = Overrides {
            port: Some(7000),
            ..Default::default()
        };
        let config = Config::resolve(base.path(), &overrides, &env).unwrap();
        assert_eq!(config.port, 7000);
    }

    #[test]
    fn test_missing_directory_is_config_error() {
        let base = TempDir::new().unwrap();
        let result = Config::resolve(base.path(), &Overrides::default(), &EnvVars::default());

        match result {
            Err(WardenError::MissingDirectory(path)) => {
                assert_eq!(path, base.path().join(DEFAULT_SITE_DIR));
            }
            other => panic!("Expected MissingDirectory, got {:?}", other),
        }
        assert!(!base.path().join(DEFAULT_SITE_DIR).join(LOG_FILE_NAME).exists());
    }

    #[test]
    fn test_relative_base_rejected() {
        let result = Config::resolve(
            Path::new("relative/dir"),
            &Overrides::default(),
            &EnvVars::default(),
        );
        assert!(matches!(result, Err(WardenError::ConfigError(_))));
    }

    #[test]
    fn test_absolute_dir_override_ignores_base() {
        let base = TempDir::new().unwrap();
        let site = TempDir::new().unwrap();
        let overrides = Overrides {
            dir: Some(site.path().to_path_buf()),
            ..Default::default()
        };

        let config = Config::resolve(base.path(), &overrides, &EnvVars::default()).unwrap();
        assert_eq!(config.working_dir, site.path());
        assert_eq!(config.log_file, site.path().join(LOG_FILE_NAME));
    }

    #[test]
    fn test_wake_lock_follows_platform_probe() {
        let base = base_with_site();

        let env = EnvVars::from_pairs([(PLATFORM_VAR, "0.118.0")]);
        let config = Config::resolve(base.path(), &Overrides::default(), &env).unwrap();
        assert!(config.wake_lock);

        fs::write(base.path().join("serve-warden.toml"), "wake_lock = false").unwrap();
        let config = Config::resolve(base.path(), &Overrides::default(), &env).unwrap();
        assert!(!config.wake_lock);
    }

    #[test]
    fn test_production_profile_prefers_gunicorn() {
        let base = base_with_site();
        let env = EnvVars::from_pairs([(PROFILE_VAR, "production")]);
        let config = Config::resolve(base.path(), &Overrides::default(), &env).unwrap();

        assert_eq!(config.profile, Profile::Production);
        assert_eq!(config.backends[0].name, "gunicorn");
    }

    #[test]
    fn test_config_file_is_picked_up_next_to_binary() {
        let base = TempDir::new().unwrap();
        fs::create_dir(base.path().join("public")).unwrap();
        fs::write(
            base.path().join("serve-warden.toml"),
            r#"
            dir = "public"
            port = 8000
            log_file = "logs.txt"
            poll_interval_secs = 3
            app = "wsgi:app"
        "#,
        )
        .unwrap();

        let config =
            Config::resolve(base.path(), &Overrides::default(), &EnvVars::default()).unwrap();
        assert_eq!(config.working_dir, base.path().join("public"));
        assert_eq!(config.port, 8000);
        assert_eq!(config.log_file, base.path().join("public").join("logs.txt"));
        assert_eq!(config.poll_interval, Duration::from_secs(3));
        assert_eq!(config.app, "wsgi:app");

        // Environment still beats the file
        let env = EnvVars::from_pairs([(PORT_VAR, "9090")]);
        let config = Config::resolve(base.path(), &Overrides::default(), &env).unwrap();
        assert_eq!(config.port, 9090);
    }

    #[test]
    fn test_builder_adjustments() {
        let base = base_with_site();
        let config = Config::resolve(base.path(), &Overrides::default(), &EnvVars::default())
            .unwrap()
            .with_poll_interval(Duration::from_millis(50))
            .with_stop_timeout(Duration::from_secs(1))
            .with_backends(vec![BackendSpec::new("sleeper", "sleep", &["30"])])
            .with_wake_lock(true);

        assert_eq!(config.poll_interval, Duration::from_millis(50));
        assert_eq!(config.stop_timeout, Duration::from_secs(1));
        assert_eq!(config.backends.len(), 1);
        assert!(config.wake_lock);
    }
}
