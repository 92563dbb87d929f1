//! Local settings and credential storage.
//!
//! Settings live in `config.json` inside a per-user directory (by default
//! `~/.mockfactory`). The bearer token is kept next to it in a separate
//! `token` file that only the owning user can read or write, so it never
//! ends up in a config dump.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Public endpoint of the execution service.
pub const DEFAULT_API_URL: &str = "https://mockfactory.io";

/// Request timeout used when nothing else is configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Inclusive bounds for the request timeout.
pub const MIN_TIMEOUT_SECS: u64 = 1;
pub const MAX_TIMEOUT_SECS: u64 = 300;

const CONFIG_DIR_NAME: &str = ".mockfactory";
const CONFIG_FILE_NAME: &str = "config.json";
const TOKEN_FILE_NAME: &str = "token";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine the home directory")]
    NoHomeDir,

    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("timeout must be an integer between 1 and 300 seconds, got {0}")]
    InvalidTimeout(String),

    #[error("invalid API URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl ConfigError {
    fn io(path: &Path, source: io::Error) -> Self {
        ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Settings for one invocation of the CLI.
///
/// The timeout is always within [`MIN_TIMEOUT_SECS`, `MAX_TIMEOUT_SECS`];
/// every way of building or changing a `Config` goes through validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ConfigFile")]
pub struct Config {
    api_url: String,
    timeout: u64,
    session_id: Option<String>,
}

/// On-disk shape. Missing keys take defaults and unknown keys are ignored.
#[derive(Deserialize)]
#[serde(default)]
struct ConfigFile {
    api_url: String,
    timeout: u64,
    session_id: Option<String>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        ConfigFile {
            api_url: DEFAULT_API_URL.to_string(),
            timeout: DEFAULT_TIMEOUT_SECS,
            session_id: None,
        }
    }
}

impl TryFrom<ConfigFile> for Config {
    type Error = ConfigError;

    /// An unusable `api_url` falls back to the default on its own; an
    /// out-of-bounds timeout rejects the whole file.
    fn try_from(file: ConfigFile) -> Result<Self, Self::Error> {
        let mut config = Config::default();
        config.set_timeout(file.timeout)?;
        config.set_session_id(file.session_id);
        if let Err(e) = config.set_api_url(file.api_url) {
            warn!(error = %e, "ignoring api_url from config, using default");
        }
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_url: DEFAULT_API_URL.to_string(),
            timeout: DEFAULT_TIMEOUT_SECS,
            session_id: None,
        }
    }
}

impl Config {
    pub fn new(
        api_url: impl Into<String>,
        timeout: u64,
        session_id: Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Config::default();
        config.set_api_url(api_url)?;
        config.set_timeout(timeout)?;
        config.set_session_id(session_id);
        Ok(config)
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn timeout(&self) -> u64 {
        self.timeout
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Sets the service base URL. Only absolute http(s) URLs are accepted.
    pub fn set_api_url(&mut self, url: impl Into<String>) -> Result<(), ConfigError> {
        let url = url.into();
        let parsed = reqwest::Url::parse(&url).map_err(|e| ConfigError::InvalidUrl {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
                url,
            });
        }
        self.api_url = url;
        Ok(())
    }

    pub fn set_timeout(&mut self, secs: u64) -> Result<(), ConfigError> {
        if !(MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS).contains(&secs) {
            return Err(ConfigError::InvalidTimeout(secs.to_string()));
        }
        self.timeout = secs;
        Ok(())
    }

    /// An empty session id is treated as "no session".
    pub fn set_session_id(&mut self, session_id: Option<String>) {
        self.session_id = session_id.filter(|s| !s.is_empty());
    }

    /// Applies a `config set` style update, validating the value for `key`.
    pub fn apply(&mut self, key: ConfigKey, value: &str) -> Result<(), ConfigError> {
        match key {
            ConfigKey::ApiUrl => self.set_api_url(value),
            ConfigKey::Timeout => {
                let secs = value
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| ConfigError::InvalidTimeout(value.to_string()))?;
                self.set_timeout(secs)
            }
            ConfigKey::SessionId => {
                self.set_session_id(Some(value.to_string()));
                Ok(())
            }
        }
    }
}

/// The settings a user may change from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum ConfigKey {
    ApiUrl,
    Timeout,
    SessionId,
}

impl ConfigKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigKey::ApiUrl => "api_url",
            ConfigKey::Timeout => "timeout",
            ConfigKey::SessionId => "session_id",
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle on the per-user settings directory.
///
/// There is no file locking: two processes saving at the same time race
/// and the last writer wins.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    /// Store rooted at `~/.mockfactory`.
    pub fn open_default() -> Result<Self, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(ConfigStore::at(home.join(CONFIG_DIR_NAME)))
    }

    /// Store rooted at an explicit directory.
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        ConfigStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE_NAME)
    }

    pub fn token_path(&self) -> PathBuf {
        self.dir.join(TOKEN_FILE_NAME)
    }

    /// Loads settings, falling back to defaults when the file is missing,
    /// unreadable, malformed or out of bounds. Never fails.
    pub fn load(&self) -> Config {
        if let Err(e) = fs::create_dir_all(&self.dir) {
            warn!(dir = %self.dir.display(), error = %e, "could not create config directory");
        }

        let path = self.config_path();
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Config::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read config, using defaults");
                return Config::default();
            }
        };

        match serde_json::from_str::<Config>(&contents) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "invalid config, using defaults");
                Config::default()
            }
        }
    }

    /// Writes the full config, replacing the file. The token is never part of it.
    pub fn save(&self, config: &Config) -> Result<(), ConfigError> {
        self.ensure_dir()?;
        let path = self.config_path();
        let json = serde_json::to_string_pretty(config)?;
        fs::write(&path, json).map_err(|e| ConfigError::io(&path, e))?;
        debug!(path = %path.display(), "saved config");
        Ok(())
    }

    /// Returns the stored token, or `None` if there is none or it cannot be read.
    pub fn get_token(&self) -> Option<String> {
        let path = self.token_path();
        match fs::read_to_string(&path) {
            Ok(contents) => {
                let token = contents.trim();
                (!token.is_empty()).then(|| token.to_string())
            }
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    debug!(path = %path.display(), error = %e, "ignoring unreadable token file");
                }
                None
            }
        }
    }

    /// Writes the token to a file readable and writable only by the owner.
    pub fn save_token(&self, token: &str) -> Result<(), ConfigError> {
        self.ensure_dir()?;
        let path = self.token_path();
        let mut file = open_private(&path).map_err(|e| ConfigError::io(&path, e))?;
        file.write_all(token.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|e| ConfigError::io(&path, e))?;
        debug!(path = %path.display(), "saved token");
        Ok(())
    }

    /// Removes the token file. Succeeds if it is already gone.
    pub fn delete_token(&self) -> Result<(), ConfigError> {
        let path = self.token_path();
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "deleted token");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ConfigError::io(&path, e)),
        }
    }

    fn ensure_dir(&self) -> Result<(), ConfigError> {
        fs::create_dir_all(&self.dir).map_err(|e| ConfigError::io(&self.dir, e))
    }
}

/// Opens `path` for writing with owner-only permissions from creation.
/// An existing file has its mode tightened before anything is written.
#[cfg(unix)]
fn open_private(path: &Path) -> io::Result<fs::File> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> io::Result<fs::File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}
