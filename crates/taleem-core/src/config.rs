//! Application configuration management.
//!
//! Two kinds of configuration live here:
//!
//! - `ApiConfig`: the backend base URL, chosen once at startup from the
//!   deployment mode and never changed afterward.
//! - `Config`: user preferences persisted at
//!   `~/.config/taleem-edge/config.json` (last email, credential backend).

use std::path::PathBuf;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application name used for config/data directory paths
pub const APP_NAME: &str = "taleem-edge";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Selects local vs deployed backend
pub const MODE_VAR: &str = "TALEEM_MODE";

/// Base URL used when `TALEEM_MODE=development`
pub const LOCAL_URL_VAR: &str = "TALEEM_API_BASE_URL_LOCAL";

/// Base URL used for every other mode
pub const DEPLOY_URL_VAR: &str = "TALEEM_API_BASE_URL_DEPLOY";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("API base URL is not configured (set {0})")]
    MissingBaseUrl(&'static str),

    #[error("Invalid API base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("Request path '{path}' resolves outside the API base URL")]
    PathOutsideBase { path: String },

    #[error("Could not find {0} directory")]
    NoDirectory(&'static str),

    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config file is malformed: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Deployment environment the backend URL is selected for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Local,
    Deployed,
}

impl Environment {
    /// `development` selects the local backend, anything else the deployed one.
    pub fn from_mode(mode: Option<&str>) -> Self {
        match mode {
            Some(m) if m.trim().eq_ignore_ascii_case("development") => Environment::Local,
            _ => Environment::Deployed,
        }
    }

    pub fn from_env() -> Self {
        Self::from_mode(std::env::var(MODE_VAR).ok().as_deref())
    }

    /// Environment variable holding the base URL for this environment.
    pub fn url_var(&self) -> &'static str {
        match self {
            Environment::Local => LOCAL_URL_VAR,
            Environment::Deployed => DEPLOY_URL_VAR,
        }
    }
}

/// Validated backend root URL. Relative request paths are resolved against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    base_url: Url,
}

impl ApiConfig {
    /// Validate a base URL. Fails for empty, unparsable or non-http(s) values.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let trimmed = base_url.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: "empty".to_string(),
            });
        }

        // A trailing slash makes `Url::join` append instead of replacing the last segment
        let normalized = if trimmed.ends_with('/') {
            trimmed.to_string()
        } else {
            format!("{}/", trimmed)
        };

        let base_url = Url::parse(&normalized).map_err(|e| ConfigError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;

        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: format!("unsupported scheme '{}'", base_url.scheme()),
            });
        }

        Ok(Self { base_url })
    }

    /// Pick the base URL for `env` using the provided variable lookup.
    pub fn for_environment<F>(env: Environment, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = env.url_var();
        match lookup(var) {
            Some(url) if !url.trim().is_empty() => Self::new(&url),
            _ => Err(ConfigError::MissingBaseUrl(var)),
        }
    }

    /// Read `TALEEM_MODE` and the matching base URL variable from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::for_environment(Environment::from_env(), |name| std::env::var(name).ok())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a request path against the base URL.
    ///
    /// Leading slashes are stripped so `/library/books/` and `library/books/`
    /// both land under the base path. Absolute URLs and `..` segments that
    /// leave the base origin or path are rejected.
    pub fn resolve(&self, path: &str) -> Result<Url, ConfigError> {
        let relative = path.trim_start_matches('/');
        let url = self
            .base_url
            .join(relative)
            .map_err(|e| ConfigError::InvalidBaseUrl {
                url: format!("{}{}", self.base_url, relative),
                reason: e.to_string(),
            })?;

        let same_origin = url.origin() == self.base_url.origin();
        if !same_origin || !url.path().starts_with(self.base_url.path()) {
            return Err(ConfigError::PathOutsideBase {
                path: path.to_string(),
            });
        }
        Ok(url)
    }
}

/// Where session credentials are persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialBackend {
    #[default]
    File,
    Keyring,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub last_email: Option<String>,
    #[serde(default)]
    pub credential_backend: CredentialBackend,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoDirectory("config"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the file-backed session.
    pub fn data_dir() -> Result<PathBuf, ConfigError> {
        let data_dir = dirs::data_local_dir().ok_or(ConfigError::NoDirectory("data"))?;
        Ok(data_dir.join(APP_NAME))
    }
}
