use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{ConsoleError, Result};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_LOGIN_PATH: &str = "/login";
pub const BASE_URL_ENV: &str = "CHATTER_CONSOLE_URL";

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_login_path() -> String {
    DEFAULT_LOGIN_PATH.to_string()
}

fn default_connect_timeout_secs() -> u64 {
    2
}

fn default_request_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConsoleConfig {
    #[serde(default = "default_base_url", alias = "api_base_url")]
    pub base_url: String,
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            login_path: default_login_path(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ConsoleConfig {
    /// Reads `path`, writing the defaults there first when the file does not exist.
    pub fn load_or_init(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save(path)?;
            return Ok(config);
        }
        Self::from_file(path)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| ConsoleError::Config(format!("{}: {e}", path.display())))?;
        let config: ConsoleConfig = serde_json::from_str(&raw)
            .map_err(|e| ConsoleError::Config(format!("{}: {e}", path.display())))?;
        config.normalized()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConsoleError::Config(e.to_string()))?;
        }
        let body = serde_json::to_string_pretty(self)?;
        fs::write(path, body).map_err(|e| ConsoleError::Config(e.to_string()))
    }

    /// Environment wins over the file for the base URL.
    pub fn apply_env(mut self) -> Self {
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.trim().is_empty() {
                self.base_url = url;
            }
        }
        self
    }

    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        if let Some(url) = base_url.filter(|url| !url.trim().is_empty()) {
            self.base_url = url;
        }
        self
    }

    pub fn normalized(mut self) -> Result<Self> {
        self.base_url = normalize_base_url(&self.base_url)?;
        let login = self.login_path.trim();
        self.login_path = if login.is_empty() {
            default_login_path()
        } else if login.starts_with('/') {
            login.to_string()
        } else {
            format!("/{login}")
        };
        if self.request_timeout_secs == 0 {
            return Err(ConsoleError::Config(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(self)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

pub fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ConsoleError::Config("base_url cannot be empty".to_string()));
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("http://{trimmed}"))
    }
}
