//! Proxy configuration
//!
//! Settings are resolved once at startup from three layers, highest
//! precedence first:
//!
//! 1. environment variables
//! 2. a JSON config file (`index.json` in the working directory by default)
//! 3. built-in defaults
//!
//! ```json
//! { "port": 1080, "user": "proxyuser", "pass": "proxypass" }
//! ```

use crate::auth::UserPass;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_CONFIG_FILE: &str = "index.json";
pub const DEFAULT_PORT: u16 = 1080;
pub const DEFAULT_USERNAME: &str = "proxyuser";
pub const DEFAULT_PASSWORD: &str = "proxypass";

/// Environment variables consulted for each setting, first non-empty wins
const PORT_VARS: &[&str] = &["PORT"];
const USERNAME_VARS: &[&str] = &["USERNAME", "USER", "USERNAME_PROXY"];
const PASSWORD_VARS: &[&str] = &["PASS", "PASSWORD", "PASS_PROXY"];

/// Errors raised while reading the config file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// FileConfig mirrors the JSON config file. Every key is optional and
/// unknown keys are ignored
#[derive(Debug, Default, Deserialize, PartialEq)]
pub struct FileConfig {
    pub port: Option<u16>,

    #[serde(alias = "username")]
    pub user: Option<String>,

    #[serde(alias = "password")]
    pub pass: Option<String>,
}

/// ProxyConfig is the resolved, read-only configuration of the proxy
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyConfig {
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            username: DEFAULT_USERNAME.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
        }
    }
}

/// ProxyConfig implementation block
impl ProxyConfig {
    /// load resolves the configuration from the file at `path` and the
    /// process environment. A missing file is fine; an unreadable or
    /// malformed one is logged and skipped
    pub fn load(path: &Path) -> Self {
        let file = match load_file(path) {
            Ok(Some(file)) => {
                debug!("loaded configuration from {}", path.display());
                file
            }
            Ok(None) => {
                debug!("no config file at {}", path.display());
                FileConfig::default()
            }
            Err(e) => {
                warn!("ignoring config file: {e}");
                FileConfig::default()
            }
        };

        Self::resolve(file, |name| std::env::var(name).ok())
    }

    /// resolve merges file settings with environment lookups and defaults
    pub fn resolve<F>(file: FileConfig, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_port = first_non_empty(&env, PORT_VARS).and_then(|value| {
            value
                .trim()
                .parse::<u16>()
                .map_err(|e| warn!("ignoring invalid PORT {value:?}: {e}"))
                .ok()
        });

        // Zero and empty values fall back to the defaults
        let port = env_port
            .or(file.port)
            .filter(|port| *port != 0)
            .unwrap_or(DEFAULT_PORT);

        let username = first_non_empty(&env, USERNAME_VARS)
            .or(file.user)
            .filter(|user| !user.is_empty())
            .unwrap_or_else(|| DEFAULT_USERNAME.to_string());

        let password = first_non_empty(&env, PASSWORD_VARS)
            .or(file.pass)
            .filter(|pass| !pass.is_empty())
            .unwrap_or_else(|| DEFAULT_PASSWORD.to_string());

        Self {
            port,
            username,
            password,
        }
    }

    /// credentials returns the username/password every client must present
    pub fn credentials(&self) -> UserPass {
        UserPass {
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }

    /// listen_addr is the address the listener binds to: all interfaces
    pub fn listen_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

/// load_file reads and parses the JSON config file, if there is one
pub fn load_file(path: &Path) -> Result<Option<FileConfig>, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.display().to_string(),
                source,
            });
        }
    };

    let file = serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })?;

    Ok(Some(file))
}

fn first_non_empty<F>(env: &F, names: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    names
        .iter()
        .filter_map(|name| env(name))
        .find(|value| !value.is_empty())
}
