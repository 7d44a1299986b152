//! Shared configuration for the rackforge CLI.
//!
//! Layered loading: `rackforge.toml` (working directory, then the user
//! config directory), overridden by `RACKFORGE_*` environment variables,
//! with the backend credentials also honored under their conventional
//! names `NETBOX_URL` and `NETBOX_TOKEN`.

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use rackforge_api::{TlsMode, TransportConfig};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("backend URL not configured (set NETBOX_URL or url in rackforge.toml)")]
    MissingUrl,

    #[error("backend token not configured (set NETBOX_TOKEN or token in rackforge.toml)")]
    MissingToken,

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── Config ──────────────────────────────────────────────────────────

/// Raw configuration as loaded from file and environment.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Backend base URL, e.g. `https://netbox.example.com`.
    pub url: Option<String>,

    /// API token (plaintext in the file -- prefer the env var).
    pub token: Option<String>,

    /// Root directory of the YAML definitions tree.
    #[serde(default = "default_definitions_dir")]
    pub definitions_dir: PathBuf,

    /// Accept invalid TLS certificates (self-signed backends).
    #[serde(default)]
    pub insecure: bool,

    /// Path to a custom CA certificate (PEM).
    pub ca_cert: Option<PathBuf>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: None,
            token: None,
            definitions_dir: default_definitions_dir(),
            insecure: false,
            ca_cert: None,
            timeout: default_timeout(),
        }
    }
}

fn default_definitions_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_timeout() -> u64 {
    30
}

/// Location of the user-level config file, if a home directory exists.
pub fn user_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "rackforge").map(|dirs| dirs.config_dir().join("rackforge.toml"))
}

/// Load configuration: defaults ← user file ← local file ← environment.
pub fn load() -> Result<Config, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));

    if let Some(user_path) = user_config_path() {
        figment = figment.merge(Toml::file(user_path));
    }
    figment = figment
        .merge(Toml::file("rackforge.toml"))
        .merge(Env::prefixed("RACKFORGE_"))
        // Conventional backend credential variables win over everything.
        .merge(Env::raw().only(&["NETBOX_URL"]).map(|_| "url".into()))
        .merge(Env::raw().only(&["NETBOX_TOKEN"]).map(|_| "token".into()));

    Ok(figment.extract()?)
}

// ── Resolution ──────────────────────────────────────────────────────

/// Fully-resolved settings ready to build a client from.
pub struct ResolvedConfig {
    pub url: String,
    pub token: SecretString,
    pub definitions_dir: PathBuf,
    pub transport: TransportConfig,
}

impl Config {
    /// Validate and resolve into connection settings.
    pub fn resolve(self) -> Result<ResolvedConfig, ConfigError> {
        let url = self.url.filter(|u| !u.is_empty()).ok_or(ConfigError::MissingUrl)?;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Validation {
                field: "url".into(),
                reason: format!("'{url}' is not an http(s) URL"),
            });
        }

        let token: SecretString = self
            .token
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingToken)?
            .into();

        let tls = if self.insecure {
            TlsMode::DangerAcceptInvalid
        } else if let Some(ca) = self.ca_cert {
            TlsMode::CustomCa(ca)
        } else {
            TlsMode::System
        };

        Ok(ResolvedConfig {
            url,
            token,
            definitions_dir: self.definitions_dir,
            transport: TransportConfig {
                tls,
                timeout: Duration::from_secs(self.timeout),
            },
        })
    }
}
