//! TOML configuration for sitepush.
//!
//! Layered the same way for every entry point: the file named by
//! `SITEPUSH_CONFIG`, then `./sitepush.toml`, then compiled-in defaults.
//! Provider credentials are not part of the file; they come from
//! [`Credentials::from_env`] and are handed to the adapters explicitly.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SitepushConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SitepushConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded sitepush configuration");
        Ok(config)
    }

    /// Try `SITEPUSH_CONFIG`, then `./sitepush.toml`, then defaults.
    pub fn load_or_default() -> Self {
        if let Ok(env_path) = std::env::var("SITEPUSH_CONFIG") {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "SITEPUSH_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let local_path = Path::new("sitepush.toml");
        if local_path.exists() {
            match Self::load(local_path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %local_path.display(),
                        error = %e,
                        "local config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP API listens on.
    pub bind: String,
    /// Path to the SQLite database holding schedule records.
    pub database: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            database: "data/sitepush.db".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

/// Upstream endpoints and the per-request timeout applied to every
/// provider call. Zero automatic retries; a timeout is an ordinary failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub vercel_api: String,
    pub netlify_api: String,
    pub request_timeout_secs: u64,
}

impl ProvidersConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            vercel_api: "https://api.vercel.com".to_string(),
            netlify_api: "https://api.netlify.com/api/v1".to_string(),
            request_timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Whether `serve` starts the background polling loop.
    pub enabled: bool,
    /// Maximum records executed per `run_due` invocation.
    pub batch_size: usize,
    pub poll_interval_secs: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            batch_size: 5,
            poll_interval_secs: 60,
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Emit JSON log lines instead of the human-readable format.
    pub json: bool,
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// API tokens for each provider. Absent tokens surface as
/// `PublishError::Configuration` at deploy time, not at startup.
#[derive(Clone, Default)]
pub struct Credentials {
    pub vercel_token: Option<String>,
    pub netlify_token: Option<String>,
}

impl Credentials {
    /// Read `VERCEL_TOKEN` and `NETLIFY_TOKEN`. Empty values count as unset.
    pub fn from_env() -> Self {
        let read = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        let creds = Self {
            vercel_token: read("VERCEL_TOKEN"),
            netlify_token: read("NETLIFY_TOKEN"),
        };
        if creds.vercel_token.is_none() {
            warn!("VERCEL_TOKEN not set -- Vercel deploys will fail");
        }
        if creds.netlify_token.is_none() {
            warn!("NETLIFY_TOKEN not set -- Netlify deploys will fail");
        }
        creds
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |t: &Option<String>| if t.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Credentials")
            .field("vercel_token", &mask(&self.vercel_token))
            .field("netlify_token", &mask(&self.netlify_token))
            .finish()
    }
}
