//! Gateway configuration.
//!
//! Environment variables are read once at startup; they are treated as
//! immutable at runtime. Secrets are wrapped in [`SecretString`] so they
//! stay out of debug output and logs.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::upstream::DEFAULT_UPSTREAM_TIMEOUT;
use crate::{Error, Result};

const ENV_PREFIX: &str = "TOLLGATE_";

const DEFAULT_UPSTREAM_URL: &str = "https://api.anthropic.com";

/// Bounded token budget forwarded with every completion request.
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 4000;

/// Process-level configuration for a [`crate::Gateway`].
pub struct GatewayConfig {
    /// Upstream provider base URL
    pub upstream_base_url: String,
    /// Upstream API key; absent means the gateway cannot forward requests
    /// (health reports it, generate calls fail upstream)
    pub upstream_api_key: Option<SecretString>,
    /// Administrative secret, distinct from every tenant credential
    pub admin_secret: SecretString,
    /// Snapshot location; `None` keeps state in memory only
    pub data_path: Option<PathBuf>,
    /// Bound on one upstream call
    pub upstream_timeout: Duration,
    /// Token budget per completion
    pub max_output_tokens: u32,
}

impl GatewayConfig {
    /// Programmatic configuration with defaults for everything but the
    /// admin secret.
    pub fn new(admin_secret: SecretString) -> Self {
        Self {
            upstream_base_url: DEFAULT_UPSTREAM_URL.to_string(),
            upstream_api_key: None,
            admin_secret,
            data_path: None,
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }

    /// Read configuration from `TOLLGATE_*` environment variables.
    ///
    /// `TOLLGATE_ADMIN_SECRET` is required; there is deliberately no
    /// built-in default for it. `TOLLGATE_UPSTREAM_API_KEY`,
    /// `TOLLGATE_UPSTREAM_URL`, `TOLLGATE_DATA_PATH`,
    /// `TOLLGATE_UPSTREAM_TIMEOUT_SECS`, and `TOLLGATE_MAX_OUTPUT_TOKENS`
    /// are optional.
    pub fn from_env() -> Result<Self> {
        let admin_secret = env_var("ADMIN_SECRET").ok_or_else(|| {
            Error::Config(format!("{ENV_PREFIX}ADMIN_SECRET must be set"))
        })?;

        let upstream_timeout = match env_var("UPSTREAM_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(parse_env("UPSTREAM_TIMEOUT_SECS", &raw)?),
            None => DEFAULT_UPSTREAM_TIMEOUT,
        };
        let max_output_tokens = match env_var("MAX_OUTPUT_TOKENS") {
            Some(raw) => parse_env("MAX_OUTPUT_TOKENS", &raw)?,
            None => DEFAULT_MAX_OUTPUT_TOKENS,
        };

        Ok(Self {
            upstream_base_url: env_var("UPSTREAM_URL")
                .unwrap_or_else(|| DEFAULT_UPSTREAM_URL.to_string()),
            upstream_api_key: env_var("UPSTREAM_API_KEY").map(SecretString::from),
            admin_secret: SecretString::from(admin_secret),
            data_path: Some(
                env_var("DATA_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(crate::ledger::GatewayStore::default_path),
            ),
            upstream_timeout,
            max_output_tokens,
        })
    }

    /// Whether the upstream API key is configured.
    pub fn upstream_configured(&self) -> bool {
        self.upstream_api_key.is_some()
    }

    pub fn with_upstream_url(mut self, url: impl Into<String>) -> Self {
        self.upstream_base_url = url.into();
        self
    }

    pub fn with_upstream_api_key(mut self, key: SecretString) -> Self {
        self.upstream_api_key = Some(key);
        self
    }

    pub fn with_data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_path = Some(path.into());
        self
    }

    pub fn with_upstream_timeout(mut self, timeout: Duration) -> Self {
        self.upstream_timeout = timeout;
        self
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("upstream_base_url", &self.upstream_base_url)
            .field("upstream_configured", &self.upstream_configured())
            .field("data_path", &self.data_path)
            .field("upstream_timeout", &self.upstream_timeout)
            .field("max_output_tokens", &self.max_output_tokens)
            .finish_non_exhaustive()
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{key}"))
        .ok()
        .filter(|v| !v.is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse().map_err(|_| {
        Error::Config(format!("invalid value for {ENV_PREFIX}{key}: {raw:?}"))
    })
}
