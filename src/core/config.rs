/// Grafana Connection Configuration
///
/// The Grafana base URL and API key can come from the process environment
/// (read once per STDIO session) or from request headers (read once per HTTP
/// request). Each source is a pure extractor producing a `PartialConfig`;
/// `ConfigPipeline` layers them in order and fills in defaults.
///
/// Precedence, highest first: request headers, environment, built-in default.

use actix_web::http::header::HeaderMap;
use url::Url;

use crate::core::error::ConfigError;

pub const DEFAULT_GRAFANA_URL: &str = "http://localhost:3000";

pub const GRAFANA_URL_ENV_VAR: &str = "GRAFANA_URL";
pub const GRAFANA_API_KEY_ENV_VAR: &str = "GRAFANA_API_KEY";

pub const GRAFANA_URL_HEADER: &str = "X-Grafana-URL";
pub const GRAFANA_API_KEY_HEADER: &str = "X-Grafana-API-Key";

/// Values supplied by a single configuration source.
///
/// `None` means the source said nothing about the field. Empty strings are
/// treated the same as missing values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
}

impl PartialConfig {
    pub fn new(url: Option<String>, api_key: Option<String>) -> Self {
        Self {
            url: url
                .map(|url| url.trim().trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty()),
            api_key: api_key.filter(|key| !key.is_empty()),
        }
    }

    /// Read `GRAFANA_URL` and `GRAFANA_API_KEY` from the process environment.
    pub fn from_env() -> Self {
        Self::from_env_lookup(|key| std::env::var(key).ok())
    }

    /// Read the environment variables through `lookup`.
    pub fn from_env_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::new(lookup(GRAFANA_URL_ENV_VAR), lookup(GRAFANA_API_KEY_ENV_VAR))
    }

    /// Read `X-Grafana-URL` and `X-Grafana-API-Key` from request headers.
    ///
    /// Header values that are not visible ASCII are ignored.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        Self::new(header(GRAFANA_URL_HEADER), header(GRAFANA_API_KEY_HEADER))
    }

    /// Layer `later` on top of `self`. Fields `later` leaves empty keep their
    /// current value.
    pub fn overlay(self, later: PartialConfig) -> PartialConfig {
        PartialConfig {
            url: later.url.or(self.url),
            api_key: later.api_key.or(self.api_key),
        }
    }

    /// Fill in the defaults and validate the URL.
    pub fn resolve(self) -> Result<GrafanaConfig, ConfigError> {
        let url = self.url.unwrap_or_else(|| DEFAULT_GRAFANA_URL.to_string());
        let parsed = Url::parse(&url).map_err(|e| ConfigError::InvalidUrl {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
                url,
            });
        }
        Ok(GrafanaConfig {
            url,
            api_key: self.api_key.unwrap_or_default(),
        })
    }
}

/// Fully resolved Grafana connection parameters.
#[derive(Clone, PartialEq, Eq)]
pub struct GrafanaConfig {
    /// Base URL without a trailing slash.
    pub url: String,
    /// API key or service account token; empty when unauthenticated.
    pub api_key: String,
}

impl GrafanaConfig {
    pub fn api_key_set(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// The URL with any embedded password masked, for logging.
    pub fn redacted_url(&self) -> String {
        match Url::parse(&self.url) {
            Ok(mut url) if url.password().is_some() => {
                // set_password only fails for cannot-be-a-base URLs, which have no password.
                let _ = url.set_password(Some("xxxxx"));
                url.to_string()
            }
            _ => self.url.clone(),
        }
    }
}

impl Default for GrafanaConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_GRAFANA_URL.to_string(),
            api_key: String::new(),
        }
    }
}

impl std::fmt::Debug for GrafanaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrafanaConfig")
            .field("url", &self.redacted_url())
            .field("api_key_set", &self.api_key_set())
            .finish()
    }
}

type Extractor<'a> = Box<dyn Fn() -> PartialConfig + 'a>;

/// Ordered list of configuration extractors.
///
/// Extractors run in insertion order. For each field the last extractor that
/// supplies a value wins; an extractor that supplies nothing never clears a
/// value set before it.
///
/// ```rust
/// use mcp_grafana::core::config::{ConfigPipeline, PartialConfig, DEFAULT_GRAFANA_URL};
///
/// let config = ConfigPipeline::new()
///     .layer(PartialConfig::new(Some("http://env:3000".into()), None))
///     .then(|| PartialConfig::new(None, Some("abc".into())))
///     .resolve()
///     .unwrap();
/// assert_eq!(config.url, "http://env:3000");
/// assert_eq!(config.api_key, "abc");
///
/// let fallback = ConfigPipeline::new().resolve().unwrap();
/// assert_eq!(fallback.url, DEFAULT_GRAFANA_URL);
/// ```
#[derive(Default)]
pub struct ConfigPipeline<'a> {
    extractors: Vec<Extractor<'a>>,
}

impl<'a> ConfigPipeline<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an extractor.
    pub fn then<F>(mut self, extractor: F) -> Self
    where
        F: Fn() -> PartialConfig + 'a,
    {
        self.extractors.push(Box::new(extractor));
        self
    }

    /// Append an already extracted source.
    pub fn layer(self, partial: PartialConfig) -> Self {
        self.then(move || partial.clone())
    }

    pub fn merged(&self) -> PartialConfig {
        self.extractors
            .iter()
            .fold(PartialConfig::default(), |merged, extract| merged.overlay(extract()))
    }

    pub fn resolve(&self) -> Result<GrafanaConfig, ConfigError> {
        self.merged().resolve()
    }
}

/// Configuration for a STDIO session: environment only.
pub fn session_config(environment: &PartialConfig) -> Result<GrafanaConfig, ConfigError> {
    ConfigPipeline::new().layer(environment.clone()).resolve()
}

/// Configuration for one HTTP request: environment, then request headers.
pub fn request_config(
    environment: &PartialConfig,
    headers: &HeaderMap,
) -> Result<GrafanaConfig, ConfigError> {
    ConfigPipeline::new()
        .layer(environment.clone())
        .then(|| PartialConfig::from_headers(headers))
        .resolve()
}
