use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

use price_scout_core::frame::{DEFAULT_MAX_FRAME_BYTES, DEFAULT_SUCCESS_MARKER};
use price_scout_core::SourceDescriptor;

/// Environment variable that overrides `[endpoint].base_url`.
pub const BASE_URL_ENV: &str = "SCOUT_BASE_URL";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub endpoint: EndpointConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub stream: StreamConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EndpointConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_search_path")]
    pub search_path: String,
    #[serde(default = "default_query_param")]
    pub query_param: String,
    #[serde(default = "default_sort_param")]
    pub sort_param: String,
    #[serde(default = "default_subscribe_path")]
    pub subscribe_path: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            search_path: default_search_path(),
            query_param: default_query_param(),
            sort_param: default_sort_param(),
            subscribe_path: default_subscribe_path(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:5000".to_string()
}
fn default_search_path() -> String {
    "/search".to_string()
}
fn default_query_param() -> String {
    "query".to_string()
}
fn default_sort_param() -> String {
    "sort".to_string()
}
fn default_subscribe_path() -> String {
    "/subscribe-price-alert".to_string()
}
fn default_connect_timeout_secs() -> u64 {
    10
}

impl EndpointConfig {
    pub fn search_url(&self) -> String {
        join_url(&self.base_url, &self.search_path)
    }

    pub fn subscribe_url(&self) -> String {
        join_url(&self.base_url, &self.subscribe_path)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// The known store universe, in status-panel order.
#[derive(Debug, Deserialize, Clone)]
pub struct SourcesConfig {
    #[serde(default = "default_stores")]
    pub stores: Vec<String>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            stores: default_stores(),
        }
    }
}

fn default_stores() -> Vec<String> {
    price_scout_core::default_sources()
        .into_iter()
        .map(|s| s.display_name)
        .collect()
}

impl SourcesConfig {
    pub fn descriptors(&self) -> Vec<SourceDescriptor> {
        self.stores
            .iter()
            .map(|name| SourceDescriptor::new(name))
            .collect()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StreamConfig {
    #[serde(default = "default_success_marker")]
    pub success_marker: String,
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            success_marker: default_success_marker(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

fn default_success_marker() -> String {
    DEFAULT_SUCCESS_MARKER.to_string()
}
fn default_max_frame_bytes() -> usize {
    DEFAULT_MAX_FRAME_BYTES
}

impl Config {
    /// Built-in defaults, used when no config file exists.
    pub fn minimal() -> Self {
        Self::default()
    }

    fn override_base_url(&mut self, base_url: Option<&str>) {
        if let Some(url) = base_url.map(str::trim).filter(|u| !u.is_empty()) {
            self.endpoint.base_url = url.to_string();
        }
    }

    pub fn validate(&self) -> Result<()> {
        let base = self.endpoint.base_url.trim();
        if base.is_empty() {
            bail!("endpoint.base_url must not be empty");
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            bail!(
                "endpoint.base_url must start with http:// or https:// (got '{}')",
                base
            );
        }
        if self.endpoint.query_param.trim().is_empty() || self.endpoint.sort_param.trim().is_empty()
        {
            bail!("endpoint.query_param and endpoint.sort_param must not be empty");
        }

        if self.stream.max_frame_bytes == 0 {
            bail!("stream.max_frame_bytes must be > 0");
        }
        if self.stream.success_marker.is_empty() {
            bail!("stream.success_marker must not be empty");
        }

        let mut seen = HashSet::new();
        for source in self.sources.descriptors() {
            if source.id.as_str().is_empty() {
                bail!("sources.stores must not contain blank names");
            }
            if !seen.insert(source.id.clone()) {
                bail!(
                    "sources.stores lists '{}' more than once",
                    source.display_name
                );
            }
        }

        Ok(())
    }
}

fn env_base_url() -> Option<String> {
    std::env::var(BASE_URL_ENV).ok()
}

/// Load `path`, applying `SCOUT_BASE_URL` when it is set.
pub fn load_config(path: &Path) -> Result<Config> {
    load_config_with(path, env_base_url().as_deref())
}

/// Load `path` with an explicit base URL override instead of the environment.
pub fn load_config_with(path: &Path, base_url: Option<&str>) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.override_base_url(base_url);
    config.validate()?;
    Ok(config)
}

/// Load `path` if it exists, otherwise fall back to [`Config::minimal`].
pub fn load_or_default(path: &Path) -> Result<Config> {
    load_or_default_with(path, env_base_url().as_deref())
}

pub fn load_or_default_with(path: &Path, base_url: Option<&str>) -> Result<Config> {
    if path.exists() {
        return load_config_with(path, base_url);
    }
    tracing::debug!(path = %path.display(), "config file not found, using defaults");
    let mut config = Config::minimal();
    config.override_base_url(base_url);
    config.validate()?;
    Ok(config)
}
