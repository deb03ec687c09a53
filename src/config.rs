use anyhow::Context;
use serde::Deserialize;
use std::{path::PathBuf, time::Duration};

pub const DEFAULT_PROVIDER_TIMEOUT_MS: u64 = 6000;
pub const DEFAULT_ITUNES_URL: &str = "https://itunes.apple.com/search";
pub const DEFAULT_DEEZER_URL: &str = "https://api.deezer.com/search";

#[derive(Debug, Deserialize)]
pub struct Config {
    pub version: u32,
    pub database: Database,
    pub http: HttpConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Config> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {path}"))?;
        let mut config: Config =
            toml::from_str(&contents).with_context(|| "Failed to parse config TOML")?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Applies `ENABLE_ENRICHMENT`, `ENRICHMENT_TIMEOUT_MS` and `PORT`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(flag) = lookup("ENABLE_ENRICHMENT") {
            self.enrichment.enabled = flag.trim() != "false";
        }
        if let Some(ms) = lookup("ENRICHMENT_TIMEOUT_MS") {
            self.enrichment.timeout_ms = ms
                .trim()
                .parse()
                .with_context(|| format!("ENRICHMENT_TIMEOUT_MS is not a number: {ms}"))?;
        }
        if let Some(port) = lookup("PORT") {
            self.http.port = port
                .trim()
                .parse()
                .with_context(|| format!("PORT is not a valid port: {port}"))?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub bind_addr: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct Database {
    pub in_memory: bool,
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EnrichmentConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// budget of a single provider call
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_itunes_url")]
    pub itunes_url: String,
    #[serde(default = "default_deezer_url")]
    pub deezer_url: String,
}

impl EnrichmentConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            timeout_ms: default_timeout_ms(),
            itunes_url: default_itunes_url(),
            deezer_url: default_deezer_url(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    DEFAULT_PROVIDER_TIMEOUT_MS
}

fn default_itunes_url() -> String {
    DEFAULT_ITUNES_URL.to_string()
}

fn default_deezer_url() -> String {
    DEFAULT_DEEZER_URL.to_string()
}
