// src/config/sourcing.rs
//! Pipeline settings loaded from TOML. Every section and key is optional.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_SOURCING_CONFIG_PATH: &str = "config/sourcing.toml";
pub const ENV_SOURCING_CONFIG_PATH: &str = "SOURCING_CONFIG_PATH";
pub const ENV_CACHE_TTL_SECS: &str = "SOURCING_CACHE_TTL_SECS";
pub const ENV_MAX_WAIT_SECS: &str = "SOURCING_MAX_WAIT_SECS";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SourcingConfig {
    pub acquire: AcquireCfg,
    pub providers: ProvidersCfg,
    pub cache: CacheCfg,
    pub classifier: ClassifierCfg,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AcquireCfg {
    pub provider_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub max_wait_secs: u64,
    pub max_items: usize,
}

impl Default for AcquireCfg {
    fn default() -> Self {
        Self {
            provider_timeout_secs: 90,
            poll_interval_ms: 5_000,
            max_wait_secs: 60,
            max_items: 20,
        }
    }
}

impl AcquireCfg {
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProvidersCfg {
    pub actor: ActorCfg,
    pub web_scrape: WebScrapeCfg,
    pub synthetic: SyntheticCfg,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ActorCfg {
    pub enabled: bool,
    pub base_url: String,
    /// "ENV" means: read from APIFY_TOKEN
    pub token: String,
    pub actor_id: String,
}

impl Default for ActorCfg {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "https://api.apify.com/v2".into(),
            token: "ENV".into(),
            actor_id: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebScrapeCfg {
    pub enabled: bool,
    pub base_url: String,
    /// "ENV" means: read from FIRECRAWL_API_KEY
    pub api_key: String,
    /// `{query}` is replaced with the url-encoded search term.
    pub search_url_template: String,
}

impl Default for WebScrapeCfg {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "https://api.firecrawl.dev".into(),
            api_key: "ENV".into(),
            search_url_template: "https://www.made-in-china.com/multi-search/{query}/F1/1.html"
                .into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyntheticCfg {
    pub enabled: bool,
    pub count: usize,
}

impl Default for SyntheticCfg {
    fn default() -> Self {
        Self {
            enabled: true,
            count: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheCfg {
    pub ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for CacheCfg {
    fn default() -> Self {
        Self {
            ttl_secs: 3_600,
            sweep_interval_secs: 600,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierCfg {
    /// Product count at or below which a catalog counts as "narrow".
    pub narrow_range_max: usize,
}

impl Default for ClassifierCfg {
    fn default() -> Self {
        Self {
            narrow_range_max: crate::classify::NARROW_PRODUCT_RANGE_MAX,
        }
    }
}

impl SourcingConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: SourcingConfig = toml::from_str(s).context("parsing sourcing toml")?;
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading sourcing config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Load using env var + fallbacks:
    /// 1) $SOURCING_CONFIG_PATH
    /// 2) config/sourcing.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_SOURCING_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("SOURCING_CONFIG_PATH points to non-existent path"));
            }
            return Self::load_from(&pb);
        }
        let p = PathBuf::from(DEFAULT_SOURCING_CONFIG_PATH);
        if p.exists() {
            return Self::load_from(&p);
        }
        let mut cfg = Self::default();
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(v) = parse_u64_env(ENV_CACHE_TTL_SECS) {
            self.cache.ttl_secs = v;
        }
        if let Some(v) = parse_u64_env(ENV_MAX_WAIT_SECS) {
            self.acquire.max_wait_secs = v;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.acquire.poll_interval_ms == 0 {
            return Err(anyhow!("acquire.poll_interval_ms must be > 0"));
        }
        if self.cache.sweep_interval_secs == 0 {
            return Err(anyhow!("cache.sweep_interval_secs must be > 0"));
        }
        Ok(())
    }
}

fn parse_u64_env(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}
