use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crawl_harness_core::models::Platform;

use crate::engine::CrawlerConfig;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub platforms: PlatformsConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    /// Defaults every crawl request is overlaid on.
    #[serde(default)]
    pub crawler: CrawlerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct PlatformsConfig {
    #[serde(default = "default_enabled")]
    pub enabled: Vec<Platform>,
}

impl Default for PlatformsConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
        }
    }
}

fn default_enabled() -> Vec<Platform> {
    Platform::ALL.to_vec()
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueryConfig {
    #[serde(default = "default_page_size")]
    pub default_page_size: i64,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: i64,
    #[serde(default = "default_sort_by")]
    pub default_sort_by: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            default_sort_by: default_sort_by(),
        }
    }
}

fn default_page_size() -> i64 {
    10
}
fn default_max_page_size() -> i64 {
    100
}
fn default_sort_by() -> String {
    "liked_count".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    /// Crawler executable. Tasks fail immediately when unset.
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub workdir: Option<PathBuf>,
    #[serde(default = "default_stderr_tail_lines")]
    pub stderr_tail_lines: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: None,
            args: Vec::new(),
            workdir: None,
            stderr_tail_lines: default_stderr_tail_lines(),
        }
    }
}

fn default_stderr_tail_lines() -> usize {
    20
}

impl Config {
    /// A config with every section at its defaults, storing data at `db_path`.
    pub fn minimal(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: db_path.into(),
                max_connections: default_max_connections(),
            },
            server: ServerConfig::default(),
            platforms: PlatformsConfig::default(),
            query: QueryConfig::default(),
            engine: EngineConfig::default(),
            crawler: CrawlerConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.db.max_connections == 0 {
        anyhow::bail!("db.max_connections must be > 0");
    }

    // Validate query
    if config.query.max_page_size < 1 {
        anyhow::bail!("query.max_page_size must be >= 1");
    }
    if !(1..=config.query.max_page_size).contains(&config.query.default_page_size) {
        anyhow::bail!(
            "query.default_page_size must be in [1, {}]",
            config.query.max_page_size
        );
    }

    // Validate platforms
    if config.platforms.enabled.is_empty() {
        anyhow::bail!("platforms.enabled must list at least one platform");
    }
    let mut seen = HashSet::new();
    for p in &config.platforms.enabled {
        if !seen.insert(p) {
            anyhow::bail!("platforms.enabled lists '{}' more than once", p);
        }
    }

    if let Some(p) = config.crawler.platform.as_deref() {
        p.parse::<Platform>()
            .with_context(|| "crawler.platform must name a known platform")?;
    }

    Ok(())
}
