//! Service facade shared by the CLI and the HTTP server.
//!
//! A [`Hub`] is built once per process from [`Config`]. It owns the
//! connection pool, the validated schema registry, one content store per
//! enabled platform, the keyword aggregator, and the task orchestrator, and
//! enforces the input bounds the lower layers trust.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::SqlitePool;
use tracing::info;

use crawl_harness_core::models::{CanonicalRecord, EntityKind, Platform, PlatformInfo};
use crawl_harness_core::schema::SchemaRegistry;

use crate::config::Config;
use crate::db;
use crate::engine::{CommandEngine, CrawlerConfig, IngestionEngine};
use crate::error::{Error, Result};
use crate::keywords::{KeywordAggregator, KeywordEntry};
use crate::migrate;
use crate::sqlite_store::open_store;
use crate::store::{ContentStore, EntityCounts, ListQuery, Page, UpsertOutcome};
use crate::tasks::{Orchestrator, TaskRecord};

/// Raw listing parameters as they arrive from a caller.
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    pub platform: String,
    pub keyword: Option<String>,
    pub source_keyword: Option<String>,
    pub sort_by: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// Returned by [`Hub::start_task`].
#[derive(Debug, Clone, Serialize)]
pub struct StartedTask {
    pub task_id: String,
    pub platform: Option<String>,
    pub keywords: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlatformStats {
    pub platform: Platform,
    #[serde(flatten)]
    pub counts: EntityCounts,
}

#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub platforms: Vec<PlatformStats>,
    pub busy: bool,
    pub tasks: usize,
}

pub struct Hub {
    config: Config,
    pool: SqlitePool,
    stores: BTreeMap<Platform, Arc<dyn ContentStore>>,
    keywords: KeywordAggregator,
    orchestrator: Orchestrator,
}

impl Hub {
    /// Connect, migrate, and wire up a hub running the configured crawler
    /// program.
    pub async fn open(config: &Config) -> Result<Self> {
        let engine = Arc::new(CommandEngine::new(config.engine.clone()));
        Self::open_with_engine(config, engine).await
    }

    pub async fn open_with_engine(
        config: &Config,
        engine: Arc<dyn IngestionEngine>,
    ) -> Result<Self> {
        let registry = SchemaRegistry::builtin();
        registry.validate(&config.platforms.enabled)?;

        let pool = db::connect(config).await?;
        migrate::migrate_pool(&pool, &registry).await?;

        let mut stores = BTreeMap::new();
        for platform in &config.platforms.enabled {
            let schema = registry.get(*platform)?;
            stores.insert(*platform, open_store(pool.clone(), schema));
        }
        let keywords = KeywordAggregator::new(pool.clone(), &registry, &config.platforms.enabled);

        info!(
            db = %config.db.path.display(),
            platforms = stores.len(),
            "hub ready"
        );

        Ok(Self {
            config: config.clone(),
            pool,
            stores,
            keywords,
            orchestrator: Orchestrator::new(engine),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Enabled platforms in listing order.
    pub fn list_platforms(&self) -> Vec<PlatformInfo> {
        self.stores.keys().copied().map(PlatformInfo::from).collect()
    }

    pub async fn list_distinct_keywords(&self) -> Result<Vec<KeywordEntry>> {
        self.keywords.get_distinct_keywords().await
    }

    pub fn store(&self, platform: &str) -> Result<&Arc<dyn ContentStore>> {
        let parsed: Platform = platform.parse()?;
        self.stores
            .get(&parsed)
            .ok_or_else(|| Error::InvalidPlatform(platform.to_string()))
    }

    pub async fn query(&self, params: QueryParams) -> Result<Page<CanonicalRecord>> {
        let store = self.store(&params.platform)?;

        let page = params.page.unwrap_or(1);
        let page_size = params
            .page_size
            .unwrap_or(self.config.query.default_page_size);
        let max = self.config.query.max_page_size;
        if page < 1 {
            return Err(Error::InvalidInput(format!("page must be >= 1, got {}", page)));
        }
        if !(1..=max).contains(&page_size) {
            return Err(Error::InvalidInput(format!(
                "page_size must be in [1, {}], got {}",
                max, page_size
            )));
        }

        let query = ListQuery {
            keyword: params.keyword,
            source_keyword: params.source_keyword,
            sort_by: Some(
                params
                    .sort_by
                    .unwrap_or_else(|| self.config.query.default_sort_by.clone()),
            ),
            page,
            page_size,
        };
        store.get_paginated_list(&query).await
    }

    pub async fn get_content(&self, platform: &str, id: &str) -> Result<Map<String, Value>> {
        self.store(platform)?
            .get_content(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("{} content '{}'", platform, id)))
    }

    pub async fn upsert(
        &self,
        platform: &str,
        kind: EntityKind,
        item: Value,
    ) -> Result<UpsertOutcome> {
        self.store(platform)?.upsert_value(kind, item).await
    }

    /// Overlay the request on the configured crawler defaults and start it.
    pub fn start_task(&self, request: CrawlerConfig) -> Result<StartedTask> {
        let config = self.config.crawler.overlay(&request);
        match config.platform.as_deref() {
            None => return Err(Error::InvalidInput("platform is required".to_string())),
            Some(p) => {
                self.store(p)?;
            }
        }

        let platform = config.platform.clone();
        let keywords = config.keywords.clone();
        let task_id = self.orchestrator.create_task(config)?;
        Ok(StartedTask {
            task_id,
            platform,
            keywords,
        })
    }

    pub fn get_task(&self, task_id: &str) -> Result<TaskRecord> {
        self.orchestrator.get_status(task_id)
    }

    pub fn list_tasks(&self) -> Vec<TaskRecord> {
        self.orchestrator.list_tasks()
    }

    pub async fn stats(&self) -> Result<Stats> {
        let mut platforms = Vec::with_capacity(self.stores.len());
        for (platform, store) in &self.stores {
            platforms.push(PlatformStats {
                platform: *platform,
                counts: store.count_entities().await?,
            });
        }
        Ok(Stats {
            platforms,
            busy: self.orchestrator.is_busy(),
            tasks: self.orchestrator.list_tasks().len(),
        })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
