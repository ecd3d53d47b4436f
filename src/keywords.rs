//! Query Aggregator: distinct crawl keywords across platforms.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crawl_harness_core::models::Platform;
use crawl_harness_core::schema::SchemaRegistry;

use crate::db::quote_ident;
use crate::error::Result;

/// A crawl keyword and every platform that has content for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeywordEntry {
    pub value: String,
    pub platforms: BTreeSet<Platform>,
}

pub struct KeywordAggregator {
    pool: SqlitePool,
    /// `(platform, content table, keyword column)` per participating platform.
    sources: Vec<(Platform, &'static str, &'static str)>,
}

impl KeywordAggregator {
    pub fn new(pool: SqlitePool, registry: &SchemaRegistry, platforms: &[Platform]) -> Self {
        let sources = registry
            .schemas()
            .filter(|s| platforms.contains(&s.platform))
            .filter_map(|s| Some((s.platform, s.content_table, s.keyword_column()?)))
            .collect();
        Self { pool, sources }
    }

    /// Union every platform's keyword column tagged with the platform key,
    /// take distinct pairs, and group by keyword. Blank keywords are dropped.
    ///
    /// Entries come back sorted by keyword.
    pub async fn get_distinct_keywords(&self) -> Result<Vec<KeywordEntry>> {
        if self.sources.is_empty() {
            return Ok(Vec::new());
        }

        let union = self
            .sources
            .iter()
            .map(|(platform, table, column)| {
                format!(
                    "SELECT {} AS keyword, '{}' AS platform FROM {}",
                    quote_ident(column),
                    platform.key(),
                    quote_ident(table)
                )
            })
            .collect::<Vec<_>>()
            .join(" UNION ALL ");
        let sql = format!("SELECT DISTINCT keyword, platform FROM ({})", union);

        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        let mut grouped: BTreeMap<String, BTreeSet<Platform>> = BTreeMap::new();
        for row in &rows {
            let keyword: Option<String> = row.try_get("keyword")?;
            let platform: String = row.try_get("platform")?;
            let Some(keyword) = keyword.filter(|k| !k.trim().is_empty()) else {
                continue;
            };
            // Tags are generated from Platform::key, so this only fails on a
            // schema bug.
            if let Ok(platform) = platform.parse::<Platform>() {
                grouped.entry(keyword).or_default().insert(platform);
            }
        }

        Ok(grouped
            .into_iter()
            .map(|(value, platforms)| KeywordEntry { value, platforms })
            .collect())
    }
}
