//! Content Store contract.
//!
//! Every platform gets one store with the same capabilities: canonical
//! paginated listing ([`Paginate`]) and upsert-by-natural-key persistence
//! ([`Upsert`]). [`ContentStore`] bundles both with the detail and count
//! lookups the API needs, so platforms can be held behind one trait object.
//!
//! The SQLite implementation lives in [`crate::sqlite_store`].

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

use crawl_harness_core::models::{CanonicalRecord, EntityKind, Platform};

use crate::error::Result;

/// Filters, ordering, and window for a canonical listing.
///
/// `page` and `page_size` are validated by the caller; the store trusts them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    /// Case-insensitive substring match on the title.
    pub keyword: Option<String>,
    /// Exact match on the crawl keyword.
    pub source_keyword: Option<String>,
    /// Canonical field to sort by, descending. Unknown names disable sorting.
    pub sort_by: Option<String>,
    pub page: i64,
    pub page_size: i64,
}

impl ListQuery {
    pub fn new(page: i64, page_size: i64) -> Self {
        Self {
            keyword: None,
            source_keyword: None,
            sort_by: None,
            page,
            page_size,
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub total: i64,
    pub list: Vec<T>,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            total: 0,
            list: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The natural key was empty or whitespace.
    EmptyKey,
    /// The platform requires a title to insert content and none was given.
    MissingTitle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    Skipped(SkipReason),
}

/// Row counts for one platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntityCounts {
    pub contents: i64,
    pub comments: i64,
    pub creators: i64,
    /// Most recent content write, in milliseconds.
    pub last_modify_ts: Option<i64>,
}

#[async_trait]
pub trait Paginate: Send + Sync {
    /// Count matching records, then fetch one page of them.
    ///
    /// When nothing matches, the list query is not issued.
    async fn get_paginated_list(&self, query: &ListQuery) -> Result<Page<CanonicalRecord>>;
}

#[async_trait]
pub trait Upsert: Send + Sync {
    /// Upsert one raw entity of `kind`, given in the crawler's JSON shape.
    async fn upsert_value(&self, kind: EntityKind, item: Value) -> Result<UpsertOutcome>;
}

#[async_trait]
pub trait ContentStore: Paginate + Upsert {
    fn platform(&self) -> Platform;

    /// Every stored column of one content item, list fields normalized.
    async fn get_content(&self, id: &str) -> Result<Option<Map<String, Value>>>;

    async fn count_entities(&self) -> Result<EntityCounts>;
}
