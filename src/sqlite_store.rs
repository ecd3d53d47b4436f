//! SQLite-backed Content Store.
//!
//! One generic engine, [`SqliteStore<C>`], serves every platform. It is
//! parameterized by the platform's raw content entity `C` and its
//! [`PlatformSchema`]; comment and creator tables share the common entity
//! shapes. All SQL is generated from the entity column definitions and the
//! schema's projection.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool};
use tracing::{debug, warn};

use crawl_harness_core::clock::monotonic_millis;
use crawl_harness_core::entities::{
    BilibiliVideo, CommentItem, CreatorItem, DouyinAweme, KuaishouVideo, TiebaNote, WeiboNote,
    XhsNote, ZhihuContent,
};
use crawl_harness_core::models::{
    CanonicalRecord, ColumnDef, ColumnKind, Entity, EntityKind, FieldValue, Platform,
};
use crawl_harness_core::normalize::normalize_row;
use crawl_harness_core::schema::{Column, InsertPolicy, PlatformSchema, CANONICAL_FIELDS};

use crate::db::quote_ident;
use crate::error::{Error, Result};
use crate::store::{
    ContentStore, EntityCounts, ListQuery, Page, Paginate, SkipReason, Upsert, UpsertOutcome,
};

type Query<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// Open the store for one platform.
pub fn open_store(pool: SqlitePool, schema: &PlatformSchema) -> Arc<dyn ContentStore> {
    let schema = schema.clone();
    match schema.platform {
        Platform::Xhs => Arc::new(SqliteStore::<XhsNote>::new(pool, schema)),
        Platform::Douyin => Arc::new(SqliteStore::<DouyinAweme>::new(pool, schema)),
        Platform::Kuaishou => Arc::new(SqliteStore::<KuaishouVideo>::new(pool, schema)),
        Platform::Bilibili => Arc::new(SqliteStore::<BilibiliVideo>::new(pool, schema)),
        Platform::Weibo => Arc::new(SqliteStore::<WeiboNote>::new(pool, schema)),
        Platform::Tieba => Arc::new(SqliteStore::<TiebaNote>::new(pool, schema)),
        Platform::Zhihu => Arc::new(SqliteStore::<ZhihuContent>::new(pool, schema)),
    }
}

pub struct SqliteStore<C: Entity> {
    pool: SqlitePool,
    schema: PlatformSchema,
    _content: PhantomData<fn() -> C>,
}

impl<C: Entity> SqliteStore<C> {
    pub fn new(pool: SqlitePool, schema: PlatformSchema) -> Self {
        Self {
            pool,
            schema,
            _content: PhantomData,
        }
    }

    pub fn schema(&self) -> &PlatformSchema {
        &self.schema
    }

    pub async fn upsert_content(&self, item: &C) -> Result<UpsertOutcome> {
        self.upsert_row(self.schema.content_table, item, self.schema.insert_policy)
            .await
    }

    pub async fn upsert_comment(&self, item: &CommentItem) -> Result<UpsertOutcome> {
        self.upsert_row(self.schema.comment_table, item, InsertPolicy::Always)
            .await
    }

    pub async fn upsert_creator(&self, item: &CreatorItem) -> Result<UpsertOutcome> {
        self.upsert_row(self.schema.creator_table, item, InsertPolicy::Always)
            .await
    }

    /// Insert or update one row keyed by the entity's natural key.
    ///
    /// Each upsert is a single statement, so concurrent writers only queue
    /// on SQLite's write lock and the last writer wins on a single row.
    /// `add_ts` is returned and compared with this call's timestamp to tell
    /// an insert from an update; the store clock never repeats a value.
    async fn upsert_row<E: Entity>(
        &self,
        table: &str,
        item: &E,
        policy: InsertPolicy,
    ) -> Result<UpsertOutcome> {
        let key = item.natural_key();
        if key.trim().is_empty() {
            warn!(platform = %self.schema.platform, table, "skipping record with empty {}", E::KEY);
            return Ok(UpsertOutcome::Skipped(SkipReason::EmptyKey));
        }

        let values = item
            .field_values()
            .map_err(|e| Error::Decode(format!("{} {}: {}", table, key, e)))?;
        let now = monotonic_millis();

        let untitled = item.title().map(str::trim).unwrap_or_default().is_empty();
        let outcome = if policy == InsertPolicy::RequireTitle && untitled {
            // Without a title the row may only be refreshed, never created.
            let update_sql = update_sql::<E>(table);
            let mut q = sqlx::query(&update_sql);
            for name in E::MUTABLE {
                q = bind_value(q, lookup(&values, name));
            }
            let done = q.bind(now).bind(key).execute(&self.pool).await?;
            if done.rows_affected() == 0 {
                debug!(platform = %self.schema.platform, key, "skipping content insert without title");
                return Ok(UpsertOutcome::Skipped(SkipReason::MissingTitle));
            }
            UpsertOutcome::Updated
        } else {
            let insert_sql = insert_sql::<E>(table);
            let mut q = sqlx::query_scalar::<_, i64>(&insert_sql);
            for (_, value) in &values {
                q = match value.clone() {
                    FieldValue::Text(s) => q.bind(s),
                    FieldValue::Integer(n) => q.bind(n),
                    FieldValue::Null => q.bind(None::<String>),
                };
            }
            let add_ts = q.bind(now).bind(now).fetch_one(&self.pool).await?;
            if add_ts == now {
                UpsertOutcome::Inserted
            } else {
                UpsertOutcome::Updated
            }
        };

        debug!(platform = %self.schema.platform, table, key, ?outcome, "upserted");
        Ok(outcome)
    }

    /// SQL expression for a projected canonical column.
    fn column_expr(column: Column) -> String {
        match column {
            Column::Field(name) => quote_ident(name),
            Column::Text(lit) => format!("'{}'", lit.replace('\'', "''")),
            Column::Integer(n) => n.to_string(),
        }
    }

    fn where_clause(&self, query: &ListQuery) -> (String, Vec<String>) {
        let mut filters = Vec::new();
        let mut binds = Vec::new();

        if let Some(kw) = query.keyword.as_deref().filter(|k| !k.is_empty()) {
            if let Some(col) = self.schema.column_for("title") {
                filters.push(format!("{} LIKE ? ESCAPE '\\'", Self::column_expr(col)));
                binds.push(format!("%{}%", escape_like(kw)));
            }
        }
        if let Some(sk) = query.source_keyword.as_deref().filter(|k| !k.is_empty()) {
            if let Some(col) = self.schema.column_for("keyword") {
                filters.push(format!("{} = ?", Self::column_expr(col)));
                binds.push(sk.to_string());
            }
        }

        if filters.is_empty() {
            (String::new(), binds)
        } else {
            (format!(" WHERE {}", filters.join(" AND ")), binds)
        }
    }

    /// `ORDER BY` for a requested canonical field. Unknown names and fields
    /// backed by a literal produce no ordering.
    fn order_clause(&self, sort_by: Option<&str>) -> String {
        let Some(sort_by) = sort_by else {
            return String::new();
        };
        if !CANONICAL_FIELDS.contains(&sort_by) {
            debug!(platform = %self.schema.platform, sort_by, "ignoring unrecognized sort field");
            return String::new();
        }
        match self.schema.raw_column(sort_by) {
            Some(col) => format!(" ORDER BY {} DESC, id DESC", quote_ident(col)),
            None => String::new(),
        }
    }

    /// Raw columns the projection reads, in declaration order.
    fn projected_columns(&self) -> Vec<&'static ColumnDef> {
        C::COLUMNS
            .iter()
            .filter(|c| {
                self.schema
                    .projection
                    .iter()
                    .any(|p| p.column == Column::Field(c.name))
            })
            .collect()
    }
}

#[async_trait]
impl<C: Entity> Paginate for SqliteStore<C> {
    async fn get_paginated_list(&self, query: &ListQuery) -> Result<Page<CanonicalRecord>> {
        let table = quote_ident(self.schema.content_table);
        let (where_sql, binds) = self.where_clause(query);

        let count_sql = format!("SELECT COUNT(*) FROM {}{}", table, where_sql);
        let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
        for b in &binds {
            count_q = count_q.bind(b.clone());
        }
        let total = count_q.fetch_one(&self.pool).await?;
        if total == 0 {
            return Ok(Page::empty());
        }

        let columns = self.projected_columns();
        let select_list = columns
            .iter()
            .map(|c| quote_ident(c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let list_sql = format!(
            "SELECT {} FROM {}{}{} LIMIT ? OFFSET ?",
            select_list,
            table,
            where_sql,
            self.order_clause(query.sort_by.as_deref())
        );
        let mut list_q = sqlx::query(&list_sql);
        for b in &binds {
            list_q = list_q.bind(b.clone());
        }
        let rows = list_q
            .bind(query.page_size)
            .bind(query.offset())
            .fetch_all(&self.pool)
            .await?;

        let mut list = Vec::with_capacity(rows.len());
        for row in &rows {
            let raw = row_to_map(row, columns.iter().copied())?;
            list.push(self.schema.project(&raw));
        }
        Ok(Page { total, list })
    }
}

#[async_trait]
impl<C: Entity> Upsert for SqliteStore<C> {
    async fn upsert_value(&self, kind: EntityKind, item: Value) -> Result<UpsertOutcome> {
        let decode = |e: serde_json::Error| {
            Error::Decode(format!(
                "invalid {} record for {}: {}",
                kind.as_str(),
                self.schema.platform,
                e
            ))
        };
        match kind {
            EntityKind::Content => {
                let item: C = serde_json::from_value(item).map_err(decode)?;
                self.upsert_content(&item).await
            }
            EntityKind::Comment => {
                let item: CommentItem = serde_json::from_value(item).map_err(decode)?;
                self.upsert_comment(&item).await
            }
            EntityKind::Creator => {
                let item: CreatorItem = serde_json::from_value(item).map_err(decode)?;
                self.upsert_creator(&item).await
            }
        }
    }
}

#[async_trait]
impl<C: Entity> ContentStore for SqliteStore<C> {
    fn platform(&self) -> Platform {
        self.schema.platform
    }

    async fn get_content(&self, id: &str) -> Result<Option<Map<String, Value>>> {
        let select_list = C::COLUMNS
            .iter()
            .map(|c| quote_ident(c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT id, {}, add_ts, last_modify_ts FROM {} WHERE {} = ?",
            select_list,
            quote_ident(self.schema.content_table),
            quote_ident(C::KEY)
        );
        let Some(row) = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        static BOOKKEEPING: [ColumnDef; 3] = [
            ColumnDef::integer("id"),
            ColumnDef::integer("add_ts"),
            ColumnDef::integer("last_modify_ts"),
        ];
        let mut map = row_to_map(&row, C::COLUMNS.iter().chain(BOOKKEEPING.iter()))?;
        map.insert(
            "platform".to_string(),
            Value::String(self.schema.platform.key().to_string()),
        );
        normalize_row(&mut map);
        Ok(Some(map))
    }

    async fn count_entities(&self) -> Result<EntityCounts> {
        let count = |table: &str| format!("SELECT COUNT(*) FROM {}", quote_ident(table));

        let contents: i64 = sqlx::query_scalar(&count(self.schema.content_table))
            .fetch_one(&self.pool)
            .await?;
        let comments: i64 = sqlx::query_scalar(&count(self.schema.comment_table))
            .fetch_one(&self.pool)
            .await?;
        let creators: i64 = sqlx::query_scalar(&count(self.schema.creator_table))
            .fetch_one(&self.pool)
            .await?;
        let last_sql = format!(
            "SELECT MAX(last_modify_ts) FROM {}",
            quote_ident(self.schema.content_table)
        );
        let last_modify_ts: Option<i64> = sqlx::query_scalar(&last_sql)
            .fetch_one(&self.pool)
            .await?;

        Ok(EntityCounts {
            contents,
            comments,
            creators,
            last_modify_ts,
        })
    }
}

fn insert_sql<E: Entity>(table: &str) -> String {
    let names: Vec<String> = E::COLUMNS.iter().map(|c| quote_ident(c.name)).collect();
    let placeholders = vec!["?"; names.len() + 2].join(", ");
    let mut updates: Vec<String> = E::MUTABLE
        .iter()
        .map(|c| format!("{0} = excluded.{0}", quote_ident(c)))
        .collect();
    updates.push("last_modify_ts = excluded.last_modify_ts".to_string());
    format!(
        "INSERT INTO {} ({}, add_ts, last_modify_ts) VALUES ({}) ON CONFLICT({}) DO UPDATE SET {} RETURNING add_ts",
        quote_ident(table),
        names.join(", "),
        placeholders,
        quote_ident(E::KEY),
        updates.join(", ")
    )
}

fn update_sql<E: Entity>(table: &str) -> String {
    let mut sets: Vec<String> = E::MUTABLE
        .iter()
        .map(|c| format!("{} = ?", quote_ident(c)))
        .collect();
    sets.push("last_modify_ts = ?".to_string());
    format!(
        "UPDATE {} SET {} WHERE {} = ?",
        quote_ident(table),
        sets.join(", "),
        quote_ident(E::KEY)
    )
}

fn lookup(values: &[(&'static str, FieldValue)], name: &str) -> FieldValue {
    values
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, v)| v.clone())
        .unwrap_or(FieldValue::Null)
}

fn bind_value(q: Query<'_>, value: FieldValue) -> Query<'_> {
    match value {
        FieldValue::Text(s) => q.bind(s),
        FieldValue::Integer(n) => q.bind(n),
        FieldValue::Null => q.bind(None::<String>),
    }
}

/// Read declared columns of a row into a JSON map.
fn row_to_map<'a>(
    row: &SqliteRow,
    columns: impl Iterator<Item = &'a ColumnDef>,
) -> Result<Map<String, Value>> {
    let mut map = Map::new();
    for col in columns {
        let value = match col.kind {
            ColumnKind::Text => row
                .try_get::<Option<String>, _>(col.name)?
                .map(Value::String)
                .unwrap_or(Value::Null),
            ColumnKind::Integer => row
                .try_get::<Option<i64>, _>(col.name)?
                .map(Value::from)
                .unwrap_or(Value::Null),
        };
        map.insert(col.name.to_string(), value);
    }
    Ok(map)
}

/// Escape `LIKE` wildcards so user input matches literally.
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
