//! Idempotent schema migrations.
//!
//! Tables are generated from the entity column definitions, so adding a
//! raw column to an entity is the only change needed to store it.

use sqlx::SqlitePool;
use tracing::debug;

use crawl_harness_core::entities::{CommentItem, CreatorItem};
use crawl_harness_core::models::{ColumnDef, Entity};
use crawl_harness_core::schema::SchemaRegistry;

use crate::config::Config;
use crate::db::{self, quote_ident};
use crate::error::Result;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool, &SchemaRegistry::builtin()).await?;
    pool.close().await;
    Ok(())
}

/// Create every registered platform's content, comment, and creator tables.
pub async fn migrate_pool(pool: &SqlitePool, registry: &SchemaRegistry) -> Result<()> {
    for schema in registry.schemas() {
        create_table(pool, schema.content_table, schema.content_key, schema.content_columns)
            .await?;
        create_table(
            pool,
            schema.comment_table,
            CommentItem::KEY,
            CommentItem::COLUMNS,
        )
        .await?;
        create_table(
            pool,
            schema.creator_table,
            CreatorItem::KEY,
            CreatorItem::COLUMNS,
        )
        .await?;

        if let Some(col) = schema.keyword_column() {
            create_index(pool, schema.content_table, col).await?;
        }
        create_index(pool, schema.comment_table, "content_id").await?;
    }
    Ok(())
}

async fn create_table(
    pool: &SqlitePool,
    table: &str,
    key: &str,
    columns: &[ColumnDef],
) -> Result<()> {
    let sql = create_table_sql(table, key, columns);
    debug!(table, "ensuring table");
    sqlx::query(&sql).execute(pool).await?;
    Ok(())
}

async fn create_index(pool: &SqlitePool, table: &str, column: &str) -> Result<()> {
    let sql = format!(
        "CREATE INDEX IF NOT EXISTS {} ON {}({})",
        quote_ident(&format!("idx_{}_{}", table, column)),
        quote_ident(table),
        quote_ident(column)
    );
    sqlx::query(&sql).execute(pool).await?;
    Ok(())
}

fn create_table_sql(table: &str, key: &str, columns: &[ColumnDef]) -> String {
    let mut defs = vec!["id INTEGER PRIMARY KEY AUTOINCREMENT".to_string()];
    for col in columns {
        let not_null = if col.name == key { " NOT NULL" } else { "" };
        defs.push(format!(
            "{} {}{}",
            quote_ident(col.name),
            col.kind.sql_type(),
            not_null
        ));
    }
    defs.push("add_ts INTEGER NOT NULL".to_string());
    defs.push("last_modify_ts INTEGER NOT NULL".to_string());
    defs.push(format!("UNIQUE({})", quote_ident(key)));

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        quote_ident(table),
        defs.join(",\n    ")
    )
}
