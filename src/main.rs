//! # Crawl Harness CLI (`crawlh`)
//!
//! The `crawlh` binary is the primary interface for Crawl Harness. It
//! initializes the database, imports crawler output, queries the canonical
//! view, runs crawl tasks, and starts the HTTP API.
//!
//! ## Usage
//!
//! ```bash
//! crawlh --config ./config/crawlh.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `crawlh init` | Create the SQLite database and all platform tables |
//! | `crawlh platforms` | List enabled platforms |
//! | `crawlh keywords` | List distinct crawl keywords across platforms |
//! | `crawlh query <platform>` | Canonical paginated listing |
//! | `crawlh get <platform> <id>` | Print one raw content record |
//! | `crawlh stats` | Per-platform counts |
//! | `crawlh import <platform> <kind> <path>` | Load crawler JSON/JSONL output |
//! | `crawlh crawl` | Run the crawler in the foreground and wait |
//! | `crawlh serve` | Start the HTTP API server |
//!
//! Logs go to stderr; set `RUST_LOG` to adjust verbosity.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use crawl_harness::config;
use crawl_harness::engine::CrawlerConfig;
use crawl_harness::hub::{Hub, QueryParams};
use crawl_harness::tasks::TaskStatus;
use crawl_harness::{import, migrate, server, stats};
use crawl_harness_core::models::EntityKind;

/// Crawl Harness CLI: store, query, and crawl multi-platform social media
/// data.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/crawlh.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "crawlh",
    about = "Crawl Harness — store, query, and crawl multi-platform social media data",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/crawlh.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the content, comment, and
    /// creator tables of every platform. Safe to run repeatedly.
    Init,

    /// List enabled platforms.
    Platforms,

    /// List distinct crawl keywords and the platforms that have them.
    Keywords,

    /// Query one platform's content in canonical form.
    Query {
        /// Platform key (`xhs`, `dy`, `ks`, `bili`, `wb`, `tieba`, `zhihu`).
        platform: String,

        /// Case-insensitive substring match on the title.
        #[arg(long)]
        keyword: Option<String>,

        /// Exact match on the crawl keyword.
        #[arg(long)]
        source_keyword: Option<String>,

        /// Canonical field to sort by, descending.
        #[arg(long)]
        sort_by: Option<String>,

        #[arg(long, default_value_t = 1)]
        page: i64,

        #[arg(long)]
        page_size: Option<i64>,
    },

    /// Print one raw content record as JSON.
    Get {
        platform: String,
        /// The platform's natural key for the content item.
        id: String,
    },

    /// Show per-platform counts.
    Stats,

    /// Import crawler output files.
    ///
    /// Accepts a `.json` / `.jsonl` file or a directory walked recursively.
    Import {
        platform: String,
        /// `contents`, `comments`, or `creators`.
        kind: EntityKind,
        path: PathBuf,
    },

    /// Run the crawler in the foreground and wait for it to finish.
    ///
    /// Options not given here fall back to the `[crawler]` section.
    Crawl {
        #[arg(long)]
        platform: Option<String>,

        /// Comma-separated search keywords.
        #[arg(long)]
        keywords: Option<String>,

        #[arg(long)]
        crawler_type: Option<String>,

        #[arg(long)]
        max_notes_count: Option<u32>,

        /// Seconds between status polls.
        #[arg(long, default_value_t = 2)]
        poll_secs: u64,
    },

    /// Start the HTTP API server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Platforms => {
            let hub = Hub::open(&cfg).await?;
            for p in hub.list_platforms() {
                println!("{:<8} {}", p.key, p.display_name);
            }
            hub.close().await;
        }
        Commands::Keywords => {
            let hub = Hub::open(&cfg).await?;
            let entries = hub.list_distinct_keywords().await?;
            if entries.is_empty() {
                println!("No keywords found.");
            }
            for e in entries {
                let platforms: Vec<&str> = e.platforms.iter().map(|p| p.key()).collect();
                println!("{}\t{}", e.value, platforms.join(","));
            }
            hub.close().await;
        }
        Commands::Query {
            platform,
            keyword,
            source_keyword,
            sort_by,
            page,
            page_size,
        } => {
            let hub = Hub::open(&cfg).await?;
            let result = hub
                .query(QueryParams {
                    platform,
                    keyword,
                    source_keyword,
                    sort_by,
                    page: Some(page),
                    page_size,
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            hub.close().await;
        }
        Commands::Get { platform, id } => {
            let hub = Hub::open(&cfg).await?;
            let record = hub.get_content(&platform, &id).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
            hub.close().await;
        }
        Commands::Stats => {
            let hub = Hub::open(&cfg).await?;
            stats::run_stats(&hub).await?;
            hub.close().await;
        }
        Commands::Import {
            platform,
            kind,
            path,
        } => {
            let hub = Hub::open(&cfg).await?;
            import::run_import(&hub, &platform, kind, &path).await?;
            hub.close().await;
        }
        Commands::Crawl {
            platform,
            keywords,
            crawler_type,
            max_notes_count,
            poll_secs,
        } => {
            let hub = Hub::open(&cfg).await?;
            let request = CrawlerConfig {
                platform,
                keywords,
                crawler_type,
                max_notes_count,
                ..Default::default()
            };
            let started = hub.start_task(request)?;
            println!("task {} started", started.task_id);
            let record = hub
                .orchestrator()
                .wait(&started.task_id, Duration::from_secs(poll_secs.max(1)))
                .await?;
            println!("status: {}", record.status.as_str());
            println!("message: {}", record.message);
            hub.close().await;
            if record.status == TaskStatus::Failed {
                anyhow::bail!("crawl task {} failed", record.task_id);
            }
        }
        Commands::Serve => {
            let hub = Arc::new(Hub::open(&cfg).await?);
            server::run_server(hub).await?;
        }
    }

    Ok(())
}
