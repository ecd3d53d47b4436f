//! # Crawl Harness
//!
//! A local-first store and task runner for multi-platform social media
//! crawl data.
//!
//! Each platform's crawler writes its own raw shape (notes, videos, posts,
//! threads). Crawl Harness stores those raw records per platform in SQLite,
//! serves them through one canonical, paginated query surface, and runs the
//! external crawler as a single-flight background task.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Schema       │──▶│ Content      │──▶│ Field        │
//! │ Registry     │   │ Stores (x7)  │   │ Normalizer   │
//! └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!        ▼                  ▼                  │
//! ┌──────────────┐   ┌──────────────┐          │
//! │ Keyword      │   │    SQLite    │          │
//! │ Aggregator   │   └──────────────┘          │
//! └──────┬───────┘                             │
//!        └──────────────┬──────────────────────┘
//!                       ▼
//!                 ┌──────────┐      ┌──────────────┐
//!                 │   Hub    │─────▶│ Orchestrator │──▶ crawler process
//!                 └────┬─────┘      └──────────────┘
//!                ┌─────┴─────┐
//!                ▼           ▼
//!           ┌────────┐  ┌────────┐
//!           │  CLI   │  │  HTTP  │
//!           └────────┘  └────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! crawlh init                                   # create database
//! crawlh import xhs contents ./data/xhs/json    # load crawler output
//! crawlh query xhs --keyword rust --sort-by liked_count
//! crawlh crawl --platform dy --keywords "rust"  # run the crawler and wait
//! crawlh serve                                  # start HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`store`] | Content Store traits and types |
//! | [`sqlite_store`] | Generic SQLite Content Store |
//! | [`keywords`] | Cross-platform keyword aggregation |
//! | [`engine`] | External crawler adapter |
//! | [`tasks`] | Single-flight task orchestrator |
//! | [`hub`] | Service facade |
//! | [`import`] | Crawler output import |
//! | [`stats`] | Database statistics |
//! | [`server`] | HTTP API server |

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod hub;
pub mod import;
pub mod keywords;
pub mod migrate;
pub mod server;
pub mod sqlite_store;
pub mod stats;
pub mod store;
pub mod tasks;
