//! # Crawl Harness Core
//!
//! Shared logic for Crawl Harness: platform identifiers, raw per-platform
//! entities, the canonical record, the schema registry that projects one
//! onto the other, and the list-field normalizer.
//!
//! This crate contains no tokio, sqlx, or filesystem I/O. Storage and task
//! execution live in the `crawl-harness` application crate.

pub mod clock;
pub mod entities;
pub mod models;
pub mod normalize;
pub mod schema;

pub use models::{CanonicalRecord, Entity, EntityKind, Platform, PlatformInfo};
pub use schema::{SchemaError, SchemaRegistry};
