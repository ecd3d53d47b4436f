//! Core data models shared by every layer of Crawl Harness.
//!
//! These types describe the closed set of source platforms, the canonical
//! record every platform is projected into, and the [`Entity`] contract that
//! raw per-platform structures implement so one storage engine can persist
//! all of them.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A source platform the crawler collects records from.
///
/// The set is closed and known at startup. Variants are declared in listing
/// order, so `Ord` and [`Platform::ALL`] agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "xhs")]
    Xhs,
    #[serde(rename = "dy")]
    Douyin,
    #[serde(rename = "ks")]
    Kuaishou,
    #[serde(rename = "bili")]
    Bilibili,
    #[serde(rename = "wb")]
    Weibo,
    #[serde(rename = "tieba")]
    Tieba,
    #[serde(rename = "zhihu")]
    Zhihu,
}

impl Platform {
    /// Every platform, in listing order.
    pub const ALL: [Platform; 7] = [
        Platform::Xhs,
        Platform::Douyin,
        Platform::Kuaishou,
        Platform::Bilibili,
        Platform::Weibo,
        Platform::Tieba,
        Platform::Zhihu,
    ];

    /// Stable short key used in storage, URLs, and configuration.
    pub const fn key(self) -> &'static str {
        match self {
            Platform::Xhs => "xhs",
            Platform::Douyin => "dy",
            Platform::Kuaishou => "ks",
            Platform::Bilibili => "bili",
            Platform::Weibo => "wb",
            Platform::Tieba => "tieba",
            Platform::Zhihu => "zhihu",
        }
    }

    /// Human-readable platform name.
    pub const fn display_name(self) -> &'static str {
        match self {
            Platform::Xhs => "小红书",
            Platform::Douyin => "抖音",
            Platform::Kuaishou => "快手",
            Platform::Bilibili => "哔哩哔哩",
            Platform::Weibo => "微博",
            Platform::Tieba => "百度贴吧",
            Platform::Zhihu => "知乎",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Returned when a string does not name a known platform.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown platform: '{0}'")]
pub struct UnknownPlatform(pub String);

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .into_iter()
            .find(|p| p.key() == s)
            .ok_or_else(|| UnknownPlatform(s.to_string()))
    }
}

/// One entry of the platform listing exposed to API and CLI callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformInfo {
    pub key: &'static str,
    pub display_name: &'static str,
}

impl From<Platform> for PlatformInfo {
    fn from(p: Platform) -> Self {
        Self {
            key: p.key(),
            display_name: p.display_name(),
        }
    }
}

/// The shared cross-platform view of a content item.
///
/// Derived on read from a platform's raw content table through its
/// canonical projection; never stored. Every field is always populated:
/// platforms lacking a concept supply a literal default.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalRecord {
    pub id: String,
    pub platform: String,
    pub title: String,
    pub nickname: String,
    pub liked_count: i64,
    pub comment_count: i64,
    pub create_time: i64,
    pub note_url: String,
    pub image_list: Vec<String>,
    pub keyword: String,
}

/// The three raw entity families every platform persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Content,
    Comment,
    Creator,
}

impl EntityKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            EntityKind::Content => "contents",
            EntityKind::Comment => "comments",
            EntityKind::Creator => "creators",
        }
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "content" | "contents" => Ok(EntityKind::Content),
            "comment" | "comments" => Ok(EntityKind::Comment),
            "creator" | "creators" => Ok(EntityKind::Creator),
            other => Err(format!(
                "unknown entity kind: '{}'. Must be contents, comments, or creators.",
                other
            )),
        }
    }
}

/// Storage class of a raw column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
}

impl ColumnKind {
    pub const fn sql_type(self) -> &'static str {
        match self {
            ColumnKind::Text => "TEXT",
            ColumnKind::Integer => "INTEGER",
        }
    }
}

/// A named, typed raw column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub kind: ColumnKind,
}

impl ColumnDef {
    pub const fn text(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnKind::Text,
        }
    }

    pub const fn integer(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnKind::Integer,
        }
    }
}

/// A single column value ready to be bound into a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Null,
}

impl FieldValue {
    /// Coerce a serialized field into the storage class of its column.
    ///
    /// Sequences and objects bound for text columns are stored JSON-encoded.
    pub fn from_json(kind: ColumnKind, value: &serde_json::Value) -> Self {
        use serde_json::Value;

        match (kind, value) {
            (_, Value::Null) => FieldValue::Null,
            (ColumnKind::Text, Value::String(s)) => FieldValue::Text(s.clone()),
            (ColumnKind::Text, other) => FieldValue::Text(other.to_string()),
            (ColumnKind::Integer, Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .map(FieldValue::Integer)
                .unwrap_or(FieldValue::Null),
            (ColumnKind::Integer, Value::String(s)) => crate::entities::parse_count(s)
                .map(FieldValue::Integer)
                .unwrap_or(FieldValue::Null),
            (ColumnKind::Integer, Value::Bool(b)) => FieldValue::Integer(*b as i64),
            (ColumnKind::Integer, _) => FieldValue::Null,
        }
    }
}

/// Contract implemented by every raw per-platform structure.
///
/// The storage engine is generic over this trait: it reads the natural key
/// to decide insert-vs-update, writes [`COLUMNS`](Entity::COLUMNS) on insert,
/// and rewrites only [`MUTABLE`](Entity::MUTABLE) on update.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Which entity family this structure belongs to.
    const KIND: EntityKind;

    /// Column holding the durable external identifier.
    const KEY: &'static str;

    /// Every persisted column, natural key included, in table order.
    const COLUMNS: &'static [ColumnDef];

    /// Columns rewritten when an existing row is upserted again.
    const MUTABLE: &'static [&'static str];

    /// The externally assigned durable identifier.
    fn natural_key(&self) -> &str;

    /// Title used by the insert policy, if this entity has one.
    fn title(&self) -> Option<&str> {
        None
    }

    /// Project the structure onto its declared columns.
    fn field_values(&self) -> Result<Vec<(&'static str, FieldValue)>, serde_json::Error> {
        let value = serde_json::to_value(self)?;
        Ok(Self::COLUMNS
            .iter()
            .map(|col| {
                let v = value.get(col.name).unwrap_or(&serde_json::Value::Null);
                (col.name, FieldValue::from_json(col.kind, v))
            })
            .collect())
    }

    /// Look up a declared column by name.
    fn column(name: &str) -> Option<&'static ColumnDef> {
        Self::COLUMNS.iter().find(|c| c.name == name)
    }
}
