//! Canonical Schema Registry.
//!
//! Maps each platform's raw content columns onto the shared canonical field
//! set. Every projection enumerates the full set in canonical order;
//! platforms that lack a concept map it to a constant literal.
//!
//! Projection is a pure function from a raw row to a [`CanonicalRecord`], so
//! the storage layer only has to fetch raw columns.

use serde_json::{Map, Value};
use tracing::warn;

use crate::entities::{
    BilibiliVideo, DouyinAweme, KuaishouVideo, TiebaNote, WeiboNote, XhsNote, ZhihuContent,
};
use crate::models::{CanonicalRecord, ColumnDef, Entity, Platform};
use crate::normalize::ListDecoder;

/// The canonical field set, in canonical order.
pub const CANONICAL_FIELDS: [&str; 10] = [
    "id",
    "platform",
    "title",
    "nickname",
    "liked_count",
    "comment_count",
    "create_time",
    "note_url",
    "image_list",
    "keyword",
];

/// Where a canonical field's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    /// A raw column of the platform's content table.
    Field(&'static str),
    /// A constant text literal.
    Text(&'static str),
    /// A constant integer literal.
    Integer(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Projection {
    pub canonical: &'static str,
    pub column: Column,
}

const fn field(canonical: &'static str, raw: &'static str) -> Projection {
    Projection {
        canonical,
        column: Column::Field(raw),
    }
}

const fn text(canonical: &'static str, literal: &'static str) -> Projection {
    Projection {
        canonical,
        column: Column::Text(literal),
    }
}

const fn integer(canonical: &'static str, literal: i64) -> Projection {
    Projection {
        canonical,
        column: Column::Integer(literal),
    }
}

/// Whether content without a title may be inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPolicy {
    Always,
    /// Content with an empty title is skipped on insert. Updates of
    /// existing rows are unaffected.
    RequireTitle,
}

/// Everything the storage layer needs to know about one platform.
#[derive(Debug, Clone)]
pub struct PlatformSchema {
    pub platform: Platform,
    pub content_table: &'static str,
    pub comment_table: &'static str,
    pub creator_table: &'static str,
    /// Natural key of the content entity.
    pub content_key: &'static str,
    /// Columns declared by the content entity.
    pub content_columns: &'static [ColumnDef],
    pub projection: Vec<Projection>,
    pub insert_policy: InsertPolicy,
}

impl PlatformSchema {
    fn for_entity<C: Entity>(
        platform: Platform,
        tables: [&'static str; 3],
        projection: Vec<Projection>,
        insert_policy: InsertPolicy,
    ) -> Self {
        Self {
            platform,
            content_table: tables[0],
            comment_table: tables[1],
            creator_table: tables[2],
            content_key: C::KEY,
            content_columns: C::COLUMNS,
            projection,
            insert_policy,
        }
    }

    /// Source of a canonical field, if the name is canonical.
    pub fn column_for(&self, canonical: &str) -> Option<Column> {
        self.projection
            .iter()
            .find(|p| p.canonical == canonical)
            .map(|p| p.column)
    }

    /// Raw column backing a canonical field, if it is not a literal.
    pub fn raw_column(&self, canonical: &str) -> Option<&'static str> {
        match self.column_for(canonical)? {
            Column::Field(name) => Some(name),
            _ => None,
        }
    }

    /// Raw column holding the crawl keyword.
    pub fn keyword_column(&self) -> Option<&'static str> {
        self.raw_column("keyword")
    }

    /// Project a raw content row into the canonical view.
    ///
    /// Absent or null raw values surface as `""` / `0`; `image_list` is run
    /// through the image-list decoder.
    pub fn project(&self, row: &Map<String, Value>) -> CanonicalRecord {
        let text_of = |canonical: &str| -> String {
            match self.column_for(canonical) {
                Some(Column::Field(name)) => match row.get(name) {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                },
                Some(Column::Text(lit)) => lit.to_string(),
                Some(Column::Integer(n)) => n.to_string(),
                None => String::new(),
            }
        };
        let int_of = |canonical: &str| -> i64 {
            match self.column_for(canonical) {
                Some(Column::Field(name)) => match row.get(name) {
                    Some(Value::Number(n)) => n.as_i64().unwrap_or_default(),
                    Some(Value::String(s)) => crate::entities::parse_count(s).unwrap_or_default(),
                    _ => 0,
                },
                Some(Column::Integer(n)) => n,
                Some(Column::Text(lit)) => lit.parse().unwrap_or_default(),
                None => 0,
            }
        };
        let image_list = match self.column_for("image_list") {
            Some(Column::Field(name)) => row
                .get(name)
                .map(|v| ListDecoder::IMAGE_LIST.decode_or_empty(v))
                .unwrap_or_default(),
            Some(Column::Text(lit)) => {
                ListDecoder::IMAGE_LIST.decode_or_empty(&Value::String(lit.to_string()))
            }
            _ => Vec::new(),
        };

        CanonicalRecord {
            id: text_of("id"),
            platform: text_of("platform"),
            title: text_of("title"),
            nickname: text_of("nickname"),
            liked_count: int_of("liked_count"),
            comment_count: int_of("comment_count"),
            create_time: int_of("create_time"),
            note_url: text_of("note_url"),
            image_list,
            keyword: text_of("keyword"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("platform '{0}' is enabled but has no registered schema")]
    Unregistered(Platform),
    #[error("projection for '{platform}' must list {expected:?}, found {found:?}")]
    FieldSetMismatch {
        platform: Platform,
        expected: Vec<&'static str>,
        found: Vec<&'static str>,
    },
    #[error("projection for '{platform}' references undeclared column '{column}'")]
    UnknownColumn {
        platform: Platform,
        column: &'static str,
    },
    #[error("projection for '{platform}' maps id to '{found}', natural key is '{expected}'")]
    KeyMismatch {
        platform: Platform,
        expected: &'static str,
        found: String,
    },
}

/// The static set of platform schemas known at startup.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    schemas: Vec<PlatformSchema>,
}

impl SchemaRegistry {
    /// Registry of every built-in platform, in listing order.
    pub fn builtin() -> Self {
        let schemas = vec![
            PlatformSchema::for_entity::<XhsNote>(
                Platform::Xhs,
                ["xhs_note", "xhs_note_comment", "xhs_creator"],
                vec![
                    field("id", "note_id"),
                    text("platform", "xhs"),
                    field("title", "title"),
                    field("nickname", "nickname"),
                    field("liked_count", "liked_count"),
                    field("comment_count", "comment_count"),
                    field("create_time", "time"),
                    field("note_url", "note_url"),
                    field("image_list", "image_list"),
                    field("keyword", "source_keyword"),
                ],
                InsertPolicy::Always,
            ),
            PlatformSchema::for_entity::<DouyinAweme>(
                Platform::Douyin,
                ["douyin_aweme", "douyin_aweme_comment", "dy_creator"],
                vec![
                    field("id", "aweme_id"),
                    text("platform", "dy"),
                    field("title", "title"),
                    field("nickname", "nickname"),
                    field("liked_count", "liked_count"),
                    field("comment_count", "comment_count"),
                    field("create_time", "create_time"),
                    field("note_url", "aweme_url"),
                    field("image_list", "cover_url"),
                    field("keyword", "source_keyword"),
                ],
                InsertPolicy::RequireTitle,
            ),
            PlatformSchema::for_entity::<KuaishouVideo>(
                Platform::Kuaishou,
                ["kuaishou_video", "kuaishou_video_comment", "kuaishou_creator"],
                vec![
                    field("id", "video_id"),
                    text("platform", "ks"),
                    field("title", "title"),
                    field("nickname", "nickname"),
                    field("liked_count", "liked_count"),
                    integer("comment_count", 0),
                    field("create_time", "create_time"),
                    field("note_url", "video_url"),
                    field("image_list", "video_cover_url"),
                    field("keyword", "source_keyword"),
                ],
                InsertPolicy::Always,
            ),
            PlatformSchema::for_entity::<BilibiliVideo>(
                Platform::Bilibili,
                ["bilibili_video", "bilibili_video_comment", "bilibili_up_info"],
                vec![
                    field("id", "video_id"),
                    text("platform", "bili"),
                    field("title", "title"),
                    field("nickname", "nickname"),
                    field("liked_count", "liked_count"),
                    field("comment_count", "video_comment"),
                    field("create_time", "create_time"),
                    field("note_url", "video_url"),
                    field("image_list", "video_cover_url"),
                    field("keyword", "source_keyword"),
                ],
                InsertPolicy::Always,
            ),
            PlatformSchema::for_entity::<WeiboNote>(
                Platform::Weibo,
                ["weibo_note", "weibo_note_comment", "weibo_creator"],
                vec![
                    field("id", "note_id"),
                    text("platform", "wb"),
                    field("title", "content"),
                    field("nickname", "nickname"),
                    field("liked_count", "liked_count"),
                    field("comment_count", "comments_count"),
                    field("create_time", "create_time"),
                    field("note_url", "note_url"),
                    text("image_list", ""),
                    field("keyword", "source_keyword"),
                ],
                InsertPolicy::Always,
            ),
            PlatformSchema::for_entity::<TiebaNote>(
                Platform::Tieba,
                ["tieba_note", "tieba_comment", "tieba_creator"],
                vec![
                    field("id", "note_id"),
                    text("platform", "tieba"),
                    field("title", "title"),
                    field("nickname", "user_nickname"),
                    integer("liked_count", 0),
                    field("comment_count", "total_replay_num"),
                    field("create_time", "publish_time"),
                    field("note_url", "note_url"),
                    text("image_list", ""),
                    field("keyword", "source_keyword"),
                ],
                InsertPolicy::Always,
            ),
            PlatformSchema::for_entity::<ZhihuContent>(
                Platform::Zhihu,
                ["zhihu_content", "zhihu_comment", "zhihu_creator"],
                vec![
                    field("id", "content_id"),
                    text("platform", "zhihu"),
                    field("title", "title"),
                    field("nickname", "user_nickname"),
                    field("liked_count", "voteup_count"),
                    field("comment_count", "comment_count"),
                    field("create_time", "created_time"),
                    field("note_url", "content_url"),
                    text("image_list", ""),
                    field("keyword", "source_keyword"),
                ],
                InsertPolicy::Always,
            ),
        ];
        Self { schemas }
    }

    /// Build a registry from explicit schemas.
    pub fn from_schemas(schemas: Vec<PlatformSchema>) -> Self {
        Self { schemas }
    }

    pub fn get(&self, platform: Platform) -> Result<&PlatformSchema, SchemaError> {
        self.schemas
            .iter()
            .find(|s| s.platform == platform)
            .ok_or(SchemaError::Unregistered(platform))
    }

    pub fn projection(&self, platform: Platform) -> Result<&[Projection], SchemaError> {
        Ok(&self.get(platform)?.projection)
    }

    /// Registered schemas in listing order.
    pub fn schemas(&self) -> impl Iterator<Item = &PlatformSchema> {
        let mut ordered: Vec<&PlatformSchema> = self.schemas.iter().collect();
        ordered.sort_by_key(|s| s.platform);
        ordered.into_iter()
    }

    pub fn platforms(&self) -> Vec<Platform> {
        self.schemas().map(|s| s.platform).collect()
    }

    /// Check that every enabled platform is registered and that every
    /// registered projection is well-formed.
    pub fn validate(&self, enabled: &[Platform]) -> Result<(), SchemaError> {
        for p in enabled {
            self.get(*p)?;
        }
        for schema in &self.schemas {
            let found: Vec<&'static str> = schema.projection.iter().map(|p| p.canonical).collect();
            if found != CANONICAL_FIELDS {
                return Err(SchemaError::FieldSetMismatch {
                    platform: schema.platform,
                    expected: CANONICAL_FIELDS.to_vec(),
                    found,
                });
            }
            for p in &schema.projection {
                if let Column::Field(name) = p.column {
                    if !schema.content_columns.iter().any(|c| c.name == name) {
                        warn!(platform = %schema.platform, column = name, "undeclared column in projection");
                        return Err(SchemaError::UnknownColumn {
                            platform: schema.platform,
                            column: name,
                        });
                    }
                }
            }
            match schema.column_for("id") {
                Some(Column::Field(name)) if name == schema.content_key => {}
                other => {
                    return Err(SchemaError::KeyMismatch {
                        platform: schema.platform,
                        expected: schema.content_key,
                        found: format!("{:?}", other),
                    })
                }
            }
        }
        Ok(())
    }
}
