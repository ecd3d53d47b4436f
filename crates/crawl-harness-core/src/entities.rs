//! Raw per-platform entities as the crawler produces them.
//!
//! Each platform has its own content structure; comments and creators share
//! one shape across platforms and are stored in per-platform tables. All
//! deserializers are lenient: crawlers emit numbers as strings, `null` for
//! absent values, and list fields either as arrays or as legacy joined text.

use serde::{Deserialize, Serialize};

use crate::models::{ColumnDef, Entity, EntityKind};

/// Parse a platform-formatted counter such as `"1.2万"`, `"10万+"` or `"3,401"`.
pub fn parse_count(raw: &str) -> Option<i64> {
    let s = raw.trim().trim_end_matches('+').replace(',', "");
    if s.is_empty() {
        return None;
    }
    let (number, scale) = if let Some(n) = s.strip_suffix('万') {
        (n, 10_000f64)
    } else if let Some(n) = s.strip_suffix('亿') {
        (n, 100_000_000f64)
    } else {
        (s.as_str(), 1f64)
    };
    if scale == 1f64 {
        if let Ok(v) = number.trim().parse::<i64>() {
            return Some(v);
        }
    }
    number
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(|f| (f * scale).round() as i64)
}

/// Lenient field deserializers shared by all raw entities.
pub(crate) mod de {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn key<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(opt_text(d)?.unwrap_or_default())
    }

    pub fn opt_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Null => None,
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            other => Some(other.to_string()),
        })
    }

    pub fn count<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => super::parse_count(&s),
            Value::Bool(b) => Some(b as i64),
            _ => None,
        })
    }

    /// Millisecond timestamps; accepts epoch numbers and common date strings.
    pub fn timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => parse_datetime(&s),
            _ => None,
        })
    }

    /// List fields arrive as arrays or as legacy text; arrays are stored JSON-encoded.
    pub fn list_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        })
    }

    fn parse_datetime(raw: &str) -> Option<i64> {
        let s = raw.trim();
        if let Ok(v) = s.parse::<i64>() {
            return Some(v);
        }
        const FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"];
        for fmt in FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
                return Some(dt.and_utc().timestamp_millis());
            }
        }
        chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc().timestamp_millis())
    }
}

/// Xiaohongshu note.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct XhsNote {
    #[serde(deserialize_with = "de::key")]
    pub note_id: String,
    #[serde(alias = "type", deserialize_with = "de::opt_text")]
    pub note_type: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub title: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub desc: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub video_url: Option<String>,
    #[serde(deserialize_with = "de::timestamp")]
    pub time: Option<i64>,
    #[serde(deserialize_with = "de::timestamp")]
    pub last_update_time: Option<i64>,
    #[serde(deserialize_with = "de::opt_text")]
    pub user_id: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub nickname: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub avatar: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub ip_location: Option<String>,
    #[serde(deserialize_with = "de::count")]
    pub liked_count: Option<i64>,
    #[serde(deserialize_with = "de::count")]
    pub collected_count: Option<i64>,
    #[serde(deserialize_with = "de::count")]
    pub comment_count: Option<i64>,
    #[serde(deserialize_with = "de::count")]
    pub share_count: Option<i64>,
    #[serde(deserialize_with = "de::list_text")]
    pub image_list: Option<String>,
    #[serde(deserialize_with = "de::list_text")]
    pub tag_list: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub note_url: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub source_keyword: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub xsec_token: Option<String>,
}

impl Entity for XhsNote {
    const KIND: EntityKind = EntityKind::Content;
    const KEY: &'static str = "note_id";
    const COLUMNS: &'static [ColumnDef] = &[
        ColumnDef::text("note_id"),
        ColumnDef::text("note_type"),
        ColumnDef::text("title"),
        ColumnDef::text("desc"),
        ColumnDef::text("video_url"),
        ColumnDef::integer("time"),
        ColumnDef::integer("last_update_time"),
        ColumnDef::text("user_id"),
        ColumnDef::text("nickname"),
        ColumnDef::text("avatar"),
        ColumnDef::text("ip_location"),
        ColumnDef::integer("liked_count"),
        ColumnDef::integer("collected_count"),
        ColumnDef::integer("comment_count"),
        ColumnDef::integer("share_count"),
        ColumnDef::text("image_list"),
        ColumnDef::text("tag_list"),
        ColumnDef::text("note_url"),
        ColumnDef::text("source_keyword"),
        ColumnDef::text("xsec_token"),
    ];
    // Notes are immutable once published; only engagement moves.
    const MUTABLE: &'static [&'static str] = &[
        "liked_count",
        "collected_count",
        "comment_count",
        "share_count",
        "last_update_time",
    ];

    fn natural_key(&self) -> &str {
        &self.note_id
    }

    fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }
}

/// Douyin video ("aweme").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DouyinAweme {
    #[serde(deserialize_with = "de::key")]
    pub aweme_id: String,
    #[serde(deserialize_with = "de::opt_text")]
    pub aweme_type: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub title: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub desc: Option<String>,
    #[serde(deserialize_with = "de::timestamp")]
    pub create_time: Option<i64>,
    #[serde(deserialize_with = "de::opt_text")]
    pub user_id: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub sec_uid: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub short_user_id: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub user_unique_id: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub user_signature: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub nickname: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub avatar: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub ip_location: Option<String>,
    #[serde(deserialize_with = "de::count")]
    pub liked_count: Option<i64>,
    #[serde(deserialize_with = "de::count")]
    pub collected_count: Option<i64>,
    #[serde(deserialize_with = "de::count")]
    pub comment_count: Option<i64>,
    #[serde(deserialize_with = "de::count")]
    pub share_count: Option<i64>,
    #[serde(deserialize_with = "de::opt_text")]
    pub aweme_url: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub cover_url: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub video_download_url: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub source_keyword: Option<String>,
}

impl Entity for DouyinAweme {
    const KIND: EntityKind = EntityKind::Content;
    const KEY: &'static str = "aweme_id";
    const COLUMNS: &'static [ColumnDef] = &[
        ColumnDef::text("aweme_id"),
        ColumnDef::text("aweme_type"),
        ColumnDef::text("title"),
        ColumnDef::text("desc"),
        ColumnDef::integer("create_time"),
        ColumnDef::text("user_id"),
        ColumnDef::text("sec_uid"),
        ColumnDef::text("short_user_id"),
        ColumnDef::text("user_unique_id"),
        ColumnDef::text("user_signature"),
        ColumnDef::text("nickname"),
        ColumnDef::text("avatar"),
        ColumnDef::text("ip_location"),
        ColumnDef::integer("liked_count"),
        ColumnDef::integer("collected_count"),
        ColumnDef::integer("comment_count"),
        ColumnDef::integer("share_count"),
        ColumnDef::text("aweme_url"),
        ColumnDef::text("cover_url"),
        ColumnDef::text("video_download_url"),
        ColumnDef::text("source_keyword"),
    ];
    const MUTABLE: &'static [&'static str] = &[
        "aweme_type",
        "title",
        "desc",
        "create_time",
        "user_id",
        "sec_uid",
        "short_user_id",
        "user_unique_id",
        "user_signature",
        "nickname",
        "avatar",
        "ip_location",
        "liked_count",
        "collected_count",
        "comment_count",
        "share_count",
        "aweme_url",
        "cover_url",
        "video_download_url",
        "source_keyword",
    ];

    fn natural_key(&self) -> &str {
        &self.aweme_id
    }

    fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }
}

/// Kuaishou video.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KuaishouVideo {
    #[serde(deserialize_with = "de::key")]
    pub video_id: String,
    #[serde(deserialize_with = "de::opt_text")]
    pub video_type: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub title: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub desc: Option<String>,
    #[serde(deserialize_with = "de::timestamp")]
    pub create_time: Option<i64>,
    #[serde(deserialize_with = "de::opt_text")]
    pub user_id: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub nickname: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub avatar: Option<String>,
    #[serde(deserialize_with = "de::count")]
    pub liked_count: Option<i64>,
    #[serde(deserialize_with = "de::count")]
    pub viewd_count: Option<i64>,
    #[serde(deserialize_with = "de::opt_text")]
    pub video_url: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub video_cover_url: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub video_play_url: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub source_keyword: Option<String>,
}

impl Entity for KuaishouVideo {
    const KIND: EntityKind = EntityKind::Content;
    const KEY: &'static str = "video_id";
    const COLUMNS: &'static [ColumnDef] = &[
        ColumnDef::text("video_id"),
        ColumnDef::text("video_type"),
        ColumnDef::text("title"),
        ColumnDef::text("desc"),
        ColumnDef::integer("create_time"),
        ColumnDef::text("user_id"),
        ColumnDef::text("nickname"),
        ColumnDef::text("avatar"),
        ColumnDef::integer("liked_count"),
        ColumnDef::integer("viewd_count"),
        ColumnDef::text("video_url"),
        ColumnDef::text("video_cover_url"),
        ColumnDef::text("video_play_url"),
        ColumnDef::text("source_keyword"),
    ];
    const MUTABLE: &'static [&'static str] = &[
        "title",
        "desc",
        "nickname",
        "avatar",
        "liked_count",
        "viewd_count",
        "video_cover_url",
        "video_play_url",
    ];

    fn natural_key(&self) -> &str {
        &self.video_id
    }

    fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }
}

/// Bilibili video.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BilibiliVideo {
    #[serde(deserialize_with = "de::key")]
    pub video_id: String,
    #[serde(deserialize_with = "de::opt_text")]
    pub video_type: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub title: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub desc: Option<String>,
    #[serde(deserialize_with = "de::timestamp")]
    pub create_time: Option<i64>,
    #[serde(deserialize_with = "de::opt_text")]
    pub user_id: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub nickname: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub avatar: Option<String>,
    #[serde(deserialize_with = "de::count")]
    pub liked_count: Option<i64>,
    #[serde(deserialize_with = "de::count")]
    pub video_play_count: Option<i64>,
    #[serde(deserialize_with = "de::count")]
    pub video_danmaku: Option<i64>,
    #[serde(deserialize_with = "de::count")]
    pub video_comment: Option<i64>,
    #[serde(deserialize_with = "de::opt_text")]
    pub video_url: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub video_cover_url: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub source_keyword: Option<String>,
}

impl Entity for BilibiliVideo {
    const KIND: EntityKind = EntityKind::Content;
    const KEY: &'static str = "video_id";
    const COLUMNS: &'static [ColumnDef] = &[
        ColumnDef::text("video_id"),
        ColumnDef::text("video_type"),
        ColumnDef::text("title"),
        ColumnDef::text("desc"),
        ColumnDef::integer("create_time"),
        ColumnDef::text("user_id"),
        ColumnDef::text("nickname"),
        ColumnDef::text("avatar"),
        ColumnDef::integer("liked_count"),
        ColumnDef::integer("video_play_count"),
        ColumnDef::integer("video_danmaku"),
        ColumnDef::integer("video_comment"),
        ColumnDef::text("video_url"),
        ColumnDef::text("video_cover_url"),
        ColumnDef::text("source_keyword"),
    ];
    const MUTABLE: &'static [&'static str] = &[
        "title",
        "desc",
        "nickname",
        "avatar",
        "liked_count",
        "video_play_count",
        "video_danmaku",
        "video_comment",
        "video_cover_url",
    ];

    fn natural_key(&self) -> &str {
        &self.video_id
    }

    fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }
}

/// Weibo post. Weibo has no title; the post body stands in for it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeiboNote {
    #[serde(deserialize_with = "de::key")]
    pub note_id: String,
    #[serde(deserialize_with = "de::opt_text")]
    pub content: Option<String>,
    #[serde(deserialize_with = "de::timestamp")]
    pub create_time: Option<i64>,
    #[serde(deserialize_with = "de::opt_text")]
    pub create_date_time: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub user_id: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub nickname: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub avatar: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub gender: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub profile_url: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub ip_location: Option<String>,
    #[serde(deserialize_with = "de::count")]
    pub liked_count: Option<i64>,
    #[serde(deserialize_with = "de::count")]
    pub comments_count: Option<i64>,
    #[serde(deserialize_with = "de::count")]
    pub shared_count: Option<i64>,
    #[serde(deserialize_with = "de::opt_text")]
    pub note_url: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub source_keyword: Option<String>,
}

impl Entity for WeiboNote {
    const KIND: EntityKind = EntityKind::Content;
    const KEY: &'static str = "note_id";
    const COLUMNS: &'static [ColumnDef] = &[
        ColumnDef::text("note_id"),
        ColumnDef::text("content"),
        ColumnDef::integer("create_time"),
        ColumnDef::text("create_date_time"),
        ColumnDef::text("user_id"),
        ColumnDef::text("nickname"),
        ColumnDef::text("avatar"),
        ColumnDef::text("gender"),
        ColumnDef::text("profile_url"),
        ColumnDef::text("ip_location"),
        ColumnDef::integer("liked_count"),
        ColumnDef::integer("comments_count"),
        ColumnDef::integer("shared_count"),
        ColumnDef::text("note_url"),
        ColumnDef::text("source_keyword"),
    ];
    const MUTABLE: &'static [&'static str] = &[
        "content",
        "nickname",
        "avatar",
        "liked_count",
        "comments_count",
        "shared_count",
    ];

    fn natural_key(&self) -> &str {
        &self.note_id
    }

    fn title(&self) -> Option<&str> {
        self.content.as_deref()
    }
}

/// Baidu Tieba thread.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TiebaNote {
    #[serde(deserialize_with = "de::key")]
    pub note_id: String,
    #[serde(deserialize_with = "de::opt_text")]
    pub title: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub desc: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub note_url: Option<String>,
    #[serde(deserialize_with = "de::timestamp")]
    pub publish_time: Option<i64>,
    #[serde(deserialize_with = "de::opt_text")]
    pub user_link: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub user_nickname: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub user_avatar: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub tieba_id: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub tieba_name: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub tieba_link: Option<String>,
    #[serde(deserialize_with = "de::count")]
    pub total_replay_num: Option<i64>,
    #[serde(deserialize_with = "de::count")]
    pub total_replay_page: Option<i64>,
    #[serde(deserialize_with = "de::opt_text")]
    pub ip_location: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub source_keyword: Option<String>,
}

impl Entity for TiebaNote {
    const KIND: EntityKind = EntityKind::Content;
    const KEY: &'static str = "note_id";
    const COLUMNS: &'static [ColumnDef] = &[
        ColumnDef::text("note_id"),
        ColumnDef::text("title"),
        ColumnDef::text("desc"),
        ColumnDef::text("note_url"),
        ColumnDef::integer("publish_time"),
        ColumnDef::text("user_link"),
        ColumnDef::text("user_nickname"),
        ColumnDef::text("user_avatar"),
        ColumnDef::text("tieba_id"),
        ColumnDef::text("tieba_name"),
        ColumnDef::text("tieba_link"),
        ColumnDef::integer("total_replay_num"),
        ColumnDef::integer("total_replay_page"),
        ColumnDef::text("ip_location"),
        ColumnDef::text("source_keyword"),
    ];
    const MUTABLE: &'static [&'static str] = &[
        "title",
        "desc",
        "user_nickname",
        "user_avatar",
        "total_replay_num",
        "total_replay_page",
    ];

    fn natural_key(&self) -> &str {
        &self.note_id
    }

    fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }
}

/// Zhihu answer, article, or video.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZhihuContent {
    #[serde(deserialize_with = "de::key")]
    pub content_id: String,
    #[serde(deserialize_with = "de::opt_text")]
    pub content_type: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub content_text: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub content_url: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub question_id: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub title: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub desc: Option<String>,
    #[serde(deserialize_with = "de::timestamp")]
    pub created_time: Option<i64>,
    #[serde(deserialize_with = "de::timestamp")]
    pub updated_time: Option<i64>,
    #[serde(deserialize_with = "de::count")]
    pub voteup_count: Option<i64>,
    #[serde(deserialize_with = "de::count")]
    pub comment_count: Option<i64>,
    #[serde(deserialize_with = "de::opt_text")]
    pub user_id: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub user_link: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub user_nickname: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub user_avatar: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub user_url_token: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub source_keyword: Option<String>,
}

impl Entity for ZhihuContent {
    const KIND: EntityKind = EntityKind::Content;
    const KEY: &'static str = "content_id";
    const COLUMNS: &'static [ColumnDef] = &[
        ColumnDef::text("content_id"),
        ColumnDef::text("content_type"),
        ColumnDef::text("content_text"),
        ColumnDef::text("content_url"),
        ColumnDef::text("question_id"),
        ColumnDef::text("title"),
        ColumnDef::text("desc"),
        ColumnDef::integer("created_time"),
        ColumnDef::integer("updated_time"),
        ColumnDef::integer("voteup_count"),
        ColumnDef::integer("comment_count"),
        ColumnDef::text("user_id"),
        ColumnDef::text("user_link"),
        ColumnDef::text("user_nickname"),
        ColumnDef::text("user_avatar"),
        ColumnDef::text("user_url_token"),
        ColumnDef::text("source_keyword"),
    ];
    const MUTABLE: &'static [&'static str] = &[
        "content_type",
        "content_text",
        "content_url",
        "question_id",
        "title",
        "desc",
        "created_time",
        "updated_time",
        "voteup_count",
        "comment_count",
        "user_id",
        "user_link",
        "user_nickname",
        "user_avatar",
        "user_url_token",
        "source_keyword",
    ];

    fn natural_key(&self) -> &str {
        &self.content_id
    }

    fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }
}

/// A comment on any platform's content.
///
/// Crawlers name the parent reference after the platform (`note_id`,
/// `aweme_id`, `video_id`); all of them land in `content_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentItem {
    #[serde(deserialize_with = "de::key")]
    pub comment_id: String,
    #[serde(
        alias = "note_id",
        alias = "aweme_id",
        alias = "video_id",
        deserialize_with = "de::opt_text"
    )]
    pub content_id: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub parent_comment_id: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub user_id: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub nickname: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub avatar: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub ip_location: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub content: Option<String>,
    #[serde(deserialize_with = "de::timestamp")]
    pub create_time: Option<i64>,
    #[serde(deserialize_with = "de::count")]
    pub like_count: Option<i64>,
    #[serde(deserialize_with = "de::count")]
    pub sub_comment_count: Option<i64>,
    #[serde(deserialize_with = "de::list_text")]
    pub pictures: Option<String>,
}

impl Entity for CommentItem {
    const KIND: EntityKind = EntityKind::Comment;
    const KEY: &'static str = "comment_id";
    const COLUMNS: &'static [ColumnDef] = &[
        ColumnDef::text("comment_id"),
        ColumnDef::text("content_id"),
        ColumnDef::text("parent_comment_id"),
        ColumnDef::text("user_id"),
        ColumnDef::text("nickname"),
        ColumnDef::text("avatar"),
        ColumnDef::text("ip_location"),
        ColumnDef::text("content"),
        ColumnDef::integer("create_time"),
        ColumnDef::integer("like_count"),
        ColumnDef::integer("sub_comment_count"),
        ColumnDef::text("pictures"),
    ];
    const MUTABLE: &'static [&'static str] =
        &["content", "like_count", "sub_comment_count", "pictures"];

    fn natural_key(&self) -> &str {
        &self.comment_id
    }
}

/// A content creator profile on any platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreatorItem {
    #[serde(deserialize_with = "de::key")]
    pub user_id: String,
    #[serde(deserialize_with = "de::opt_text")]
    pub nickname: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub avatar: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub desc: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub gender: Option<String>,
    #[serde(deserialize_with = "de::opt_text")]
    pub ip_location: Option<String>,
    #[serde(deserialize_with = "de::count")]
    pub follows: Option<i64>,
    #[serde(deserialize_with = "de::count")]
    pub fans: Option<i64>,
    #[serde(deserialize_with = "de::count")]
    pub interaction: Option<i64>,
    #[serde(deserialize_with = "de::list_text")]
    pub tag_list: Option<String>,
}

impl Entity for CreatorItem {
    const KIND: EntityKind = EntityKind::Creator;
    const KEY: &'static str = "user_id";
    const COLUMNS: &'static [ColumnDef] = &[
        ColumnDef::text("user_id"),
        ColumnDef::text("nickname"),
        ColumnDef::text("avatar"),
        ColumnDef::text("desc"),
        ColumnDef::text("gender"),
        ColumnDef::text("ip_location"),
        ColumnDef::integer("follows"),
        ColumnDef::integer("fans"),
        ColumnDef::integer("interaction"),
        ColumnDef::text("tag_list"),
    ];
    const MUTABLE: &'static [&'static str] = &[
        "nickname",
        "avatar",
        "desc",
        "follows",
        "fans",
        "interaction",
        "tag_list",
    ];

    fn natural_key(&self) -> &str {
        &self.user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Serialized field names must be exactly the declared columns.
    fn assert_columns_match<T: Entity + Default>() {
        let value = serde_json::to_value(T::default()).unwrap();
        let mut fields: Vec<&str> = value
            .as_object()
            .unwrap()
            .keys()
            .map(|k| k.as_str())
            .collect();
        let mut cols: Vec<&str> = T::COLUMNS.iter().map(|c| c.name).collect();
        fields.sort_unstable();
        cols.sort_unstable();
        assert_eq!(fields, cols);
        assert!(T::column(T::KEY).is_some());
        for m in T::MUTABLE {
            assert!(T::column(m).is_some(), "mutable column {} not declared", m);
            assert_ne!(*m, T::KEY);
        }
    }

    #[test]
    fn test_declared_columns_match_fields() {
        assert_columns_match::<XhsNote>();
        assert_columns_match::<DouyinAweme>();
        assert_columns_match::<KuaishouVideo>();
        assert_columns_match::<BilibiliVideo>();
        assert_columns_match::<WeiboNote>();
        assert_columns_match::<TiebaNote>();
        assert_columns_match::<ZhihuContent>();
        assert_columns_match::<CommentItem>();
        assert_columns_match::<CreatorItem>();
    }

    #[test]
    fn test_parse_count_formats() {
        assert_eq!(parse_count("42"), Some(42));
        assert_eq!(parse_count("1.2万"), Some(12000));
        assert_eq!(parse_count("10万+"), Some(100000));
        assert_eq!(parse_count("3,401"), Some(3401));
        assert_eq!(parse_count("2亿"), Some(200_000_000));
        assert_eq!(parse_count(""), None);
        assert_eq!(parse_count("lots"), None);
    }

    #[test]
    fn test_lenient_deserialization() {
        let note: XhsNote = serde_json::from_value(json!({
            "note_id": 123,
            "type": "normal",
            "title": null,
            "liked_count": "1.1万",
            "image_list": ["a.jpg", "b.jpg"],
            "time": 1700000000000i64,
            "unknown_field": true
        }))
        .unwrap();
        assert_eq!(note.note_id, "123");
        assert_eq!(note.note_type.as_deref(), Some("normal"));
        assert_eq!(note.title, None);
        assert_eq!(note.liked_count, Some(11000));
        assert_eq!(note.image_list.as_deref(), Some("[\"a.jpg\",\"b.jpg\"]"));
        assert_eq!(note.time, Some(1_700_000_000_000));
    }

    #[test]
    fn test_date_string_timestamps() {
        let note: TiebaNote = serde_json::from_value(json!({
            "note_id": "t1",
            "publish_time": "2024-01-02 03:04"
        }))
        .unwrap();
        assert_eq!(note.publish_time, Some(1_704_164_640_000));
    }

    #[test]
    fn test_comment_parent_aliases() {
        let c: CommentItem =
            serde_json::from_value(json!({ "comment_id": "c1", "aweme_id": "a9" })).unwrap();
        assert_eq!(c.content_id.as_deref(), Some("a9"));
    }

    #[test]
    fn test_field_values_follow_column_order() {
        let creator = CreatorItem {
            user_id: "u1".to_string(),
            fans: Some(10),
            ..Default::default()
        };
        let values = creator.field_values().unwrap();
        let names: Vec<&str> = values.iter().map(|(n, _)| *n).collect();
        let cols: Vec<&str> = CreatorItem::COLUMNS.iter().map(|c| c.name).collect();
        assert_eq!(names, cols);
        assert_eq!(values[0].1, crate::models::FieldValue::Text("u1".to_string()));
    }
}
