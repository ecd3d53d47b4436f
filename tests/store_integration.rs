use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tempfile::TempDir;

use crawl_harness::config::Config;
use crawl_harness::db;
use crawl_harness::engine::{CrawlerConfig, IngestionEngine};
use crawl_harness::error::Error;
use crawl_harness::hub::{Hub, QueryParams};
use crawl_harness::migrate::migrate_pool;
use crawl_harness::sqlite_store::SqliteStore;
use crawl_harness::store::{ListQuery, Paginate, SkipReason, UpsertOutcome};
use crawl_harness_core::entities::{DouyinAweme, XhsNote};
use crawl_harness_core::models::{EntityKind, Platform};
use crawl_harness_core::schema::SchemaRegistry;

struct NoopEngine;

#[async_trait]
impl IngestionEngine for NoopEngine {
    async fn start(&self, _config: &CrawlerConfig) -> anyhow::Result<()> {
        Ok(())
    }
}

async fn setup() -> (TempDir, Hub) {
    let tmp = TempDir::new().unwrap();
    let config = Config::minimal(tmp.path().join("data/crawlh.sqlite"));
    let hub = Hub::open_with_engine(&config, Arc::new(NoopEngine))
        .await
        .unwrap();
    (tmp, hub)
}

async fn xhs_store(tmp: &TempDir) -> SqliteStore<XhsNote> {
    let config = Config::minimal(tmp.path().join("typed.sqlite"));
    let pool = db::connect(&config).await.unwrap();
    let registry = SchemaRegistry::builtin();
    migrate_pool(&pool, &registry).await.unwrap();
    SqliteStore::new(pool, registry.get(Platform::Xhs).unwrap().clone())
}

fn xhs_note(id: &str, title: &str, liked: i64, keyword: &str) -> serde_json::Value {
    json!({
        "note_id": id,
        "title": title,
        "nickname": "alice",
        "liked_count": liked,
        "comment_count": 1,
        "time": 1_700_000_000_000i64,
        "note_url": format!("https://www.xiaohongshu.com/explore/{}", id),
        "image_list": "https://img/a.jpg,https://img/b.jpg",
        "source_keyword": keyword
    })
}

async fn seed_xhs(hub: &Hub, n: i64) {
    for i in 0..n {
        let keyword = if i % 2 == 0 { "rust" } else { "go" };
        let outcome = hub
            .upsert(
                "xhs",
                EntityKind::Content,
                xhs_note(&format!("n{}", i), &format!("Note {} about Rust", i), i * 10, keyword),
            )
            .await
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Inserted);
    }
}

fn params(platform: &str) -> QueryParams {
    QueryParams {
        platform: platform.to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_pagination_respects_page_size_and_total() {
    let (_tmp, hub) = setup().await;
    seed_xhs(&hub, 25).await;

    let page1 = hub
        .query(QueryParams {
            page: Some(1),
            page_size: Some(10),
            ..params("xhs")
        })
        .await
        .unwrap();
    assert_eq!(page1.total, 25);
    assert_eq!(page1.list.len(), 10);

    let page3 = hub
        .query(QueryParams {
            page: Some(3),
            page_size: Some(10),
            ..params("xhs")
        })
        .await
        .unwrap();
    assert_eq!(page3.total, 25);
    assert_eq!(page3.list.len(), 5);

    let page4 = hub
        .query(QueryParams {
            page: Some(4),
            page_size: Some(10),
            ..params("xhs")
        })
        .await
        .unwrap();
    assert_eq!(page4.total, 25);
    assert!(page4.list.is_empty());
}

#[tokio::test]
async fn test_sorting_is_descending() {
    let (_tmp, hub) = setup().await;
    seed_xhs(&hub, 5).await;

    let page = hub
        .query(QueryParams {
            sort_by: Some("liked_count".to_string()),
            ..params("xhs")
        })
        .await
        .unwrap();
    let likes: Vec<i64> = page.list.iter().map(|r| r.liked_count).collect();
    assert_eq!(likes, vec![40, 30, 20, 10, 0]);
}

#[tokio::test]
async fn test_unknown_sort_field_is_ignored() {
    let (_tmp, hub) = setup().await;
    seed_xhs(&hub, 3).await;

    let page = hub
        .query(QueryParams {
            sort_by: Some("'; DROP TABLE xhs_note; --".to_string()),
            ..params("xhs")
        })
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.list.len(), 3);
}

#[tokio::test]
async fn test_no_match_returns_empty_page() {
    let (_tmp, hub) = setup().await;
    seed_xhs(&hub, 3).await;

    let page = hub
        .query(QueryParams {
            source_keyword: Some("python".to_string()),
            ..params("xhs")
        })
        .await
        .unwrap();
    assert_eq!(page.total, 0);
    assert!(page.list.is_empty());
}

#[tokio::test]
async fn test_source_keyword_matches_exactly() {
    let (_tmp, hub) = setup().await;
    seed_xhs(&hub, 6).await;

    let page = hub
        .query(QueryParams {
            source_keyword: Some("rust".to_string()),
            ..params("xhs")
        })
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert!(page.list.iter().all(|r| r.keyword == "rust"));

    let partial = hub
        .query(QueryParams {
            source_keyword: Some("rus".to_string()),
            ..params("xhs")
        })
        .await
        .unwrap();
    assert_eq!(partial.total, 0);
}

#[tokio::test]
async fn test_keyword_is_case_insensitive_substring() {
    let (_tmp, hub) = setup().await;
    seed_xhs(&hub, 2).await;
    hub.upsert(
        "xhs",
        EntityKind::Content,
        xhs_note("other", "Cooking pasta", 5, "food"),
    )
    .await
    .unwrap();

    let page = hub
        .query(QueryParams {
            keyword: Some("RUST".to_string()),
            ..params("xhs")
        })
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert!(page
        .list
        .iter()
        .all(|r| r.title.to_lowercase().contains("rust")));
}

#[tokio::test]
async fn test_keyword_wildcards_match_literally() {
    let (_tmp, hub) = setup().await;
    hub.upsert("xhs", EntityKind::Content, xhs_note("a", "50% off", 1, "sale"))
        .await
        .unwrap();
    hub.upsert("xhs", EntityKind::Content, xhs_note("b", "500 off", 1, "sale"))
        .await
        .unwrap();

    let page = hub
        .query(QueryParams {
            keyword: Some("0%".to_string()),
            ..params("xhs")
        })
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.list[0].id, "a");
}

#[tokio::test]
async fn test_canonical_projection_fills_every_field() {
    let (_tmp, hub) = setup().await;
    hub.upsert(
        "ks",
        EntityKind::Content,
        json!({
            "video_id": "v1",
            "title": "Kuaishou clip",
            "liked_count": "1.2万",
            "video_url": "https://www.kuaishou.com/short-video/v1",
            "video_cover_url": "https://cdn/cover.jpg",
            "source_keyword": "clip"
        }),
    )
    .await
    .unwrap();

    let page = hub.query(params("ks")).await.unwrap();
    let rec = &page.list[0];
    assert_eq!(rec.id, "v1");
    assert_eq!(rec.platform, "ks");
    assert_eq!(rec.nickname, "");
    assert_eq!(rec.liked_count, 12000);
    assert_eq!(rec.comment_count, 0);
    assert_eq!(rec.create_time, 0);
    assert_eq!(rec.image_list, vec!["https://cdn/cover.jpg"]);
    assert_eq!(rec.keyword, "clip");
}

#[tokio::test]
async fn test_legacy_image_list_is_decoded_on_read() {
    let (_tmp, hub) = setup().await;
    seed_xhs(&hub, 1).await;

    let page = hub.query(params("xhs")).await.unwrap();
    assert_eq!(
        page.list[0].image_list,
        vec!["https://img/a.jpg", "https://img/b.jpg"]
    );

    let detail = hub.get_content("xhs", "n0").await.unwrap();
    assert_eq!(
        detail["image_list"],
        json!(["https://img/a.jpg", "https://img/b.jpg"])
    );
    assert_eq!(detail["platform"], json!("xhs"));
    assert!(detail["add_ts"].is_i64());
}

#[tokio::test]
async fn test_weibo_title_comes_from_content() {
    let (_tmp, hub) = setup().await;
    hub.upsert(
        "wb",
        EntityKind::Content,
        json!({
            "note_id": "w1",
            "content": "Weibo post about tokio",
            "comments_count": 4,
            "source_keyword": "tokio"
        }),
    )
    .await
    .unwrap();

    let page = hub
        .query(QueryParams {
            keyword: Some("tokio".to_string()),
            ..params("wb")
        })
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.list[0].title, "Weibo post about tokio");
    assert_eq!(page.list[0].comment_count, 4);
    assert!(page.list[0].image_list.is_empty());
}

#[tokio::test]
async fn test_upsert_is_idempotent_and_bumps_modify_ts() {
    let (_tmp, hub) = setup().await;
    let item = xhs_note("same", "Same note", 7, "rust");

    let first = hub
        .upsert("xhs", EntityKind::Content, item.clone())
        .await
        .unwrap();
    let before = hub.get_content("xhs", "same").await.unwrap();
    let second = hub.upsert("xhs", EntityKind::Content, item).await.unwrap();
    let after = hub.get_content("xhs", "same").await.unwrap();

    assert_eq!(first, UpsertOutcome::Inserted);
    assert_eq!(second, UpsertOutcome::Updated);
    assert_eq!(hub.query(params("xhs")).await.unwrap().total, 1);
    assert_eq!(before["add_ts"], after["add_ts"]);
    assert!(after["last_modify_ts"].as_i64().unwrap() > before["last_modify_ts"].as_i64().unwrap());
    assert_eq!(before["add_ts"], before["last_modify_ts"]);
}

#[tokio::test]
async fn test_xhs_update_touches_only_engagement() {
    let tmp = TempDir::new().unwrap();
    let store = xhs_store(&tmp).await;

    let mut note = XhsNote {
        note_id: "n1".to_string(),
        title: Some("Original".to_string()),
        liked_count: Some(1),
        ..Default::default()
    };
    assert_eq!(store.upsert_content(&note).await.unwrap(), UpsertOutcome::Inserted);

    note.title = Some("Edited".to_string());
    note.liked_count = Some(99);
    assert_eq!(store.upsert_content(&note).await.unwrap(), UpsertOutcome::Updated);

    let page = store
        .get_paginated_list(&ListQuery::new(1, 10))
        .await
        .unwrap();
    assert_eq!(page.list[0].title, "Original");
    assert_eq!(page.list[0].liked_count, 99);
}

#[tokio::test]
async fn test_douyin_requires_title_to_insert() {
    let (_tmp, hub) = setup().await;

    let outcome = hub
        .upsert(
            "dy",
            EntityKind::Content,
            serde_json::to_value(DouyinAweme {
                aweme_id: "a1".to_string(),
                title: Some("   ".to_string()),
                ..Default::default()
            })
            .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(outcome, UpsertOutcome::Skipped(SkipReason::MissingTitle));
    assert_eq!(hub.query(params("dy")).await.unwrap().total, 0);

    let outcome = hub
        .upsert(
            "dy",
            EntityKind::Content,
            json!({ "aweme_id": "a1", "title": "Now titled", "cover_url": "https://c/1.jpg" }),
        )
        .await
        .unwrap();
    assert_eq!(outcome, UpsertOutcome::Inserted);

    // Other platforms insert untitled content.
    let outcome = hub
        .upsert("bili", EntityKind::Content, json!({ "video_id": "BV1" }))
        .await
        .unwrap();
    assert_eq!(outcome, UpsertOutcome::Inserted);
}

#[tokio::test]
async fn test_empty_natural_key_is_skipped() {
    let (_tmp, hub) = setup().await;
    let outcome = hub
        .upsert("xhs", EntityKind::Content, xhs_note("", "No id", 1, "rust"))
        .await
        .unwrap();
    assert_eq!(outcome, UpsertOutcome::Skipped(SkipReason::EmptyKey));

    let outcome = hub
        .upsert("xhs", EntityKind::Comment, json!({ "comment_id": null }))
        .await
        .unwrap();
    assert_eq!(outcome, UpsertOutcome::Skipped(SkipReason::EmptyKey));
}

#[tokio::test]
async fn test_comments_and_creators_are_counted_per_platform() {
    let (_tmp, hub) = setup().await;
    seed_xhs(&hub, 2).await;
    for i in 0..3 {
        hub.upsert(
            "xhs",
            EntityKind::Comment,
            json!({ "comment_id": format!("c{}", i), "note_id": "n0", "content": "nice", "like_count": "12" }),
        )
        .await
        .unwrap();
    }
    hub.upsert(
        "xhs",
        EntityKind::Creator,
        json!({ "user_id": "u1", "nickname": "alice", "fans": "3.4万", "tag_list": ["a", "b"] }),
    )
    .await
    .unwrap();
    hub.upsert(
        "zhihu",
        EntityKind::Creator,
        json!({ "user_id": "u1", "nickname": "alice" }),
    )
    .await
    .unwrap();

    let stats = hub.stats().await.unwrap();
    let xhs = stats
        .platforms
        .iter()
        .find(|p| p.platform == Platform::Xhs)
        .unwrap();
    assert_eq!(xhs.counts.contents, 2);
    assert_eq!(xhs.counts.comments, 3);
    assert_eq!(xhs.counts.creators, 1);
    assert!(xhs.counts.last_modify_ts.is_some());

    let zhihu = stats
        .platforms
        .iter()
        .find(|p| p.platform == Platform::Zhihu)
        .unwrap();
    assert_eq!(zhihu.counts.creators, 1);
    assert_eq!(zhihu.counts.last_modify_ts, None);
}

#[tokio::test]
async fn test_distinct_keywords_group_platforms() {
    let (_tmp, hub) = setup().await;
    hub.upsert("xhs", EntityKind::Content, xhs_note("x1", "a", 1, "rust"))
        .await
        .unwrap();
    hub.upsert("xhs", EntityKind::Content, xhs_note("x2", "b", 1, "rust"))
        .await
        .unwrap();
    hub.upsert(
        "dy",
        EntityKind::Content,
        json!({ "aweme_id": "d1", "title": "t", "source_keyword": "rust" }),
    )
    .await
    .unwrap();
    hub.upsert(
        "bili",
        EntityKind::Content,
        json!({ "video_id": "b1", "source_keyword": "go" }),
    )
    .await
    .unwrap();
    hub.upsert(
        "zhihu",
        EntityKind::Content,
        json!({ "content_id": "z1", "source_keyword": "   " }),
    )
    .await
    .unwrap();
    hub.upsert("tieba", EntityKind::Content, json!({ "note_id": "t1" }))
        .await
        .unwrap();

    let entries = hub.list_distinct_keywords().await.unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| !e.value.trim().is_empty()));

    let rust = entries.iter().find(|e| e.value == "rust").unwrap();
    assert_eq!(
        rust.platforms.iter().copied().collect::<Vec<_>>(),
        vec![Platform::Xhs, Platform::Douyin]
    );
    let go = entries.iter().find(|e| e.value == "go").unwrap();
    assert_eq!(go.platforms.len(), 1);
    assert!(go.platforms.contains(&Platform::Bilibili));
}

#[tokio::test]
async fn test_query_boundary_validation() {
    let (_tmp, hub) = setup().await;

    let err = hub.query(params("myspace")).await.unwrap_err();
    assert!(matches!(err, Error::InvalidPlatform(ref p) if p == "myspace"));

    let err = hub
        .query(QueryParams {
            page: Some(0),
            ..params("xhs")
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    let err = hub
        .query(QueryParams {
            page_size: Some(101),
            ..params("xhs")
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    let err = hub
        .query(QueryParams {
            page_size: Some(0),
            ..params("xhs")
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    let ok = hub
        .query(QueryParams {
            page_size: Some(100),
            ..params("xhs")
        })
        .await;
    assert!(ok.is_ok());
}

#[tokio::test]
async fn test_get_content_unknown_id_is_not_found() {
    let (_tmp, hub) = setup().await;
    let err = hub.get_content("xhs", "missing").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_disabled_platform_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let mut config = Config::minimal(tmp.path().join("crawlh.sqlite"));
    config.platforms.enabled = vec![Platform::Xhs, Platform::Douyin];
    let hub = Hub::open_with_engine(&config, Arc::new(NoopEngine))
        .await
        .unwrap();

    let keys: Vec<&str> = hub.list_platforms().iter().map(|p| p.key).collect();
    assert_eq!(keys, vec!["xhs", "dy"]);
    let err = hub.query(params("zhihu")).await.unwrap_err();
    assert!(matches!(err, Error::InvalidPlatform(_)));
}

#[tokio::test]
async fn test_list_platforms_in_listing_order() {
    let (_tmp, hub) = setup().await;
    let keys: Vec<&str> = hub.list_platforms().iter().map(|p| p.key).collect();
    assert_eq!(keys, vec!["xhs", "dy", "ks", "bili", "wb", "tieba", "zhihu"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_upserts_all_succeed() {
    let (_tmp, hub) = setup().await;
    let hub = Arc::new(hub);

    for round in 0..5 {
        let mut handles = Vec::new();
        for i in 0..16 {
            let hub = hub.clone();
            handles.push(tokio::spawn(async move {
                let same = hub
                    .upsert(
                        "xhs",
                        EntityKind::Content,
                        xhs_note("shared", "Shared note", i, "rust"),
                    )
                    .await;
                let distinct = hub
                    .upsert(
                        "xhs",
                        EntityKind::Content,
                        xhs_note(&format!("r{}-{}", round, i), "Distinct note", i, "rust"),
                    )
                    .await;
                (same, distinct)
            }));
        }

        let mut shared_inserts = 0;
        for handle in handles {
            let (same, distinct) = handle.await.unwrap();
            let same = same.unwrap();
            assert_eq!(distinct.unwrap(), UpsertOutcome::Inserted);
            if same == UpsertOutcome::Inserted {
                shared_inserts += 1;
            }
        }
        let expected = if round == 0 { 1 } else { 0 };
        assert_eq!(shared_inserts, expected);
    }

    let page = hub.query(params("xhs")).await.unwrap();
    assert_eq!(page.total, 1 + 5 * 16);
}

#[tokio::test]
async fn test_untitled_douyin_update_refreshes_existing_row() {
    let (_tmp, hub) = setup().await;
    hub.upsert(
        "dy",
        EntityKind::Content,
        json!({ "aweme_id": "a1", "title": "Titled", "liked_count": 1 }),
    )
    .await
    .unwrap();

    let outcome = hub
        .upsert(
            "dy",
            EntityKind::Content,
            json!({ "aweme_id": "a1", "liked_count": 50 }),
        )
        .await
        .unwrap();
    assert_eq!(outcome, UpsertOutcome::Updated);
    let page = hub.query(params("dy")).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.list[0].liked_count, 50);
}
