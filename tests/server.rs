use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::Notify;

use crawl_harness::config::Config;
use crawl_harness::engine::{CrawlerConfig, IngestionEngine};
use crawl_harness::hub::Hub;
use crawl_harness::server;
use crawl_harness_core::models::EntityKind;

struct HeldEngine {
    done: Notify,
}

#[async_trait]
impl IngestionEngine for HeldEngine {
    async fn start(&self, _config: &CrawlerConfig) -> anyhow::Result<()> {
        self.done.notified().await;
        Ok(())
    }
}

struct TestServer {
    _tmp: TempDir,
    base: String,
    hub: Arc<Hub>,
    engine: Arc<HeldEngine>,
    client: reqwest::Client,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn get(&self, path: &str) -> (u16, Value) {
        let resp = self.client.get(self.url(path)).send().await.unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    async fn post(&self, path: &str, body: Value) -> (u16, Value) {
        let resp = self
            .client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }
}

async fn start_server() -> TestServer {
    let tmp = TempDir::new().unwrap();
    let config = Config::minimal(tmp.path().join("crawlh.sqlite"));
    let engine = Arc::new(HeldEngine {
        done: Notify::new(),
    });
    let hub = Arc::new(
        Hub::open_with_engine(&config, engine.clone())
            .await
            .unwrap(),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let serving = hub.clone();
    tokio::spawn(async move {
        let _ = server::serve(listener, serving).await;
    });

    TestServer {
        _tmp: tmp,
        base: format!("http://{}", addr),
        hub,
        engine,
        client: reqwest::Client::new(),
    }
}

async fn seed(hub: &Hub) {
    hub.upsert(
        "xhs",
        EntityKind::Content,
        json!({
            "note_id": "n1",
            "title": "Rust ownership explained",
            "nickname": "alice",
            "liked_count": "2.5万",
            "image_list": "['https://img/1.jpg', 'https://img/2.jpg']",
            "tag_list": "rust,ownership",
            "source_keyword": "rust"
        }),
    )
    .await
    .unwrap();
    hub.upsert(
        "dy",
        EntityKind::Content,
        json!({ "aweme_id": "a1", "title": "Rust in 60s", "source_keyword": "rust" }),
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn test_health() {
    let srv = start_server().await;
    let (status, body) = srv.get("/health").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_platforms_and_keywords() {
    let srv = start_server().await;
    seed(&srv.hub).await;

    let (status, body) = srv.get("/api/v2/data/platforms").await;
    assert_eq!(status, 200);
    let platforms = body["data"].as_array().unwrap();
    assert_eq!(platforms.len(), 7);
    assert_eq!(platforms[0]["key"], "xhs");

    let (status, body) = srv.get("/api/v2/data/keywords").await;
    assert_eq!(status, 200);
    assert_eq!(
        body["data"],
        json!([{ "value": "rust", "platforms": ["xhs", "dy"] }])
    );
}

#[tokio::test]
async fn test_list_returns_canonical_page() {
    let srv = start_server().await;
    seed(&srv.hub).await;

    let (status, body) = srv
        .get("/api/v2/data/list?platform=xhs&keyword=OWNERSHIP&page=1&page_size=5")
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["total"], 1);
    let rec = &body["data"]["list"][0];
    assert_eq!(rec["id"], "n1");
    assert_eq!(rec["platform"], "xhs");
    assert_eq!(rec["liked_count"], 25000);
    assert_eq!(rec["image_list"], json!(["https://img/1.jpg", "https://img/2.jpg"]));
    assert_eq!(rec["keyword"], "rust");
}

#[tokio::test]
async fn test_list_rejects_bad_input() {
    let srv = start_server().await;

    let (status, body) = srv.get("/api/v2/data/list?platform=myspace").await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "invalid_platform");

    let (status, body) = srv.get("/api/v2/data/list?platform=xhs&page_size=500").await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "invalid_input");

    let (status, body) = srv.get("/api/v2/data/list").await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "invalid_input");

    // Unparseable query values get the same envelope as handler errors.
    let (status, body) = srv.get("/api/v2/data/list?platform=xhs&page=abc").await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "invalid_input");
}

#[tokio::test]
async fn test_crawler_start_rejects_malformed_body() {
    let srv = start_server().await;

    let resp = srv
        .client
        .post(srv.url("/api/v2/crawler/start"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "invalid_input");

    let resp = srv
        .client
        .post(srv.url("/api/v2/crawler/start"))
        .body(r#"{"platform":"xhs"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "invalid_input");

    assert!(srv.hub.list_tasks().is_empty());
}

#[tokio::test]
async fn test_detail_normalizes_lists() {
    let srv = start_server().await;
    seed(&srv.hub).await;

    let (status, body) = srv.get("/api/v2/data/detail/xhs/n1").await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["note_id"], "n1");
    assert_eq!(body["data"]["tag_list"], json!(["rust", "ownership"]));
    assert_eq!(
        body["data"]["image_list"],
        json!(["https://img/1.jpg", "https://img/2.jpg"])
    );

    let (status, body) = srv.get("/api/v2/data/detail/xhs/missing").await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_crawler_start_conflict_and_status() {
    let srv = start_server().await;

    let (status, body) = srv
        .post(
            "/api/v2/crawler/start",
            json!({ "platform": "xhs", "keywords": "rust" }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["platform"], "xhs");
    assert_eq!(body["data"]["keywords"], "rust");
    let task_id = body["data"]["task_id"].as_str().unwrap().to_string();

    let (status, body) = srv
        .post("/api/v2/crawler/start", json!({ "platform": "dy" }))
        .await;
    assert_eq!(status, 429);
    assert_eq!(body["error"]["code"], "conflict");

    let (status, body) = srv
        .get(&format!("/api/v2/crawler/status/{}", task_id))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["task_id"], task_id.as_str());
    assert!(body["data"]["status"] == "pending" || body["data"]["status"] == "running");

    srv.engine.done.notify_one();
    let mut final_status = Value::Null;
    for _ in 0..200 {
        let (_, body) = srv
            .get(&format!("/api/v2/crawler/status/{}", task_id))
            .await;
        final_status = body["data"]["status"].clone();
        if final_status == "success" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(final_status, "success");

    let (status, body) = srv.get("/api/v2/crawler/tasks").await;
    assert_eq!(status, 200);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, body) = srv.get("/api/v2/crawler/status/nope").await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_stats() {
    let srv = start_server().await;
    seed(&srv.hub).await;

    let (status, body) = srv.get("/api/v2/data/stats").await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["busy"], false);
    let xhs = body["data"]["platforms"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["platform"] == "xhs")
        .unwrap()
        .clone();
    assert_eq!(xhs["contents"], 1);
    assert_eq!(xhs["comments"], 0);
}
