//! Ingestion engine adapter.
//!
//! The crawler that actually drives browsers and talks to platforms is an
//! external program. This module defines the [`IngestionEngine`] seam the
//! task orchestrator calls, the [`CrawlerConfig`] record handed to it, and
//! [`CommandEngine`], which runs the configured program as a child process.

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::EngineConfig;

/// Opaque flat record describing one crawl.
///
/// Well-known options are typed; anything else the engine understands is
/// carried through `extra` untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookies: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crawler_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_ip_proxy: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_proxy_pool_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_proxy_provider_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headless: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_login_state: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_data_option: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_notes_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_get_medias: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_get_comments: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_comments_per_note: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_get_sub_comments: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_sleep_sec: Option<u32>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

macro_rules! overlay_fields {
    ($base:expr, $over:expr, $($field:ident),+ $(,)?) => {
        CrawlerConfig {
            $($field: $over.$field.clone().or_else(|| $base.$field.clone()),)+
            extra: {
                let mut extra = $base.extra.clone();
                extra.extend($over.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
                extra
            },
        }
    };
}

impl CrawlerConfig {
    /// Fields set in `over` win; everything else falls back to `self`.
    pub fn overlay(&self, over: &CrawlerConfig) -> CrawlerConfig {
        overlay_fields!(
            self,
            over,
            platform,
            keywords,
            login_type,
            cookies,
            crawler_type,
            enable_ip_proxy,
            ip_proxy_pool_count,
            ip_proxy_provider_name,
            headless,
            save_login_state,
            save_data_option,
            start_page,
            max_notes_count,
            max_concurrency,
            enable_get_medias,
            enable_get_comments,
            max_comments_per_note,
            enable_get_sub_comments,
            max_sleep_sec,
        )
    }

    /// One `UPPER_CASE` environment variable per set field.
    ///
    /// Strings are passed verbatim, scalars in their JSON form, and nested
    /// values JSON-encoded.
    pub fn to_env(&self) -> Result<Vec<(String, String)>> {
        let value = serde_json::to_value(self)?;
        let Value::Object(map) = value else {
            bail!("crawler config did not serialize to an object");
        };
        Ok(map
            .into_iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| {
                let text = match v {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (k.to_uppercase(), text)
            })
            .collect())
    }
}

/// The external crawler the orchestrator hands jobs to.
///
/// `start` runs one crawl to completion. Returning an error marks the task
/// failed with the error's message.
#[async_trait]
pub trait IngestionEngine: Send + Sync {
    async fn start(&self, config: &CrawlerConfig) -> Result<()>;
}

/// Runs the configured crawler program as a child process.
///
/// The full config is passed as JSON in `CRAWLER_CONFIG_JSON`, plus one
/// upper-cased variable per field. A non-zero exit is an error carrying the
/// exit status and the last lines of stderr.
pub struct CommandEngine {
    config: EngineConfig,
}

impl CommandEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl IngestionEngine for CommandEngine {
    async fn start(&self, crawl: &CrawlerConfig) -> Result<()> {
        let Some(program) = self.config.program.as_deref() else {
            bail!("no crawler program configured; set [engine].program");
        };

        let mut cmd = Command::new(program);
        cmd.args(&self.config.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.config.workdir {
            cmd.current_dir(dir);
        }
        cmd.env("CRAWLER_CONFIG_JSON", serde_json::to_string(crawl)?);
        for (key, value) in crawl.to_env()? {
            cmd.env(key, value);
        }

        info!(program, platform = ?crawl.platform, "launching crawler");
        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to launch crawler program '{}'", program))?;

        let mut tail: VecDeque<String> = VecDeque::new();
        if let Some(stderr) = child.stderr.take() {
            // Crawlers log in whatever encoding they like; decode lossily.
            let mut reader = BufReader::new(stderr);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                if reader.read_until(b'\n', &mut buf).await? == 0 {
                    break;
                }
                let line = String::from_utf8_lossy(&buf)
                    .trim_end_matches(['\r', '\n'])
                    .to_string();
                debug!(target: "crawler", "{}", line);
                if tail.len() == self.config.stderr_tail_lines {
                    tail.pop_front();
                }
                if self.config.stderr_tail_lines > 0 {
                    tail.push_back(line);
                }
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            let detail = tail.into_iter().collect::<Vec<_>>().join("\n");
            if detail.is_empty() {
                bail!("crawler exited with {}", status);
            }
            bail!("crawler exited with {}: {}", status, detail);
        }
        Ok(())
    }
}
