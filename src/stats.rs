//! Database statistics overview.
//!
//! Summarizes what has been crawled: content, comment, and creator counts
//! per platform, and when each platform's content was last written. Used by
//! `crawlh stats`.

use crate::error::Result;
use crate::hub::Hub;

/// Query the store and print a summary.
pub async fn run_stats(hub: &Hub) -> Result<()> {
    let stats = hub.stats().await?;
    let db_path = &hub.config().db.path;

    let db_size = std::fs::metadata(db_path).map(|m| m.len()).unwrap_or(0);

    let total_contents: i64 = stats.platforms.iter().map(|p| p.counts.contents).sum();
    let total_comments: i64 = stats.platforms.iter().map(|p| p.counts.comments).sum();
    let total_creators: i64 = stats.platforms.iter().map(|p| p.counts.creators).sum();

    println!("Crawl Harness — Database Stats");
    println!("==============================");
    println!();
    println!("  Database:    {}", db_path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Contents:    {}", total_contents);
    println!("  Comments:    {}", total_comments);
    println!("  Creators:    {}", total_creators);

    println!();
    println!("  By platform:");
    println!(
        "  {:<10} {:>9} {:>9} {:>9}   {}",
        "PLATFORM", "CONTENTS", "COMMENTS", "CREATORS", "LAST WRITE"
    );
    println!("  {}", "-".repeat(60));

    for p in &stats.platforms {
        let last = match p.counts.last_modify_ts {
            Some(ts) => format_ts_relative(ts),
            None => "never".to_string(),
        };
        println!(
            "  {:<10} {:>9} {:>9} {:>9}   {}",
            p.platform.key(),
            p.counts.contents,
            p.counts.comments,
            p.counts.creators,
            last
        );
    }

    println!();
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a millisecond timestamp relative to now (e.g. "3 hours ago").
fn format_ts_relative(ts_millis: i64) -> String {
    let now = chrono::Utc::now().timestamp_millis();
    let delta = (now - ts_millis) / 1000;

    if delta < 0 {
        return format_ts_iso(ts_millis);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts_millis)
    }
}

fn format_ts_iso(ts_millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ts_millis)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts_millis.to_string())
}
