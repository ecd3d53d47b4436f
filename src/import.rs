//! Import pipeline for crawler output files.
//!
//! Reads `.json` (an array of records, or a single record) and `.jsonl`
//! (one record per line) files, walking directories recursively, and feeds
//! every record through the platform store's upsert.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info};
use walkdir::WalkDir;

use crawl_harness_core::models::EntityKind;

use crate::error::{Error, Result};
use crate::hub::Hub;
use crate::store::UpsertOutcome;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub files: usize,
    pub records: usize,
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
}

/// Import everything under `path` and print a summary.
pub async fn run_import(hub: &Hub, platform: &str, kind: EntityKind, path: &Path) -> Result<()> {
    let summary = import_path(hub, platform, kind, path).await?;

    println!("import {} {}", platform, kind.as_str());
    println!("  files: {}", summary.files);
    println!("  records: {}", summary.records);
    println!("  inserted: {}", summary.inserted);
    println!("  updated: {}", summary.updated);
    println!("  skipped: {}", summary.skipped);
    println!("ok");
    Ok(())
}

pub async fn import_path(
    hub: &Hub,
    platform: &str,
    kind: EntityKind,
    path: &Path,
) -> Result<ImportSummary> {
    // Resolve the store up front so a bad platform fails before any I/O.
    hub.store(platform)?;

    let files = collect_files(path)?;
    let mut summary = ImportSummary::default();

    for file in &files {
        let records = read_records(file)?;
        debug!(file = %file.display(), records = records.len(), "importing file");
        summary.files += 1;
        for record in records {
            summary.records += 1;
            match hub.upsert(platform, kind, record).await? {
                UpsertOutcome::Inserted => summary.inserted += 1,
                UpsertOutcome::Updated => summary.updated += 1,
                UpsertOutcome::Skipped(_) => summary.skipped += 1,
            }
        }
    }

    info!(
        platform,
        kind = kind.as_str(),
        files = summary.files,
        inserted = summary.inserted,
        updated = summary.updated,
        skipped = summary.skipped,
        "import finished"
    );
    Ok(summary)
}

fn collect_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(Error::NotFound(format!("import path {}", path.display())));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        if entry.file_type().is_file() && is_record_file(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn is_record_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("json") | Some("jsonl")
    )
}

fn read_records(file: &Path) -> Result<Vec<Value>> {
    let content = std::fs::read_to_string(file)?;

    if file.extension().and_then(|e| e.to_str()) == Some("jsonl") {
        let mut records = Vec::new();
        for (i, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let value = serde_json::from_str(line).map_err(|e| {
                Error::Decode(format!("{}:{}: {}", file.display(), i + 1, e))
            })?;
            records.push(value);
        }
        return Ok(records);
    }

    let value: Value = serde_json::from_str(&content)
        .map_err(|e| Error::Decode(format!("{}: {}", file.display(), e)))?;
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(_) => Ok(vec![value]),
        other => Err(Error::Decode(format!(
            "{}: expected an array or object, found {}",
            file.display(),
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_read_jsonl_skips_blank_lines() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("notes.jsonl");
        fs::write(&file, "{\"note_id\":\"a\"}\n\n{\"note_id\":\"b\"}\n").unwrap();
        assert_eq!(read_records(&file).unwrap().len(), 2);
    }

    #[test]
    fn test_malformed_line_names_file_and_line() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("bad.jsonl");
        fs::write(&file, "{\"note_id\":\"a\"}\n{oops\n").unwrap();
        let err = read_records(&file).unwrap_err().to_string();
        assert!(err.contains("bad.jsonl:2"), "{}", err);
    }

    #[test]
    fn test_collect_files_filters_extensions() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("nested")).unwrap();
        fs::write(tmp.path().join("a.json"), "[]").unwrap();
        fs::write(tmp.path().join("nested/b.jsonl"), "").unwrap();
        fs::write(tmp.path().join("notes.csv"), "x").unwrap();
        let files = collect_files(tmp.path()).unwrap();
        assert_eq!(files.len(), 2);
    }
}
