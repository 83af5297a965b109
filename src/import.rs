//! Catalog import from item-data JSON dumps
//!
//! Each `*.json` file holds an array of items and becomes one collection,
//! named after the file. Importing a file syncs its collection: items in the
//! file are upserted, items that disappeared from it are deleted.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use rusqlite::Connection;
use serde_json::Value;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::db;
use crate::models::CraftDefinition;

/// Aggregated dumps that duplicate the per-category files
const SKIP_FILES: &[&str] = &["All.json", "i18n.json"];

/// Find the item-data JSON files directly inside a directory.
///
/// Subdirectories are not scanned: a nested file with the same stem would
/// sync the same collection and delete the other file's items.
pub fn find_json_files(data_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(data_dir)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "json") {
            continue;
        }
        let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if SKIP_FILES.contains(&filename) {
            debug!(file = %path.display(), "skipping aggregate file");
            continue;
        }
        files.push(path.to_path_buf());
    }

    Ok(files)
}

/// Collection name for a data file: lowercased stem, dashes to underscores
pub fn collection_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_lowercase()
        .replace('-', "_")
}

/// Items parsed out of one data file
#[derive(Debug, Default)]
struct ParsedFile {
    items: Vec<CraftDefinition>,
    skipped: usize,
}

fn parse_item_file(path: &Path) -> Result<ParsedFile> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    let Value::Array(entries) = value else {
        bail!("Expected a JSON array in {}", path.display());
    };

    let mut parsed = ParsedFile::default();
    for entry in entries {
        let has_id = entry
            .get("uniqueName")
            .and_then(Value::as_str)
            .is_some_and(|s| !s.is_empty());
        if !has_id {
            parsed.skipped += 1;
            continue;
        }

        match serde_json::from_value::<CraftDefinition>(entry) {
            Ok(item) => parsed.items.push(item),
            Err(e) => {
                debug!(file = %path.display(), error = %e, "skipping malformed item");
                parsed.skipped += 1;
            }
        }
    }

    Ok(parsed)
}

/// Sync every data file under `data_dir` into the catalog
pub fn import_to_database(conn: &mut Connection, data_dir: &Path, dry_run: bool) -> Result<ImportStats> {
    let mut stats = ImportStats::default();

    if !data_dir.is_dir() {
        bail!("Item data directory not found: {}", data_dir.display());
    }

    info!(dir = %data_dir.display(), "scanning for item data");
    let files = find_json_files(data_dir)?;
    info!(count = files.len(), "found item data files");

    for path in &files {
        let collection = collection_name(path);
        let parsed = match parse_item_file(path) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "failed to import file");
                stats.errors += 1;
                continue;
            }
        };

        let existing = db::collection_item_names(conn, &collection)?;
        let incoming: HashSet<&str> = parsed.items.iter().map(|i| i.unique_name.as_str()).collect();
        let stale: Vec<&String> = existing
            .iter()
            .filter(|name| !incoming.contains(name.as_str()))
            .collect();

        let inserted = incoming.iter().filter(|name| !existing.contains(**name)).count();
        let updated = incoming.len() - inserted;

        if !dry_run {
            let tx = conn.transaction()?;
            for item in &parsed.items {
                db::upsert_item(&tx, item, &collection)?;
            }
            for name in &stale {
                db::delete_item(&tx, name)?;
            }
            tx.commit()?;
        }

        info!(
            file = %path.display(),
            collection = %collection,
            inserted,
            updated,
            deleted = stale.len(),
            skipped = parsed.skipped,
            "imported collection"
        );

        stats.files += 1;
        stats.inserted += inserted;
        stats.updated += updated;
        stats.deleted += stale.len();
        stats.skipped += parsed.skipped;
    }

    Ok(stats)
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub files: usize,
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl std::fmt::Display for ImportStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Imported {} files ({} inserted, {} updated, {} deleted). Skipped: {}, Errors: {}",
            self.files, self.inserted, self.updated, self.deleted, self.skipped, self.errors
        )
    }
}
