use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::debug;

use super::types::{CacheEntry, HubError};

const MANIFEST_FILE: &str = "manifest.json";

/// On-disk cache of checkpoint files plus a JSON manifest describing them
pub struct ModelCache {
    root: PathBuf,
}

impl ModelCache {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<model id with '/' as "--">/<revision>/<filename>`
    pub fn file_path(&self, model_id: &str, revision: &str, filename: &str) -> PathBuf {
        self.root
            .join(model_id.replace('/', "--"))
            .join(revision)
            .join(filename)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    /// All recorded entries, oldest first; a missing manifest is an empty cache
    pub fn entries(&self) -> Result<Vec<CacheEntry>, HubError> {
        let path = self.manifest_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path)?;
        let mut entries: Vec<CacheEntry> = serde_json::from_str(&content)
            .map_err(|e| HubError::Manifest(format!("{}: {}", path.display(), e)))?;
        entries.sort_by(|a, b| a.fetched_at.cmp(&b.fetched_at));
        Ok(entries)
    }

    /// Inserts or replaces the entry for the same model, revision and file
    pub fn record(&self, entry: CacheEntry) -> Result<(), HubError> {
        let mut entries = self.entries()?;
        entries.retain(|e| !e.same_file(&entry));
        entries.push(entry);
        self.write_entries(&entries)
    }

    /// Records a file already on disk unless the manifest knows it
    pub fn record_existing(&self, model_id: &str, revision: &str, filename: &str) -> Result<(), HubError> {
        let path = self.file_path(model_id, revision, filename);
        let entry = CacheEntry {
            model_id: model_id.to_string(),
            revision: revision.to_string(),
            filename: filename.to_string(),
            size_bytes: fs::metadata(&path)?.len(),
            fetched_at: Utc::now(),
        };
        if self.entries()?.iter().any(|e| e.same_file(&entry)) {
            return Ok(());
        }
        debug!("Adding untracked cache file {} to manifest", path.display());
        self.record(entry)
    }

    fn write_entries(&self, entries: &[CacheEntry]) -> Result<(), HubError> {
        fs::create_dir_all(&self.root)?;
        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| HubError::Manifest(e.to_string()))?;
        let tmp = self.root.join(format!("{}.tmp", MANIFEST_FILE));
        fs::write(&tmp, json)?;
        fs::rename(&tmp, self.manifest_path())?;
        Ok(())
    }
}
