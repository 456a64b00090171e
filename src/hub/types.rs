use std::error::Error;
use std::fmt;

use chrono::{serde::ts_seconds, DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One resolved checkpoint file, as recorded in the cache manifest
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry {
    /// Hub identifier of the checkpoint
    pub model_id: String,
    /// Revision the file was resolved against
    pub revision: String,
    /// File name within the checkpoint
    pub filename: String,
    /// Size on disk in bytes
    pub size_bytes: u64,
    /// When the file entered the cache
    #[serde(with = "ts_seconds")]
    pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn same_file(&self, other: &CacheEntry) -> bool {
        self.model_id == other.model_id
            && self.revision == other.revision
            && self.filename == other.filename
    }
}

/// Custom error types for hub resolution
#[derive(Debug)]
pub enum HubError {
    /// Wraps std::io::Error for cache operations
    IoError(std::io::Error),
    /// Transport-level failure talking to the hub
    Request(reqwest::Error),
    /// Hub answered with a non-success status
    Http { status: u16, url: String },
    /// Hub has no such file for the checkpoint
    NotFound(String),
    /// Offline mode and the file is not in the cache
    NotCached { model_id: String, filename: String },
    /// Cache manifest could not be read or written
    Manifest(String),
}

impl fmt::Display for HubError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HubError::IoError(e) => write!(f, "I/O error: {}", e),
            HubError::Request(e) => write!(f, "Request to model hub failed: {}", e),
            HubError::Http { status, url } => write!(f, "Model hub returned HTTP {} for {}", status, url),
            HubError::NotFound(url) => write!(f, "File not found on model hub: {}", url),
            HubError::NotCached { model_id, filename } => write!(
                f, "{} for {} is not cached and offline mode is enabled", filename, model_id
            ),
            HubError::Manifest(msg) => write!(f, "Cache manifest error: {}", msg),
        }
    }
}

impl Error for HubError {}

impl From<std::io::Error> for HubError {
    fn from(err: std::io::Error) -> Self {
        HubError::IoError(err)
    }
}

impl From<reqwest::Error> for HubError {
    fn from(err: reqwest::Error) -> Self {
        HubError::Request(err)
    }
}
