use std::path::{Path, PathBuf};

use chrono::Utc;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{Client, Response, StatusCode};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::cache::ModelCache;
use super::types::{CacheEntry, HubError};
use crate::config::ModelConfig;

/// Resolves checkpoint files to local paths, downloading into the cache on a miss
pub struct HubClient {
    client: Client,
    endpoint: String,
    revision: String,
    offline: bool,
    cache: ModelCache,
}

impl HubClient {
    pub fn new(config: &ModelConfig) -> Result<Self, HubError> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            revision: config.revision.clone(),
            offline: config.offline,
            cache: ModelCache::new(config.cache_dir.clone()),
        })
    }

    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }

    /// Download URL for a file of a checkpoint
    pub fn file_url(&self, model_id: &str, filename: &str) -> String {
        format!("{}/{}/resolve/{}/{}", self.endpoint, model_id, self.revision, filename)
    }

    /// Returns a local path for `filename` of `model_id`.
    ///
    /// A `model_id` naming an existing directory is used as-is. Otherwise the
    /// cache is consulted first and the hub only on a miss.
    pub async fn resolve(&self, model_id: &str, filename: &str) -> Result<PathBuf, HubError> {
        let local_dir = Path::new(model_id);
        if local_dir.is_dir() {
            let path = local_dir.join(filename);
            if path.is_file() {
                debug!("Using local checkpoint file {}", path.display());
                return Ok(path);
            }
            return Err(HubError::NotFound(path.display().to_string()));
        }

        let target = self.cache.file_path(model_id, &self.revision, filename);
        if target.is_file() {
            debug!("Cache hit: {}", target.display());
            self.cache.record_existing(model_id, &self.revision, filename)?;
            return Ok(target);
        }

        if self.offline {
            return Err(HubError::NotCached {
                model_id: model_id.to_string(),
                filename: filename.to_string(),
            });
        }

        info!("Cache miss for {}/{}, downloading", model_id, filename);
        let size_bytes = self.download(&self.file_url(model_id, filename), &target).await?;

        self.cache.record(CacheEntry {
            model_id: model_id.to_string(),
            revision: self.revision.clone(),
            filename: filename.to_string(),
            size_bytes,
            fetched_at: Utc::now(),
        })?;

        Ok(target)
    }

    /// Like `resolve`, but a file the checkpoint does not have yields `None`
    pub async fn resolve_optional(&self, model_id: &str, filename: &str) -> Result<Option<PathBuf>, HubError> {
        match self.resolve(model_id, filename).await {
            Ok(path) => Ok(Some(path)),
            Err(HubError::NotFound(url)) => {
                warn!("Optional file not available: {}", url);
                Ok(None)
            }
            Err(HubError::NotCached { model_id, filename }) => {
                warn!("Optional file {} for {} not cached; continuing without it", filename, model_id);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Resolves several files in order, stopping at the first failure
    pub async fn resolve_all(&self, model_id: &str, filenames: &[&str]) -> Result<Vec<PathBuf>, HubError> {
        let mut paths = Vec::with_capacity(filenames.len());
        for filename in filenames {
            paths.push(self.resolve(model_id, filename).await?);
        }
        Ok(paths)
    }

    /// Streams `url` into `target` through a `.part` file; returns the byte count
    async fn download(&self, url: &str, target: &Path) -> Result<u64, HubError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(HubError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(HubError::Http { status: status.as_u16(), url: url.to_string() });
        }

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let part = target.with_extension(match target.extension() {
            Some(ext) => format!("{}.part", ext.to_string_lossy()),
            None => "part".to_string(),
        });

        let pb = match response.content_length() {
            Some(total) => {
                let pb = ProgressBar::new(total);
                if let Ok(style) = ProgressStyle::default_bar()
                    .template("{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                {
                    pb.set_style(style.progress_chars("=> "));
                }
                pb
            }
            None => ProgressBar::new_spinner(),
        };
        pb.set_message(
            target.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default()
        );

        let mut file = tokio::fs::File::create(&part).await?;
        let streamed = stream_to_file(response, &mut file, &pb).await;
        drop(file);
        let written = match streamed {
            Ok(written) => written,
            Err(e) => {
                let _ = tokio::fs::remove_file(&part).await;
                pb.abandon_with_message("download failed");
                return Err(e);
            }
        };

        tokio::fs::rename(&part, target).await?;
        pb.finish_and_clear();
        info!("Downloaded {} ({} bytes)", target.display(), written);

        Ok(written)
    }
}

/// Copies the response body into `file`, advancing `pb`
async fn stream_to_file(
    response: Response,
    file: &mut tokio::fs::File,
    pb: &ProgressBar,
) -> Result<u64, HubError> {
    let mut written = 0u64;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
        pb.set_position(written);
    }
    file.flush().await?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    fn model_config(cache_dir: PathBuf, offline: bool) -> ModelConfig {
        ModelConfig {
            id: "bert-base-cased".to_string(),
            revision: "main".to_string(),
            endpoint: "http://127.0.0.1:9/".to_string(),
            cache_dir,
            offline,
        }
    }

    /// Answers every request on a local port with the same raw HTTP response
    async fn serve(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => request.extend_from_slice(&buf[..n]),
                        }
                    }
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        format!("http://{}", addr)
    }

    fn hub_at(endpoint: String, cache_dir: PathBuf) -> HubClient {
        let config = ModelConfig { endpoint, ..model_config(cache_dir, false) };
        HubClient::new(&config).unwrap()
    }

    #[test]
    fn test_file_url() {
        let hub = HubClient::new(&model_config(PathBuf::from("/tmp/unused"), true)).unwrap();
        assert_eq!(
            hub.file_url("bert-base-cased", "vocab.txt"),
            "http://127.0.0.1:9/bert-base-cased/resolve/main/vocab.txt"
        );
    }

    #[tokio::test]
    async fn test_cache_hit_skips_network() {
        let tmp = tempfile::tempdir().unwrap();
        let hub = HubClient::new(&model_config(tmp.path().to_path_buf(), false)).unwrap();
        let path = hub.cache().file_path("bert-base-cased", "main", "config.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{}").unwrap();

        let resolved = hub.resolve("bert-base-cased", "config.json").await.unwrap();
        assert_eq!(resolved, path);
        let entries = hub.cache().entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].size_bytes, 2);
    }

    #[tokio::test]
    async fn test_offline_miss() {
        let tmp = tempfile::tempdir().unwrap();
        let hub = HubClient::new(&model_config(tmp.path().to_path_buf(), true)).unwrap();
        let err = hub.resolve("bert-base-cased", "vocab.txt").await.unwrap_err();
        assert!(matches!(err, HubError::NotCached { .. }));

        let optional = hub.resolve_optional("bert-base-cased", "tokenizer_config.json").await.unwrap();
        assert!(optional.is_none());
    }

    #[tokio::test]
    async fn test_local_directory_checkpoint() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("vocab.txt"), "[PAD]\n").unwrap();
        let hub = HubClient::new(&model_config(tmp.path().join("cache"), true)).unwrap();
        let model_id = tmp.path().to_string_lossy().to_string();

        let resolved = hub.resolve(&model_id, "vocab.txt").await.unwrap();
        assert_eq!(resolved, tmp.path().join("vocab.txt"));
        assert!(matches!(
            hub.resolve(&model_id, "config.json").await,
            Err(HubError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_hub() {
        let tmp = tempfile::tempdir().unwrap();
        let hub = HubClient::new(&model_config(tmp.path().to_path_buf(), false)).unwrap();
        let err = hub.resolve("bert-base-cased", "vocab.txt").await.unwrap_err();
        assert!(matches!(err, HubError::Request(_)));
        assert!(!hub.cache().file_path("bert-base-cased", "main", "vocab.txt").exists());
    }

    #[tokio::test]
    async fn test_download_into_cache() {
        let endpoint = serve(
            "HTTP/1.1 200 OK\r\nContent-Length: 11\r\nConnection: close\r\n\r\n[PAD]\n[UNK]"
        ).await;
        let tmp = tempfile::tempdir().unwrap();
        let hub = hub_at(endpoint, tmp.path().to_path_buf());

        let resolved = hub.resolve("bert-base-cased", "vocab.txt").await.unwrap();
        assert_eq!(resolved, hub.cache().file_path("bert-base-cased", "main", "vocab.txt"));
        assert_eq!(fs::read_to_string(&resolved).unwrap(), "[PAD]\n[UNK]");
        assert!(!resolved.with_extension("txt.part").exists());

        let entries = hub.cache().entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].model_id, "bert-base-cased");
        assert_eq!(entries[0].revision, "main");
        assert_eq!(entries[0].filename, "vocab.txt");
        assert_eq!(entries[0].size_bytes, 11);
    }

    #[tokio::test]
    async fn test_download_missing_file() {
        let endpoint = serve(
            "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
        ).await;
        let tmp = tempfile::tempdir().unwrap();
        let hub = hub_at(endpoint, tmp.path().to_path_buf());

        let err = hub.resolve("bert-base-cased", "tokenizer_config.json").await.unwrap_err();
        assert!(matches!(err, HubError::NotFound(url) if url.ends_with("/resolve/main/tokenizer_config.json")));
        let optional = hub.resolve_optional("bert-base-cased", "tokenizer_config.json").await.unwrap();
        assert!(optional.is_none());
        assert!(hub.cache().entries().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_download_server_error() {
        let endpoint = serve(
            "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
        ).await;
        let tmp = tempfile::tempdir().unwrap();
        let hub = hub_at(endpoint, tmp.path().to_path_buf());

        let err = hub.resolve("bert-base-cased", "vocab.txt").await.unwrap_err();
        assert!(matches!(err, HubError::Http { status: 500, .. }));
        assert!(!hub.cache().file_path("bert-base-cased", "main", "vocab.txt").exists());
    }

    #[tokio::test]
    async fn test_interrupted_download_leaves_no_part_file() {
        let endpoint = serve(
            "HTTP/1.1 200 OK\r\nContent-Length: 100\r\nConnection: close\r\n\r\n[PAD]"
        ).await;
        let tmp = tempfile::tempdir().unwrap();
        let hub = hub_at(endpoint, tmp.path().to_path_buf());

        let err = hub.resolve("bert-base-cased", "vocab.txt").await.unwrap_err();
        assert!(matches!(err, HubError::Request(_)));
        let target = hub.cache().file_path("bert-base-cased", "main", "vocab.txt");
        assert!(!target.exists());
        assert!(!target.with_extension("txt.part").exists());
        assert!(hub.cache().entries().unwrap().is_empty());
    }
}
