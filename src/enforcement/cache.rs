//! Static resource edge cache.
//!
//! Cached objects live at `<root>/<app id><request path>`. Writes happen on a
//! detached blocking task and never affect the client response.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use axum::body::Bytes;
use flate2::read::GzDecoder;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::config::schema::CacheConfig;
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("path '{0}' cannot be cached")]
    NotCacheable(String),

    #[error("gzip decompression failed: {0}")]
    Decompress(std::io::Error),

    #[error("decompressed object exceeds {0} bytes")]
    TooLarge(u64),

    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One object to write.
#[derive(Debug, Clone)]
pub struct CacheObject {
    pub path: PathBuf,
    pub body: Bytes,
    pub gzip: bool,
    pub last_modified: Option<SystemTime>,
    /// Upper bound on the bytes written, after decompression.
    pub max_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct StaticCache {
    enabled: bool,
    root: PathBuf,
    max_object_bytes: u64,
}

impl StaticCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            enabled: config.enabled,
            root: PathBuf::from(&config.root),
            max_object_bytes: config.max_object_bytes,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn max_object_bytes(&self) -> u64 {
        self.max_object_bytes
    }

    /// File path for a request path. Rejects traversal segments and paths
    /// without a file name.
    pub fn cache_path(&self, app_id: i64, request_path: &str) -> Result<PathBuf, CacheError> {
        let not_cacheable = || CacheError::NotCacheable(request_path.to_string());
        if !request_path.starts_with('/') || request_path.ends_with('/') {
            return Err(not_cacheable());
        }

        let mut path = self.root.join(app_id.to_string());
        for segment in request_path.split('/').filter(|s| !s.is_empty()) {
            if segment == "." || segment == ".." || segment.contains('\\') || segment.contains('\0') {
                return Err(not_cacheable());
            }
            path.push(segment);
        }
        if path.file_name().is_none() {
            return Err(not_cacheable());
        }
        Ok(path)
    }

    /// Write an object on the blocking pool. Failures are logged and
    /// swallowed.
    pub fn spawn_store(&self, object: CacheObject) -> JoinHandle<()> {
        tokio::task::spawn_blocking(move || match store_object(&object) {
            Ok(()) => {
                metrics::record_cache_write("stored");
                tracing::debug!(path = ?object.path, bytes = object.body.len(), "Static object cached");
            }
            Err(e) => {
                metrics::record_cache_write("failed");
                tracing::warn!(path = ?object.path, error = %e, "Static cache write failed");
            }
        })
    }
}

/// Create directories, gunzip if needed, write, then apply `Last-Modified`.
/// Nothing is written when the content exceeds `max_bytes`.
pub fn store_object(object: &CacheObject) -> Result<(), CacheError> {
    let content = if object.gzip {
        let mut decoded = Vec::with_capacity(object.body.len() * 2);
        GzDecoder::new(object.body.as_ref())
            .take(object.max_bytes.saturating_add(1))
            .read_to_end(&mut decoded)
            .map_err(CacheError::Decompress)?;
        decoded
    } else {
        object.body.to_vec()
    };
    if content.len() as u64 > object.max_bytes {
        return Err(CacheError::TooLarge(object.max_bytes));
    }

    if let Some(parent) = object.path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&object.path, &content)?;

    if let Some(modified) = object.last_modified {
        if let Err(e) = set_mtime(&object.path, modified) {
            tracing::debug!(path = ?object.path, error = %e, "Could not apply Last-Modified to cache file");
        }
    }
    Ok(())
}

fn set_mtime(path: &Path, modified: SystemTime) -> std::io::Result<()> {
    fs::File::options().write(true).open(path)?.set_modified(modified)
}

/// Parse an HTTP date (`Wed, 21 Oct 2015 07:28:00 GMT`).
pub fn parse_http_date(value: &str) -> Option<SystemTime> {
    chrono::DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(SystemTime::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use std::time::{Duration, UNIX_EPOCH};

    fn cache(root: &Path) -> StaticCache {
        StaticCache::new(&CacheConfig {
            enabled: true,
            root: root.to_string_lossy().into_owned(),
            max_object_bytes: 1024,
        })
    }

    #[test]
    fn test_cache_path() {
        let cache = cache(Path::new("/srv/cache"));
        assert_eq!(
            cache.cache_path(7, "/assets/app.js").unwrap(),
            PathBuf::from("/srv/cache/7/assets/app.js")
        );
        assert!(cache.cache_path(7, "/assets/../../etc/passwd").is_err());
        assert!(cache.cache_path(7, "/assets/").is_err());
        assert!(cache.cache_path(7, "/").is_err());
    }

    #[test]
    fn test_gzip_is_stored_decompressed_with_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"body { color: red; }").unwrap();
        let compressed = encoder.finish().unwrap();

        let path = dir.path().join("3/site.css");
        let modified = parse_http_date("Wed, 21 Oct 2015 07:28:00 GMT").unwrap();
        store_object(&CacheObject {
            path: path.clone(),
            body: Bytes::from(compressed),
            gzip: true,
            last_modified: Some(modified),
            max_bytes: 1024,
        })
        .unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"body { color: red; }");
        let mtime = fs::metadata(&path).unwrap().modified().unwrap();
        assert_eq!(mtime.duration_since(UNIX_EPOCH).unwrap(), Duration::from_secs(1_445_412_480));
    }

    #[test]
    fn test_corrupt_gzip_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("3/broken.js");
        let result = store_object(&CacheObject {
            path: path.clone(),
            body: Bytes::from_static(b"not gzip at all"),
            gzip: true,
            last_modified: None,
            max_bytes: 1024,
        });
        assert!(matches!(result, Err(CacheError::Decompress(_))));
        assert!(!path.exists());
    }

    #[test]
    fn test_gzip_expanding_past_limit_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(&vec![0u8; 4 * 1024 * 1024]).unwrap();
        let compressed = encoder.finish().unwrap();
        assert!(compressed.len() < 64 * 1024);

        let path = dir.path().join("3/zeros.js");
        let result = store_object(&CacheObject {
            path: path.clone(),
            body: Bytes::from(compressed),
            gzip: true,
            last_modified: None,
            max_bytes: 1024 * 1024,
        });
        assert!(matches!(result, Err(CacheError::TooLarge(1_048_576))));
        assert!(!path.exists());
    }

    #[test]
    fn test_object_at_limit_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("3/exact.css");
        store_object(&CacheObject {
            path: path.clone(),
            body: Bytes::from_static(b"0123456789"),
            gzip: false,
            last_modified: None,
            max_bytes: 10,
        })
        .unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"0123456789");
    }

    #[test]
    fn test_parse_http_date() {
        assert!(parse_http_date("garbage").is_none());
        assert!(parse_http_date("Sun, 06 Nov 1994 08:49:37 GMT").is_some());
    }
}
