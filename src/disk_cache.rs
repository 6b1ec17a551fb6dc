//! JSON metadata cache on disk, keyed by `(name, normalized-version,
//! hash(normalized-url))`, with schema-version invalidation and sticky
//! `.failed` markers (§4.5, §6, §8).

use crate::error::CacheError;
use crate::metadata::PackageMetadata;
use std::path::{Path, PathBuf};
use xxhash_rust::xxh3::xxh3_64;

/// Normalizes a feed URL so that scheme/host variants that are
/// operationally identical (`https://www.x/` vs `http://x/`) share a cache
/// key (§3 invariants).
pub fn normalize_url(url: &str) -> String {
    let without_scheme = url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(url);
    let host_and_rest = without_scheme.trim_start_matches("www.");
    format!("http://{}", host_and_rest.to_ascii_lowercase())
}

fn url_hash(url: &str) -> u64 {
    xxh3_64(normalize_url(url).as_bytes())
}

/// Base filename stem shared by the metadata cache file, its `.failed`
/// marker, the archive and the license file (§6 Disk layout).
pub fn cache_stem(cache_dir: &Path, name: &str, normalized_version: &str, feed_url: &str) -> PathBuf {
    cache_dir.join(format!(
        "{name}.{normalized_version}.s{}",
        url_hash(feed_url)
    ))
}

pub fn metadata_path(cache_dir: &Path, name: &str, normalized_version: &str, feed_url: &str) -> PathBuf {
    let mut path = cache_stem(cache_dir, name, normalized_version, feed_url);
    path.set_extension("json");
    path
}

pub fn error_marker_path(cache_dir: &Path, name: &str, normalized_version: &str, feed_url: &str) -> PathBuf {
    let mut path = metadata_path(cache_dir, name, normalized_version, feed_url);
    let mut file_name = path.file_name().unwrap().to_os_string();
    file_name.push(".failed");
    path.set_file_name(file_name);
    path
}

pub fn archive_path(cache_dir: &Path, name: &str, normalized_version: &str) -> PathBuf {
    cache_dir.join(format!("{name}.{normalized_version}.nupkg"))
}

pub fn license_path(cache_dir: &Path, name: &str, normalized_version: &str) -> PathBuf {
    cache_dir.join(format!("{name}.{normalized_version}.license.html"))
}

/// `true` if a sticky `.failed` marker blocks a refetch right now.
pub async fn is_sticky_failed(marker: &Path) -> bool {
    tokio::fs::try_exists(marker).await.unwrap_or(false)
}

/// Writes the failure diagnostic to the `.failed` marker. Best-effort: a
/// write failure here is logged, never propagated (§4.5 step 5).
pub async fn mark_failed(marker: &Path, diagnostic: &str) {
    if let Some(parent) = marker.parent() {
        let _ = tokio::fs::create_dir_all(parent).await;
    }
    if let Err(e) = tokio::fs::write(marker, diagnostic).await {
        tracing::warn!("failed to write sticky error marker {}: {e}", marker.display());
    }
}

/// Deletes the `.failed` marker if present. Absence is not an error.
pub async fn clear_sticky(marker: &Path) {
    match tokio::fs::remove_file(marker).await {
        Ok(()) | Err(_) => {}
    }
}

/// Loads cached metadata, returning `None` if the file is absent, unreadable,
/// malformed, or stamped with a stale schema version (§3 invariants, §8
/// scenario 2). Every failure mode here is soft: the caller falls through to
/// a refetch rather than propagating a `CacheError`.
pub async fn load(path: &Path) -> Option<PackageMetadata> {
    let bytes = tokio::fs::read(path).await.ok()?;
    let metadata: PackageMetadata = serde_json::from_slice(&bytes).ok()?;
    if !metadata.is_current_schema() {
        return None;
    }
    Some(metadata)
}

/// Writes freshly fetched metadata to `path`. Failures are swallowed: the
/// cache is a best-effort accelerator, not a source of truth (§4.5 step 4,
/// §7 CacheError).
pub async fn store(path: &Path, metadata: &PackageMetadata) {
    if let Err(e) = store_fallible(path, metadata).await {
        tracing::warn!("cache write failed (continuing without it): {e}");
    }
}

async fn store_fallible(path: &Path, metadata: &PackageMetadata) -> Result<(), CacheError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| CacheError::Write { path: path.to_path_buf(), source })?;
    }
    let json = serde_json::to_vec_pretty(metadata).map_err(|source| CacheError::Deserialize {
        path: path.to_path_buf(),
        source,
    })?;
    tokio::fs::write(path, json)
        .await
        .map_err(|source| CacheError::Write { path: path.to_path_buf(), source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_normalization_strips_scheme_and_www() {
        assert_eq!(normalize_url("https://www.example.test/feed"), normalize_url("http://example.test/feed"));
    }

    #[test]
    fn url_normalization_is_case_insensitive_on_host() {
        assert_eq!(normalize_url("https://Example.Test/feed"), normalize_url("http://example.test/feed"));
    }

    #[test]
    fn equivalent_urls_share_a_cache_key_suffix() {
        let a = metadata_path(Path::new("/cache"), "Foo", "1.0.0", "https://www.example.test/feed");
        let b = metadata_path(Path::new("/cache"), "Foo", "1.0.0", "http://example.test/feed");
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn stale_schema_version_is_treated_as_absent() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("stale.json");
        let mut stale = serde_json::json!({
            "package_name": "Foo",
            "source_url": "https://example.test",
            "download_location": {"Remote": "https://example.test/foo.1.0.0.nupkg"},
            "license_url": "",
            "unlisted": false,
            "dependencies": [],
            "cache_version": "1.0",
        });
        stale["cache_version"] = serde_json::json!("1.0");
        tokio::fs::write(&path, serde_json::to_vec(&stale).unwrap()).await.unwrap();

        assert!(load(&path).await.is_none());
    }

    #[tokio::test]
    async fn sticky_marker_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let marker = tmp.path().join("pkg.1.0.0.s1.json.failed");

        assert!(!is_sticky_failed(&marker).await);
        mark_failed(&marker, "boom").await;
        assert!(is_sticky_failed(&marker).await);
        clear_sticky(&marker).await;
        assert!(!is_sticky_failed(&marker).await);
    }
}
