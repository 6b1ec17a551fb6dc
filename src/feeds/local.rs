//! Local filesystem feed adapter: a directory of `.nupkg` files addressed
//! by filename convention rather than a network protocol (§4.1).

use crate::error::FeedError;
use crate::metadata::{DownloadLocation, PackageMetadata, CURRENT_CACHE_VERSION};
use crate::nuspec::parse_nuspec;
use crate::package_name::PackageName;
use crate::version::SemVer;
use std::io::Read;
use std::path::{Path, PathBuf};

fn walk_nupkgs(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            walk_nupkgs(&path, out)?;
        } else if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("nupkg"))
        {
            out.push(path);
        }
    }
    Ok(())
}

/// Returns the version segment of `filename` if it matches
/// `^{name}\.(\d.*)\.nupkg$` case-insensitively, preserving the original
/// casing of the captured segment.
fn matching_version(filename: &str, name_lower: &str) -> Option<String> {
    if filename.len() < 6 {
        return None;
    }
    let lower = filename.to_ascii_lowercase();
    if !lower.ends_with(".nupkg") {
        return None;
    }
    let stem_len = filename.len() - 6;
    let prefix = format!("{name_lower}.");
    if !lower[..stem_len].starts_with(&prefix) {
        return None;
    }
    let version = &filename[prefix.len()..stem_len];
    version.chars().next().filter(|c| c.is_ascii_digit())?;
    Some(version.to_string())
}

pub async fn list_versions(dir: PathBuf, name: PackageName) -> Result<Option<Vec<SemVer>>, FeedError> {
    if !dir.is_dir() {
        return Err(FeedError::MissingDirectory(dir));
    }

    let name_lower = name.normalized().to_string();
    let found = tokio::task::spawn_blocking(move || -> std::io::Result<Vec<String>> {
        let mut files = Vec::new();
        walk_nupkgs(&dir, &mut files)?;
        Ok(files
            .iter()
            .filter_map(|p| p.file_name()?.to_str())
            .filter_map(|filename| matching_version(filename, &name_lower))
            .collect())
    })
    .await
    .map_err(|e| FeedError::Io(std::io::Error::other(e)))??;

    Ok(Some(
        found.iter().filter_map(|v| SemVer::parse(v).ok()).collect(),
    ))
}

fn find_archive(dir: &Path, name: &PackageName, version: &SemVer) -> Option<PathBuf> {
    let exact_raw = dir.join(format!("{}.{}.nupkg", name.as_str(), version.to_string_original()));
    if exact_raw.is_file() {
        return Some(exact_raw);
    }

    let exact_normalized = dir.join(format!("{}.{}.nupkg", name.as_str(), version.normalize()));
    if exact_normalized.is_file() {
        return Some(exact_normalized);
    }

    let mut candidates = Vec::new();
    walk_nupkgs(dir, &mut candidates).ok()?;
    let name_lower = name.normalized();
    let raw = version.to_string_original().to_ascii_lowercase();
    let normalized = version.normalize().to_ascii_lowercase();

    candidates.into_iter().find(|path| {
        let Some(filename) = path.file_name().and_then(|f| f.to_str()) else {
            return false;
        };
        let lower = filename.to_ascii_lowercase();
        lower.contains(name_lower) && (lower.contains(&raw) || lower.contains(&normalized))
    })
}

fn read_nuspec_from_archive(path: &Path) -> Result<String, FeedError> {
    let file = std::fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| FeedError::Protocol { url: path.display().to_string(), reason: e.to_string() })?;

    let nuspec_index = (0..archive.len())
        .find(|i| {
            archive
                .by_index(*i)
                .ok()
                .is_some_and(|f| f.name().to_ascii_lowercase().ends_with(".nuspec"))
        })
        .ok_or_else(|| FeedError::Protocol {
            url: path.display().to_string(),
            reason: "archive has no .nuspec manifest".to_string(),
        })?;

    let mut entry = archive
        .by_index(nuspec_index)
        .map_err(|e| FeedError::Protocol { url: path.display().to_string(), reason: e.to_string() })?;
    let mut contents = String::new();
    entry
        .read_to_string(&mut contents)
        .map_err(|e| FeedError::Protocol { url: path.display().to_string(), reason: e.to_string() })?;
    Ok(contents)
}

pub async fn fetch_metadata(
    dir: PathBuf,
    name: PackageName,
    version: SemVer,
) -> Result<PackageMetadata, FeedError> {
    let path = tokio::task::spawn_blocking({
        let dir = dir.clone();
        let name = name.clone();
        let version = version.clone();
        move || find_archive(&dir, &name, &version)
    })
    .await
    .map_err(|e| FeedError::Io(std::io::Error::other(e)))?
    .ok_or_else(|| FeedError::NotFound {
        url: dir.display().to_string(),
        name: name.as_str().to_string(),
        version: version.to_string_original().to_string(),
    })?;

    let manifest = {
        let path = path.clone();
        tokio::task::spawn_blocking(move || -> Result<_, FeedError> {
            let xml = read_nuspec_from_archive(&path)?;
            parse_nuspec(&xml).map_err(|reason| FeedError::Protocol {
                url: path.display().to_string(),
                reason,
            })
        })
        .await
        .map_err(|e| FeedError::Io(std::io::Error::other(e)))??
    };

    Ok(PackageMetadata {
        package_name: manifest.id,
        source_url: dir.display().to_string(),
        download_location: DownloadLocation::Local(path),
        license_url: manifest.license_url,
        unlisted: false,
        dependencies: manifest.dependencies,
        cache_version: CURRENT_CACHE_VERSION.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_simple_version_suffix() {
        assert_eq!(
            matching_version("Foo.Bar.1.0.0.nupkg", "foo.bar"),
            Some("1.0.0".to_string())
        );
    }

    #[test]
    fn matches_prerelease_version_suffix() {
        assert_eq!(
            matching_version("Foo.Bar.1.0.0-beta.nupkg", "foo.bar"),
            Some("1.0.0-beta".to_string())
        );
    }

    #[test]
    fn rejects_unrelated_package_prefix() {
        assert_eq!(matching_version("Other.Pkg.1.0.0.nupkg", "foo.bar"), None);
    }

    #[tokio::test]
    async fn missing_directory_is_fatal() {
        let result = list_versions(
            PathBuf::from("/nonexistent/does-not-exist-12345"),
            PackageName::new("Foo.Bar"),
        )
        .await;
        assert!(matches!(result, Err(FeedError::MissingDirectory(_))));
    }

    #[tokio::test]
    async fn lists_versions_from_directory_contents() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("Foo.Bar.1.0.0.nupkg"), b"").unwrap();
        std::fs::write(tmp.path().join("Foo.Bar.1.0.1.nupkg"), b"").unwrap();
        std::fs::write(tmp.path().join("Unrelated.2.0.0.nupkg"), b"").unwrap();

        let versions = list_versions(tmp.path().to_path_buf(), PackageName::new("Foo.Bar"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(versions.len(), 2);
    }
}
