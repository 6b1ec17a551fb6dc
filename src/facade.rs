//! The two public entry points plus one procedure consumed by the
//! (external, out-of-scope) dependency-resolution collaborator: `GetVersions`,
//! `GetPackageDetails`, `DownloadPackage`, and the `lib`/`build`/`analyzers`
//! file enumerators (§6).

use crate::aggregator;
use crate::archive::default_layout;
use crate::downloader;
use crate::env::NuGetEnvironment;
use crate::error::NuGetError;
use crate::metadata::DependencyEntry;
use crate::package_name::PackageName;
use crate::resolver;
use crate::source::{Authentication, PackageSource};
use crate::version::SemVer;
use std::path::{Path, PathBuf};
use tracing::instrument;

/// The caller-facing projection of a resolved [`PackageMetadata`]
/// (§6 op 2): everything the dependency-resolution collaborator needs,
/// without exposing cache-internal fields like `cache_version`.
#[derive(Debug, Clone)]
pub struct PackageDetails {
    pub name: String,
    pub source: PackageSource,
    pub download_link: Option<String>,
    pub unlisted: bool,
    pub license_url: String,
    pub direct_dependencies: Vec<DependencyEntry>,
}

/// `GetVersions` (§6 op 1): every version of `name` available across
/// `sources`. Fails if the union across every source is empty.
#[instrument(skip(env, sources))]
pub async fn get_versions(
    env: &NuGetEnvironment,
    sources: &[PackageSource],
    name: &PackageName,
) -> Result<Vec<SemVer>, NuGetError> {
    aggregator::get_versions(env, sources, name).await
}

/// `GetPackageDetails` (§6 op 2): races every source for `(name, version)`
/// and returns the first success, cache and sticky-error semantics
/// included for remote sources (§4.5).
#[instrument(skip(env, sources))]
pub async fn get_package_details(
    env: &NuGetEnvironment,
    force: bool,
    sources: &[PackageSource],
    name: &PackageName,
    version: &SemVer,
) -> Result<PackageDetails, NuGetError> {
    let (source, metadata) = resolver::get_package_details(env, force, sources, name, version).await?;

    Ok(PackageDetails {
        name: metadata.package_name,
        source,
        download_link: metadata.download_location.as_remote().map(str::to_string),
        unlisted: metadata.unlisted,
        license_url: metadata.license_url,
        direct_dependencies: metadata.dependencies,
    })
}

/// `DownloadPackage` (§6 op 3): ensures the archive (and license) are
/// cached on disk and installed under `root`, returning the installed
/// target path.
#[instrument(skip(env, auth))]
#[allow(clippy::too_many_arguments)]
pub async fn download_package(
    env: &NuGetEnvironment,
    root: &Path,
    auth: Option<&Authentication>,
    url: &str,
    group: &str,
    name: &PackageName,
    version: &SemVer,
    include_version_in_path: bool,
    force: bool,
) -> Result<PathBuf, NuGetError> {
    downloader::download_package(
        env,
        root,
        auth,
        url,
        group,
        name,
        version,
        include_version_in_path,
        force,
    )
    .await
}

/// Where `DownloadPackage` would install `name`@`version` without actually
/// fetching anything — useful for callers checking install state.
pub fn installed_path(
    root: &Path,
    group: &str,
    name: &PackageName,
    version: &SemVer,
    include_version_in_path: bool,
) -> PathBuf {
    default_layout(root, group, name, version, include_version_in_path)
}

fn collect_files_recursive(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_files_recursive(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

/// Finds the immediate subdirectory of `folder` whose name matches
/// `target` case-insensitively, if any.
fn find_subdir_ci(folder: &Path, target: &str) -> Option<PathBuf> {
    std::fs::read_dir(folder).ok()?.filter_map(Result::ok).find_map(|entry| {
        let path = entry.path();
        if path.is_dir() && path.file_name()?.to_str()?.eq_ignore_ascii_case(target) {
            Some(path)
        } else {
            None
        }
    })
}

fn files_under(folder: &Path, subdir: &str) -> Vec<PathBuf> {
    let mut out = Vec::new();
    if let Some(dir) = find_subdir_ci(folder, subdir) {
        let _ = collect_files_recursive(&dir, &mut out);
    }
    out
}

/// `GetLibFiles` (§6 op 4): every file recursively under `folder/lib`.
pub fn get_lib_files(folder: &Path) -> Vec<PathBuf> {
    files_under(folder, "lib")
}

/// `GetTargetsFiles` (§6 op 4): every file recursively under `folder/build`.
pub fn get_targets_files(folder: &Path) -> Vec<PathBuf> {
    files_under(folder, "build")
}

/// `GetAnalyzerFiles` (§6 op 4): every file recursively under
/// `folder/analyzers`.
pub fn get_analyzer_files(folder: &Path) -> Vec<PathBuf> {
    files_under(folder, "analyzers")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_lib_files_case_insensitively() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("LIB/net45")).unwrap();
        std::fs::write(tmp.path().join("LIB/net45/Foo.dll"), b"x").unwrap();
        std::fs::create_dir_all(tmp.path().join("build")).unwrap();
        std::fs::write(tmp.path().join("build/Foo.targets"), b"x").unwrap();

        let lib = get_lib_files(tmp.path());
        assert_eq!(lib.len(), 1);
        assert!(lib[0].ends_with("Foo.dll"));

        let targets = get_targets_files(tmp.path());
        assert_eq!(targets.len(), 1);

        assert!(get_analyzer_files(tmp.path()).is_empty());
    }
}
