//! Archive Handler (§4.7): installs a cached `.nupkg` into a per-package
//! target directory — `CopyFromCache` plus the `ExtractPackage` extraction,
//! archive-timestamp repair and post-extraction URL-decoding it delegates to.

use crate::env::NuGetEnvironment;
use crate::error::{ExtractError, NuGetError};
use crate::package_name::PackageName;
use crate::scoped_path::scoped_join;
use crate::version::SemVer;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{instrument, warn};

/// Leading bytes of a corrupt archive worth echoing back in an error —
/// enough to recognize an HTML error page masquerading as a package
/// (§4.7: "include up to the first N bytes of the archive as text").
const SNIPPET_BYTES: usize = 512;

/// The default per-package install directory policy (§4.7's `layoutFn`
/// collaborator). `root/group/name[.version]`, mirroring the layout the
/// teacher's own installer builds under `node_modules` — but keyed by
/// package identity rather than a fixed `node_modules` root, and grouped by
/// an arbitrary caller-supplied tag instead of a package-manager scope.
pub fn default_layout(
    root: &Path,
    group: &str,
    name: &PackageName,
    version: &SemVer,
    include_version_in_path: bool,
) -> PathBuf {
    let mut dir_name = name.as_str().to_string();
    if include_version_in_path {
        dir_name.push('.');
        dir_name.push_str(&version.normalize());
    }

    let mut path = root.to_path_buf();
    if !group.is_empty() {
        path.push(group);
    }
    path.push(dir_name);
    path
}

fn snippet(path: &Path) -> String {
    fs::File::open(path)
        .and_then(|mut f| {
            let mut buf = vec![0u8; SNIPPET_BYTES];
            let n = f.read(&mut buf)?;
            buf.truncate(n);
            Ok(buf)
        })
        .map(|buf| String::from_utf8_lossy(&buf).into_owned())
        .unwrap_or_default()
}

/// Depth-first walk of `dir`: any entry whose name URL-decodes to something
/// different is renamed to the decoded form (§4.7 step 5, §8 scenario 6).
/// Directories are renamed on the way back up so children are visited under
/// their still-encoded parent name.
fn decode_entry_names(dir: &Path) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            decode_entry_names(&path)?;
        }

        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let decoded = urlencoding::decode(file_name)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| file_name.to_string());

        if decoded != file_name {
            let target = path.with_file_name(&decoded);
            if !target.exists() {
                fs::rename(&path, &target)?;
            }
        }
    }
    Ok(())
}

/// `true` if `dir` contains anything other than `archive_file_name` —
/// i.e. a previous extraction already happened (§4.7 step 1, idempotence
/// property in §8).
fn already_extracted(dir: &Path, archive_file_name: &std::ffi::OsStr) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };
    entries
        .filter_map(Result::ok)
        .any(|e| e.file_name() != archive_file_name)
}

/// Extracts every entry of `archive` into `target_folder`, repairing invalid
/// zip timestamps when `repair_timestamps` is set (§4.7 step 3, the
/// runtime-probe capability flag from §9), then renaming URL-encoded entry
/// names back to their literal form.
fn extract_sync(
    archive_path: &Path,
    target_folder: &Path,
    repair_timestamps: bool,
) -> Result<(), ExtractError> {
    let file = fs::File::open(archive_path)?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| {
        if matches!(e, zip::result::ZipError::InvalidArchive(_)) {
            ExtractError::Invalid { snippet: snippet(archive_path) }
        } else {
            ExtractError::BadArchive(e)
        }
    })?;

    fs::create_dir_all(target_folder)?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let Some(enclosed) = entry.enclosed_name() else {
            return Err(ExtractError::UnsafePath(entry.name().to_string()));
        };

        let dest = scoped_join(target_folder, &enclosed)
            .map_err(|_| ExtractError::UnsafePath(enclosed.display().to_string()))?;

        if entry.is_dir() {
            fs::create_dir_all(&dest)?;
            continue;
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut out = fs::File::create(&dest)?;
        std::io::copy(&mut entry, &mut out)?;
        drop(out);

        // Some runtimes (§9) write zip entries with timestamps outside what
        // the local filesystem's mtime setter accepts (pre-1980 DOS epoch
        // and the like). Extraction always leaves the file at its natural
        // creation time already; the repair flag exists only to make that
        // choice explicit and stamp it even on platforms where a file's
        // initial mtime might otherwise reflect something else entirely.
        if repair_timestamps {
            if let Ok(out) = fs::File::open(&dest) {
                let _ = out.set_modified(SystemTime::now());
            }
        }
    }

    decode_entry_names(target_folder)?;
    Ok(())
}

/// `ExtractPackage` (§4.7): a no-op if `target_folder` already holds
/// extracted content, otherwise unpacks `archive_path` into it.
#[instrument(skip(env))]
pub async fn extract_package(
    env: &NuGetEnvironment,
    archive_path: &Path,
    target_folder: &Path,
) -> Result<(), ExtractError> {
    let archive_name = archive_path.file_name().unwrap_or_default().to_os_string();

    if target_folder.is_dir() && already_extracted(target_folder, &archive_name) {
        return Ok(());
    }

    let archive_path = archive_path.to_path_buf();
    let target_folder = target_folder.to_path_buf();
    let repair_timestamps = env.archive_timestamp_bug;

    tokio::task::spawn_blocking(move || extract_sync(&archive_path, &target_folder, repair_timestamps))
        .await
        .map_err(|e| ExtractError::Io(std::io::Error::other(e)))?
}

async fn cleanup_target(target_folder: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(target_folder).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("failed to clean up {} after extraction failure: {e}", target_folder.display());
        }
    }
}

/// `CopyFromCache` (§4.7): installs the cached archive (and its license, if
/// any) into the per-package target directory, cleaning up on failure.
#[instrument(skip(env))]
#[allow(clippy::too_many_arguments)]
pub async fn copy_from_cache(
    env: &NuGetEnvironment,
    root: &Path,
    group: &str,
    cache_file: &Path,
    license_cache_file: &Path,
    name: &PackageName,
    version: &SemVer,
    include_version_in_path: bool,
    force: bool,
) -> Result<PathBuf, NuGetError> {
    let target_folder = default_layout(root, group, name, version, include_version_in_path);
    let archive_name = cache_file.file_name().unwrap_or_default();
    let archive_in_target = target_folder.join(archive_name);

    match copy_and_extract(
        env,
        &target_folder,
        &archive_in_target,
        cache_file,
        license_cache_file,
        force,
    )
    .await
    {
        Ok(()) => Ok(target_folder),
        Err(e) => {
            let _ = tokio::fs::remove_file(&archive_in_target).await;
            cleanup_target(&target_folder).await;
            Err(e)
        }
    }
}

async fn copy_and_extract(
    env: &NuGetEnvironment,
    target_folder: &Path,
    archive_in_target: &Path,
    cache_file: &Path,
    license_cache_file: &Path,
    force: bool,
) -> Result<(), NuGetError> {
    let already_copied = !force && tokio::fs::try_exists(archive_in_target).await.unwrap_or(false);

    if !already_copied {
        if tokio::fs::try_exists(target_folder).await.unwrap_or(false) {
            tokio::fs::remove_dir_all(target_folder).await.map_err(ExtractError::Io)?;
        }
        tokio::fs::create_dir_all(target_folder).await.map_err(ExtractError::Io)?;
        tokio::fs::copy(cache_file, archive_in_target).await.map_err(ExtractError::Io)?;
    }

    extract_package(env, archive_in_target, target_folder).await?;

    let license_dest = target_folder.join("license.html");
    if tokio::fs::try_exists(license_cache_file).await.unwrap_or(false)
        && !tokio::fs::try_exists(&license_dest).await.unwrap_or(false)
    {
        tokio::fs::copy(license_cache_file, &license_dest).await.map_err(ExtractError::Io)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_test_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::FileOptions::default();
        for (name, contents) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(contents).unwrap();
        }
        zip.finish().unwrap();
    }

    #[tokio::test]
    async fn extracts_all_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let archive_path = tmp.path().join("Foo.Bar.1.0.0.nupkg");
        write_test_zip(&archive_path, &[("readme.txt", b"hello"), ("lib/net45/Foo.dll", b"binary")]);

        let target = tmp.path().join("target");
        let env = NuGetEnvironment::at(tmp.path().to_path_buf());
        extract_package(&env, &archive_path, &target).await.unwrap();

        assert_eq!(fs::read_to_string(target.join("readme.txt")).unwrap(), "hello");
        assert!(target.join("lib/net45/Foo.dll").is_file());
    }

    #[tokio::test]
    async fn extraction_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let archive_path = tmp.path().join("Foo.Bar.1.0.0.nupkg");
        write_test_zip(&archive_path, &[("readme.txt", b"hello")]);

        let target = tmp.path().join("target");
        let env = NuGetEnvironment::at(tmp.path().to_path_buf());
        extract_package(&env, &archive_path, &target).await.unwrap();
        fs::write(target.join("readme.txt"), b"mutated by a second unrelated write").unwrap();

        // Archive itself living alongside extracted content doesn't count
        // against "already extracted"; only content besides the archive
        // does, and that's already present here, so this call is a no-op.
        extract_package(&env, &archive_path, &target).await.unwrap();
        assert_eq!(
            fs::read_to_string(target.join("readme.txt")).unwrap(),
            "mutated by a second unrelated write"
        );
    }

    #[tokio::test]
    async fn decodes_url_encoded_entry_names() {
        let tmp = tempfile::tempdir().unwrap();
        let archive_path = tmp.path().join("Foo.Bar.1.0.0.nupkg");
        write_test_zip(&archive_path, &[("my%20lib/readme.txt", b"hi")]);

        let target = tmp.path().join("target");
        let env = NuGetEnvironment::at(tmp.path().to_path_buf());
        extract_package(&env, &archive_path, &target).await.unwrap();

        assert!(target.join("my lib/readme.txt").is_file());
    }

    #[tokio::test]
    async fn corrupt_archive_reports_a_snippet() {
        let tmp = tempfile::tempdir().unwrap();
        let archive_path = tmp.path().join("Bad.Pkg.1.0.0.nupkg");
        fs::write(&archive_path, b"<html><body>502 Bad Gateway</body></html>").unwrap();

        let target = tmp.path().join("target");
        let env = NuGetEnvironment::at(tmp.path().to_path_buf());
        let err = extract_package(&env, &archive_path, &target).await.unwrap_err();
        match err {
            ExtractError::Invalid { snippet } => assert!(snippet.contains("Bad Gateway")),
            other => panic!("expected ExtractError::Invalid, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn copy_from_cache_installs_archive_and_license() {
        let tmp = tempfile::tempdir().unwrap();
        let cache_file = tmp.path().join("Foo.Bar.1.0.0.nupkg");
        write_test_zip(&cache_file, &[("readme.txt", b"hi")]);
        let license_file = tmp.path().join("Foo.Bar.1.0.0.license.html");
        fs::write(&license_file, b"<html>license</html>").unwrap();

        let env = NuGetEnvironment::at(tmp.path().to_path_buf());
        let root = tmp.path().join("install-root");
        let name = PackageName::new("Foo.Bar");
        let version = SemVer::parse("1.0.0").unwrap();

        let target = copy_from_cache(&env, &root, "main", &cache_file, &license_file, &name, &version, true, false)
            .await
            .unwrap();

        assert!(target.join("readme.txt").is_file());
        assert!(target.join("license.html").is_file());
        assert_eq!(target, root.join("main").join("Foo.Bar.1.0.0"));
    }
}
