//! Authenticated streaming download of the archive and its license (§4.6).

use crate::archive;
use crate::disk_cache;
use crate::env::NuGetEnvironment;
use crate::error::{DownloadError, NuGetError};
use crate::feeds::apply_auth;
use crate::metadata::DownloadLocation;
use crate::package_name::PackageName;
use crate::progress::log_warning;
use crate::resolver::get_details_from_nuget;
use crate::source::{Authentication, PackageSource};
use crate::version::SemVer;
use futures::StreamExt;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument, warn};

const CHUNK_LOG_EVERY: usize = 64;
const LICENSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Fetches `metadata.license_url` (if any) into `license_path` within a
/// single 5-second wall-clock budget covering request, body read and
/// write. Never fatal: failures are logged and swallowed (§4.6 step 4, the
/// REDESIGN FLAGS collapsed-timeout note).
async fn download_license(client: Client, license_url: String, license_path: PathBuf) {
    if license_url.is_empty() {
        return;
    }

    let attempt = async {
        let response = client
            .get(&license_url)
            .header("User-Agent", "Paket")
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("license server responded with {}", response.status()));
        }
        let bytes = response.bytes().await.map_err(|e| e.to_string())?;
        tokio::fs::write(&license_path, &bytes).await.map_err(|e| e.to_string())
    };

    match tokio::time::timeout(LICENSE_TIMEOUT, attempt).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => log_warning(&format!("license download failed: {e}")),
        Err(_) => log_warning("license download timed out after 5s"),
    }
}

async fn stream_to_file(
    client: &Client,
    url: &str,
    auth: Option<&Authentication>,
    dest: &Path,
) -> Result<(), DownloadError> {
    let response = apply_auth(client.get(url), auth)
        .header("Accept-Encoding", "gzip, deflate")
        .header("User-Agent", "Paket")
        .send()
        .await
        .map_err(|source| DownloadError::Network { url: url.to_string(), source })?;

    if !response.status().is_success() {
        return Err(DownloadError::BadStatus { url: url.to_string(), status: response.status().as_u16() });
    }

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| DownloadError::Io { path: dest.to_path_buf(), source })?;
    }

    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(|source| DownloadError::Io { path: dest.to_path_buf(), source })?;

    let mut stream = response.bytes_stream();
    let mut chunks_written = 0usize;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|source| DownloadError::Network { url: url.to_string(), source })?;
        file.write_all(&chunk)
            .await
            .map_err(|source| DownloadError::Io { path: dest.to_path_buf(), source })?;
        chunks_written += 1;
        if chunks_written % CHUNK_LOG_EVERY == 0 {
            info!(chunks_written, "streaming archive to disk");
        }
    }
    file.flush().await.map_err(|source| DownloadError::Io { path: dest.to_path_buf(), source })?;

    Ok(())
}

/// `DownloadPackage` (§4.6, §6 op 3): ensures the archive and license are
/// cached on disk, then installs them into the target layout via the
/// Archive Handler.
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
    let normalized = version.normalize();
    let archive_path = disk_cache::archive_path(&env.cache_dir, name.as_str(), &normalized);
    let license_path = disk_cache::license_path(&env.cache_dir, name.as_str(), &normalized);

    let archive_is_cached = match tokio::fs::metadata(&archive_path).await {
        Ok(m) => m.len() > 0,
        Err(_) => false,
    };

    if force || !archive_is_cached {
        let source = PackageSource::RemoteNuget { url: url.to_string(), authentication: auth.cloned() };
        let resolved = get_details_from_nuget(env, force, &source, name, version).await?;

        let download_url = resolved
            .metadata
            .download_location
            .as_remote()
            .ok_or(DownloadError::NoRemoteLocation)?
            .to_string();

        let license_task = tokio::spawn(download_license(
            env.client_z.clone(),
            resolved.metadata.license_url.clone(),
            license_path.clone(),
        ));

        stream_to_file(&env.client_z, &download_url, auth, &archive_path).await?;

        if let Err(e) = license_task.await {
            warn!("license download task panicked: {e}");
        }
    }

    archive::copy_from_cache(
        env,
        root,
        group,
        &archive_path,
        &license_path,
        name,
        version,
        include_version_in_path,
        force,
    )
    .await
}
