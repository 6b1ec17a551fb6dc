//! Metadata Resolver: `getDetailsFromNuGet` (cache-or-fetch for one remote
//! source) and `GetPackageDetails` (race every configured source) (§4.5).

use crate::disk_cache;
use crate::env::NuGetEnvironment;
use crate::error::{CacheError, NuGetError};
use crate::feeds::{local, v2_odata};
use crate::metadata::PackageMetadata;
use crate::package_name::PackageName;
use crate::source::PackageSource;
use crate::version::SemVer;
use futures::future::BoxFuture;
use tracing::instrument;

pub struct ResolvedMetadata {
    pub metadata: PackageMetadata,
    pub cached: bool,
}

async fn load_from_cache_or_odata(
    env: &NuGetEnvironment,
    force: bool,
    source: &PackageSource,
    name: &PackageName,
    version: &SemVer,
    cache_file: &std::path::Path,
) -> Result<ResolvedMetadata, NuGetError> {
    if !force {
        if let Some(cached) = disk_cache::load(cache_file).await {
            return Ok(ResolvedMetadata { metadata: cached, cached: true });
        }
    }

    let PackageSource::RemoteNuget { url, authentication } = source else {
        unreachable!("local sources never reach the disk-cache path")
    };

    if let Ok(metadata) =
        v2_odata::fetch_metadata_fast(&env.client, authentication.as_ref(), url, name, version).await
    {
        return Ok(ResolvedMetadata { metadata, cached: false });
    }

    let metadata = v2_odata::fetch_metadata_canonical(&env.client, authentication.as_ref(), url, name, version)
        .await
        .map_err(NuGetError::from)?;
    Ok(ResolvedMetadata { metadata, cached: false })
}

/// Fetches metadata for one remote source, consulting and maintaining the
/// on-disk cache and its sticky `.failed` marker (§4.5 steps 1-5).
#[instrument(skip(env, source))]
pub(crate) async fn get_details_from_nuget(
    env: &NuGetEnvironment,
    force: bool,
    source: &PackageSource,
    name: &PackageName,
    version: &SemVer,
) -> Result<ResolvedMetadata, NuGetError> {
    let PackageSource::RemoteNuget { url, .. } = source else {
        unreachable!("called only for remote sources")
    };

    let cache_file = disk_cache::metadata_path(&env.cache_dir, name.as_str(), &version.normalize(), url);
    let error_file = disk_cache::error_marker_path(&env.cache_dir, name.as_str(), &version.normalize(), url);

    if !force && disk_cache::is_sticky_failed(&error_file).await {
        return Err(NuGetError::Cache(CacheError::Sticky(error_file)));
    }

    match load_from_cache_or_odata(env, force, source, name, version, &cache_file).await {
        Ok(resolved) => {
            disk_cache::clear_sticky(&error_file).await;
            if !resolved.cached {
                disk_cache::store(&cache_file, &resolved.metadata).await;
            }
            Ok(resolved)
        }
        Err(e) => {
            disk_cache::mark_failed(&error_file, &e.to_string()).await;
            Err(e)
        }
    }
}

async fn resolve_one(
    env: NuGetEnvironment,
    force: bool,
    source: PackageSource,
    name: PackageName,
    version: SemVer,
) -> Option<(PackageSource, PackageMetadata)> {
    match &source {
        PackageSource::RemoteNuget { .. } => {
            get_details_from_nuget(&env, force, &source, &name, &version)
                .await
                .ok()
                .map(|resolved| (source, resolved.metadata))
        }
        PackageSource::LocalPath { path } => local::fetch_metadata(path.clone(), name, version)
            .await
            .ok()
            .map(|metadata| (source, metadata)),
    }
}

/// `GetPackageDetails`: races `getDetailsFromNuGet`/the local adapter across
/// every configured source, returning the first success.
#[instrument(skip(env, sources))]
pub async fn get_package_details(
    env: &NuGetEnvironment,
    force: bool,
    sources: &[PackageSource],
    name: &PackageName,
    version: &SemVer,
) -> Result<(PackageSource, PackageMetadata), NuGetError> {
    let attempts: Vec<BoxFuture<'static, Option<(PackageSource, PackageMetadata)>>> = sources
        .iter()
        .cloned()
        .map(|source| {
            let env = env.clone();
            let name = name.clone();
            let version = version.clone();
            Box::pin(resolve_one(env, force, source, name, version)) as BoxFuture<'static, _>
        })
        .collect();

    let results = futures::future::join_all(attempts).await;

    match results.into_iter().flatten().next() {
        Some(winner) => Ok(winner),
        None => {
            // Every source failed: the `.failed` markers left behind by
            // `get_details_from_nuget` would otherwise stick around and
            // short-circuit the *next* attempt even after whatever caused
            // this failure clears up (§4.5: "on total failure it clears
            // any existing `.failed` marker").
            for source in sources {
                if let PackageSource::RemoteNuget { url, .. } = source {
                    let error_file =
                        disk_cache::error_marker_path(&env.cache_dir, name.as_str(), &version.normalize(), url);
                    disk_cache::clear_sticky(&error_file).await;
                }
            }
            Err(NuGetError::NotFoundAnywhere {
                package: name.as_str().to_string(),
                version: version.to_string_original().to_string(),
                attempted: sources.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Authentication;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ENTRY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<entry xmlns="http://www.w3.org/2005/Atom"
       xmlns:d="http://schemas.microsoft.com/ado/2007/08/dataservices"
       xmlns:m="http://schemas.microsoft.com/ado/2007/08/dataservices/metadata">
  <content type="application/zip" src="https://example.test/download/foo/1.0.0" />
  <m:properties>
    <d:Id>Foo.Bar</d:Id>
    <d:Published>2020-01-01T00:00:00Z</d:Published>
  </m:properties>
</entry>"#;

    #[tokio::test]
    async fn caches_after_first_successful_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Packages"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ENTRY))
            .mount(&server)
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let env = NuGetEnvironment::at(tmp.path().to_path_buf());
        let source = PackageSource::RemoteNuget { url: server.uri(), authentication: None::<Authentication> };
        let name = PackageName::new("Foo.Bar");
        let version = SemVer::parse("1.0.0").unwrap();

        let first = get_details_from_nuget(&env, false, &source, &name, &version).await.unwrap();
        assert!(!first.cached);

        let second = get_details_from_nuget(&env, false, &source, &name, &version).await.unwrap();
        assert!(second.cached);
        assert_eq!(second.metadata.package_name, first.metadata.package_name);
    }

    #[tokio::test]
    async fn sticky_failure_short_circuits_until_forced() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Packages"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let env = NuGetEnvironment::at(tmp.path().to_path_buf());
        let source = PackageSource::RemoteNuget { url: server.uri(), authentication: None::<Authentication> };
        let name = PackageName::new("Foo.Bar");
        let version = SemVer::parse("1.0.0").unwrap();

        assert!(get_details_from_nuget(&env, false, &source, &name, &version).await.is_err());

        let second = get_details_from_nuget(&env, false, &source, &name, &version).await;
        assert!(matches!(second, Err(NuGetError::Cache(CacheError::Sticky(_)))));

        let forced = get_details_from_nuget(&env, true, &source, &name, &version).await;
        assert!(forced.is_err());
    }

    #[tokio::test]
    async fn total_failure_clears_sticky_markers_for_every_source() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Packages"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let env = NuGetEnvironment::at(tmp.path().to_path_buf());
        let source = PackageSource::RemoteNuget { url: server.uri(), authentication: None::<Authentication> };
        let name = PackageName::new("Foo.Bar");
        let version = SemVer::parse("1.0.0").unwrap();

        let error_file =
            disk_cache::error_marker_path(&env.cache_dir, name.as_str(), &version.normalize(), &server.uri());

        let result = get_package_details(&env, false, &[source], &name, &version).await;
        assert!(matches!(result, Err(NuGetError::NotFoundAnywhere { .. })));
        assert!(
            !disk_cache::is_sticky_failed(&error_file).await,
            "total failure should clear the sticky marker it just wrote"
        );
    }
}
