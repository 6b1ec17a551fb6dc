//! Fans `listVersions` out across every configured source in parallel and
//! unions the winners (§4.4).

use crate::env::NuGetEnvironment;
use crate::error::NuGetError;
use crate::feeds::{local, v2_json, v2_odata, v3};
use crate::package_name::PackageName;
use crate::protocol_selector::{self, ODataVariant};
use crate::source::{Authentication, PackageSource};
use crate::version::SemVer;
use futures::future::{select_all, BoxFuture};
use tracing::{instrument, warn};

/// A stable memo key for an `Authentication` value. The Protocol Selector
/// only needs to distinguish "same credentials" from "different
/// credentials" at a given URL, not recover the credentials themselves.
fn auth_memo_key(auth: Option<&Authentication>) -> Option<String> {
    auth.map(|a| match a {
        Authentication::Token(t) => format!("token:{t}"),
        Authentication::BasicCredentials(u, _) => format!("basic:{u}"),
    })
}

type VersionFuture = BoxFuture<'static, Option<Vec<SemVer>>>;

/// Polls every future in `attempts` until one resolves to `Some`, then drops
/// the rest (best-effort cancellation: in-flight requests may still
/// complete, but their results are discarded, matching §5's "cancellation
/// of losers is best-effort").
async fn race_first_some(mut attempts: Vec<VersionFuture>) -> Option<Vec<SemVer>> {
    while !attempts.is_empty() {
        let (result, _index, remaining) = select_all(attempts).await;
        if result.is_some() {
            return result;
        }
        attempts = remaining;
    }
    None
}

async fn list_versions_for_remote(
    env: NuGetEnvironment,
    url: String,
    auth: Option<Authentication>,
    name: PackageName,
) -> Option<Vec<SemVer>> {
    let auth_key = auth_memo_key(auth.as_ref());

    let attempts: Vec<VersionFuture> = vec![
        Box::pin({
            let url = url.clone();
            let auth = auth.clone();
            let name = name.clone();
            let client = env.client.clone();
            async move { v3::list_versions(&client, auth.as_ref(), &url, &name).await }
        }),
        Box::pin({
            let url = url.clone();
            let auth = auth.clone();
            let name = name.clone();
            let auth_key = auth_key.clone();
            let client = env.client.clone();
            async move {
                protocol_selector::guarded(auth_key.as_deref(), &url, ODataVariant::Filter, || async {
                    v2_odata::list_versions_filter(&client, auth.as_ref(), &url, &name).await
                })
                .await
            }
        }),
        Box::pin({
            let url = url.clone();
            let auth = auth.clone();
            let name = name.clone();
            let auth_key = auth_key.clone();
            let client = env.client.clone();
            async move {
                protocol_selector::guarded(
                    auth_key.as_deref(),
                    &url,
                    ODataVariant::FindPackagesById,
                    || async { v2_odata::list_versions_find_by_id(&client, auth.as_ref(), &url, &name).await },
                )
                .await
            }
        }),
        Box::pin({
            let url = url.clone();
            let auth = auth.clone();
            let name = name.clone();
            let auth_key = auth_key.clone();
            let client = env.client.clone();
            async move {
                protocol_selector::guarded(
                    auth_key.as_deref(),
                    &url,
                    ODataVariant::JsonVersions,
                    || async { v2_json::list_versions(&client, auth.as_ref(), &url, &name).await },
                )
                .await
            }
        }),
    ];

    race_first_some(attempts).await
}

fn dedup_by_identity(mut versions: Vec<SemVer>) -> Vec<SemVer> {
    versions.sort_by(|a, b| a.cmp(b));
    versions.dedup_by(|a, b| a == b);
    versions
}

/// `GetVersions`: enumerates every available version of `name` across
/// `sources`, failing only if every source comes back empty or erroring.
#[instrument(skip(env, sources))]
pub async fn get_versions(
    env: &NuGetEnvironment,
    sources: &[PackageSource],
    name: &PackageName,
) -> Result<Vec<SemVer>, NuGetError> {
    let per_source = sources.iter().map(|source| {
        let name = name.clone();
        match source {
            PackageSource::RemoteNuget { url, authentication } => {
                let env = env.clone();
                let url = url.clone();
                let auth = authentication.clone();
                Box::pin(async move { list_versions_for_remote(env, url, auth, name).await.unwrap_or_default() })
                    as BoxFuture<'static, Vec<SemVer>>
            }
            PackageSource::LocalPath { path } => {
                let path = path.clone();
                Box::pin(async move {
                    match local::list_versions(path, name).await {
                        Ok(versions) => versions.unwrap_or_default(),
                        Err(e) => {
                            warn!("local feed error: {e}");
                            Vec::new()
                        }
                    }
                }) as BoxFuture<'static, Vec<SemVer>>
            }
        }
    });

    let results = futures::future::join_all(per_source).await;
    let merged = dedup_by_identity(results.into_iter().flatten().collect());

    if merged.is_empty() {
        return Err(NuGetError::NoVersions {
            package: name.as_str().to_string(),
            attempted: sources.len(),
        });
    }

    Ok(merged)
}
