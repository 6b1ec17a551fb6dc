//! NuGet V3 registration adapter. `listVersions` walks the paginated
//! registration index, fetching out-of-line pages on demand, capped well
//! short of the "100,000 results" ceiling in §4.1 by [`MAX_PAGES`].

use super::{apply_auth, MAX_PAGES};
use crate::package_name::PackageName;
use crate::source::Authentication;
use crate::version::SemVer;
use reqwest::Client;
use serde_json::Value;

async fn fetch_json(client: &Client, auth: Option<&Authentication>, url: &str) -> Option<Value> {
    let response = apply_auth(client.get(url), auth).send().await.ok()?;
    if !response.status().is_success() {
        return None;
    }
    response.json::<Value>().await.ok()
}

fn page_versions(page: &Value) -> Vec<String> {
    page.get("items")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| {
                    entry
                        .get("catalogEntry")
                        .and_then(|e| e.get("version"))
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
                .collect()
        })
        .unwrap_or_default()
}

pub async fn list_versions(
    client: &Client,
    auth: Option<&Authentication>,
    feed_url: &str,
    name: &PackageName,
) -> Option<Vec<SemVer>> {
    let index_url = format!("{feed_url}/{}/index.json", name.normalized());
    let index = fetch_json(client, auth, &index_url).await?;

    let pages = index.get("items").and_then(Value::as_array)?;
    let mut raw_versions = Vec::new();

    for (page_index, page) in pages.iter().enumerate() {
        if page_index >= MAX_PAGES {
            break;
        }

        if page.get("items").is_some() {
            raw_versions.extend(page_versions(page));
            continue;
        }

        // Large registration indices push individual pages out-of-line,
        // leaving only an `@id` pointer to fetch separately.
        if let Some(page_url) = page.get("@id").and_then(Value::as_str) {
            if let Some(remote_page) = fetch_json(client, auth, page_url).await {
                raw_versions.extend(page_versions(&remote_page));
            }
        }
    }

    let versions: Vec<SemVer> = raw_versions.iter().filter_map(|v| SemVer::parse(v).ok()).collect();

    // Unlike the V2 adapters, V3 treats an empty result the same as "not
    // served here" so a real V2 result elsewhere in the race isn't
    // suppressed by a V3 index that happened to resolve but list nothing.
    if versions.is_empty() {
        None
    } else {
        Some(versions)
    }
}
