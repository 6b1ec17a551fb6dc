//! NuGet V2 OData adapter: two `listVersions` URL shapes (`$filter` and
//! `FindPackagesById()`) sharing a pagination walk, plus the fast/canonical
//! `fetchMetadata` attempts (§4.1).

use super::{apply_auth, MAX_PAGES};
use crate::error::FeedError;
use crate::metadata::PackageMetadata;
use crate::package_name::PackageName;
use crate::source::Authentication;
use crate::version::SemVer;
use reqwest::Client;
use crate::xml_odata::parse_entry;
use quick_xml::events::Event;
use quick_xml::reader::Reader;

fn local_name(qualified: &str) -> &str {
    qualified.rsplit(':').next().unwrap_or(qualified)
}

/// Walks one Atom `<feed>` page: collects every `entry/properties/Version`
/// text node and the `<link rel="next" href="...">` target, if any.
fn parse_versions_and_next(xml: &str) -> Result<(Vec<String>, Option<String>), String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut inside_entry = false;
    let mut versions = Vec::new();
    let mut next = None;

    let mut buf = Vec::new();
    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| format!("xml parse error: {e}"))?;

        let is_empty = matches!(event, Event::Empty(_));
        match event {
            Event::Eof => break,
            Event::Start(tag) | Event::Empty(tag) => {
                let name = String::from_utf8_lossy(tag.name().as_ref()).to_string();
                let local = local_name(&name).to_string();

                if local == "entry" {
                    inside_entry = true;
                }
                if local == "link" {
                    let mut rel = None;
                    let mut href = None;
                    for attr in tag.attributes().flatten() {
                        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
                        let value = attr
                            .decode_and_unescape_value(reader.decoder())
                            .map(|v| v.to_string())
                            .unwrap_or_default();
                        match local_name(&key) {
                            "rel" => rel = Some(value),
                            "href" => href = Some(value),
                            _ => {}
                        }
                    }
                    if rel.as_deref() == Some("next") {
                        next = href;
                    }
                }

                if !is_empty {
                    stack.push(local);
                }
            }
            Event::Text(text) => {
                if !inside_entry {
                    continue;
                }
                let text = text
                    .unescape()
                    .map_err(|e| format!("xml decode error: {e}"))?
                    .to_string();
                if text.is_empty() {
                    continue;
                }
                if stack.last().map(String::as_str) == Some("Version") {
                    versions.push(text);
                }
            }
            Event::End(tag) => {
                let name = String::from_utf8_lossy(tag.name().as_ref()).to_string();
                if local_name(&name) == "entry" {
                    inside_entry = false;
                }
                stack.pop();
            }
            _ => {}
        }

        buf.clear();
    }

    Ok((versions, next))
}

async fn get_atom(client: &Client, auth: Option<&Authentication>, url: &str) -> Option<String> {
    let response = apply_auth(client.get(url), auth)
        .header("Accept", "application/atom+xml")
        .send()
        .await
        .ok()?;
    if !response.status().is_success() {
        return None;
    }
    response.text().await.ok()
}

async fn paginate(client: &Client, auth: Option<&Authentication>, start_url: String) -> Option<Vec<SemVer>> {
    let mut next_url = Some(start_url);
    let mut raw_versions = Vec::new();

    for _ in 0..MAX_PAGES {
        let Some(url) = next_url.take() else { break };
        let Some(body) = get_atom(client, auth, &url).await else {
            break;
        };
        let Ok((versions, next)) = parse_versions_and_next(&body) else {
            break;
        };
        raw_versions.extend(versions);
        next_url = next;
    }

    Some(
        raw_versions
            .iter()
            .filter_map(|v| SemVer::parse(v).ok())
            .collect(),
    )
}

fn escape_odata_literal(value: &str) -> String {
    value.replace('\'', "''")
}

pub async fn list_versions_filter(
    client: &Client,
    auth: Option<&Authentication>,
    feed_url: &str,
    name: &PackageName,
) -> Option<Vec<SemVer>> {
    let url = format!(
        "{feed_url}/Packages?$filter=Id eq '{}'",
        escape_odata_literal(name.as_str())
    );
    paginate(client, auth, url).await
}

pub async fn list_versions_find_by_id(
    client: &Client,
    auth: Option<&Authentication>,
    feed_url: &str,
    name: &PackageName,
) -> Option<Vec<SemVer>> {
    let url = format!(
        "{feed_url}/FindPackagesById()?id='{}'",
        escape_odata_literal(name.as_str())
    );
    paginate(client, auth, url).await
}

async fn try_entry(
    client: &Client,
    auth: Option<&Authentication>,
    url: &str,
    feed_url: &str,
) -> Option<PackageMetadata> {
    let body = get_atom(client, auth, url).await?;
    parse_entry(&body, feed_url).ok()
}

/// Fast fetch: `$filter=Id eq '...' and NormalizedVersion eq '...'`, falling
/// back to `Version eq '{raw}'` if the normalized form comes back empty.
pub async fn fetch_metadata_fast(
    client: &Client,
    auth: Option<&Authentication>,
    feed_url: &str,
    name: &PackageName,
    version: &SemVer,
) -> Result<PackageMetadata, FeedError> {
    let escaped_name = escape_odata_literal(name.as_str());

    let normalized_url = format!(
        "{feed_url}/Packages?$filter=Id eq '{escaped_name}' and NormalizedVersion eq '{}'",
        escape_odata_literal(&version.normalize())
    );
    if let Some(meta) = try_entry(client, auth, &normalized_url, feed_url).await {
        return Ok(meta);
    }

    let raw_url = format!(
        "{feed_url}/Packages?$filter=Id eq '{escaped_name}' and Version eq '{}'",
        escape_odata_literal(version.to_string_original())
    );
    try_entry(client, auth, &raw_url, feed_url).await.ok_or_else(|| FeedError::NotFound {
        url: feed_url.to_string(),
        name: name.as_str().to_string(),
        version: version.to_string_original().to_string(),
    })
}

/// Canonical fetch: `Packages(Id='...',Version='...')`, then the same path
/// under an `/odata` prefix some feeds mount their service under.
pub async fn fetch_metadata_canonical(
    client: &Client,
    auth: Option<&Authentication>,
    feed_url: &str,
    name: &PackageName,
    version: &SemVer,
) -> Result<PackageMetadata, FeedError> {
    let escaped_name = escape_odata_literal(name.as_str());
    let escaped_version = escape_odata_literal(version.to_string_original());

    let plain_url = format!("{feed_url}/Packages(Id='{escaped_name}',Version='{escaped_version}')");
    if let Some(meta) = try_entry(client, auth, &plain_url, feed_url).await {
        return Ok(meta);
    }

    let odata_url =
        format!("{feed_url}/odata/Packages(Id='{escaped_name}',Version='{escaped_version}')");
    try_entry(client, auth, &odata_url, feed_url).await.ok_or_else(|| FeedError::NotFound {
        url: feed_url.to_string(),
        name: name.as_str().to_string(),
        version: version.to_string_original().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE_ONE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom"
      xmlns:m="http://schemas.microsoft.com/ado/2007/08/dataservices/metadata"
      xmlns:d="http://schemas.microsoft.com/ado/2007/08/dataservices">
  <link rel="next" href="https://feed.test/Packages?$skiptoken=1" />
  <entry>
    <m:properties>
      <d:Version>1.0.0</d:Version>
    </m:properties>
  </entry>
</feed>"#;

    const PAGE_TWO: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom"
      xmlns:m="http://schemas.microsoft.com/ado/2007/08/dataservices/metadata"
      xmlns:d="http://schemas.microsoft.com/ado/2007/08/dataservices">
  <entry>
    <m:properties>
      <d:Version>1.0.1</d:Version>
    </m:properties>
  </entry>
</feed>"#;

    #[test]
    fn parses_versions_and_next_link() {
        let (versions, next) = parse_versions_and_next(PAGE_ONE).unwrap();
        assert_eq!(versions, vec!["1.0.0"]);
        assert_eq!(next.as_deref(), Some("https://feed.test/Packages?$skiptoken=1"));
    }

    #[test]
    fn last_page_has_no_next_link() {
        let (versions, next) = parse_versions_and_next(PAGE_TWO).unwrap();
        assert_eq!(versions, vec!["1.0.1"]);
        assert_eq!(next, None);
    }
}
