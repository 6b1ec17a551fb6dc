//! Decodes a NuGet V2 OData Atom `<entry>` document into a [`PackageMetadata`].
//!
//! NuGet V2 feeds emit entries with two namespace prefixes (`m:` for
//! container elements, `d:` for data properties) whose exact prefix text
//! is not contractually fixed, so we match on local (suffix) element
//! names and ignore the prefix entirely, the same way a permissive
//! XPath-lite traversal would.

use crate::framework::parse_framework_spec;
use crate::metadata::{optimize_dependencies, DependencyEntry, DownloadLocation, PackageMetadata};
use crate::package_name::PackageName;
use crate::version_requirement::VersionRequirement;
use chrono::{DateTime, NaiveDateTime, Utc};
use quick_xml::events::Event;
use quick_xml::reader::Reader;

/// The sentinel publish date NuGet feeds use to mark a version unlisted.
/// Conventionally 1900-01-01T00:00:00Z (§4.2, Open Questions).
pub fn magic_unlisting_date() -> DateTime<Utc> {
    DateTime::from_naive_utc_and_offset(
        NaiveDateTime::new(
            chrono::NaiveDate::from_ymd_opt(1900, 1, 1).unwrap(),
            chrono::NaiveTime::MIN,
        ),
        Utc,
    )
}

const DOWNLOAD_CONTENT_TYPES: &[&str] = &["application/zip", "binary/octet-stream"];

fn local_name(qualified: &str) -> &str {
    qualified.rsplit(':').next().unwrap_or(qualified)
}

struct RawEntry {
    title: Option<String>,
    id_property: Option<String>,
    published: Option<String>,
    license_url: Option<String>,
    dependencies: Option<String>,
    content_src: Option<String>,
}

fn extract_entry(xml: &str) -> Result<RawEntry, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    // Stack of local element names from the document root down to the
    // current position. We match nodes by their position in this stack
    // rather than by depth arithmetic, so the parser works whether the
    // document root is `<feed>` (with one nested `<entry>`) or a bare
    // `<entry>` (§4.2: "preferring feed/entry, falling back to a root entry").
    let mut stack: Vec<String> = Vec::new();
    let mut inside_entry = false;

    let mut raw = RawEntry {
        title: None,
        id_property: None,
        published: None,
        license_url: None,
        dependencies: None,
        content_src: None,
    };

    let mut buf = Vec::new();
    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| format!("xml parse error: {e}"))?;

        match event {
            Event::Eof => break,
            Event::Start(tag) => {
                let name = String::from_utf8_lossy(tag.name().as_ref()).to_string();
                let local = local_name(&name).to_string();

                if local == "entry" {
                    inside_entry = true;
                }
                if local == "content" && inside_entry {
                    capture_content_src(&reader, &tag, &mut raw);
                }

                stack.push(local);
            }
            Event::Empty(tag) => {
                let name = String::from_utf8_lossy(tag.name().as_ref()).to_string();
                let local = local_name(&name).to_string();

                if local == "content" && inside_entry {
                    capture_content_src(&reader, &tag, &mut raw);
                }
                // Empty elements have no matching `End`, so nothing to push.
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

                let parent_is_entry = stack.len() >= 2 && stack[stack.len() - 2] == "entry";

                match stack.last().map(String::as_str) {
                    Some("title") if parent_is_entry => raw.title = Some(text),
                    Some("Id") => raw.id_property = Some(text),
                    Some("Published") => raw.published = Some(text),
                    Some("LicenseUrl") => raw.license_url = Some(text),
                    Some("Dependencies") => raw.dependencies = Some(text),
                    _ => {}
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

    Ok(raw)
}

fn capture_content_src(
    reader: &Reader<&[u8]>,
    tag: &quick_xml::events::BytesStart,
    raw: &mut RawEntry,
) {
    let mut content_type: Option<String> = None;
    let mut src: Option<String> = None;
    for attr in tag.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = attr
            .decode_and_unescape_value(reader.decoder())
            .map(|v| v.to_string())
            .unwrap_or_default();
        match local_name(&key) {
            "type" => content_type = Some(value),
            "src" => src = Some(value),
            _ => {}
        }
    }
    if let (Some(ty), Some(src)) = (content_type, src) {
        if DOWNLOAD_CONTENT_TYPES.contains(&ty.as_str()) {
            raw.content_src = Some(src);
        }
    }
}

/// Parses one `|`-separated dependency token list from `entry/properties/Dependencies`
/// (§4.2). Each token is `name:versionSpec:frameworkSpec`, with both
/// trailing fields optional; empty tokens are discarded.
pub fn parse_dependency_tokens(tokens: &str) -> Vec<DependencyEntry> {
    let mut entries = Vec::new();

    for token in tokens.split('|') {
        if token.is_empty() {
            continue;
        }

        let mut parts = token.splitn(3, ':');
        let name = match parts.next() {
            Some(n) if !n.is_empty() => n,
            _ => continue,
        };
        let version_spec = parts.next().unwrap_or("");
        let framework_spec = parts.next().unwrap_or("");

        let requirement = VersionRequirement::parse(version_spec).unwrap_or(VersionRequirement::Unbounded);
        let restrictions = parse_framework_spec(framework_spec).into_iter().collect();

        entries.push(DependencyEntry {
            name: PackageName::new(name),
            requirement,
            restrictions,
        });
    }

    optimize_dependencies(entries)
}

/// Parses a single OData entry document into canonical metadata.
///
/// `feed_url` is the source feed's URL, stamped into `source_url`.
pub fn parse_entry(xml: &str, feed_url: &str) -> Result<PackageMetadata, String> {
    let raw = extract_entry(xml)?;

    let official_name = raw
        .id_property
        .or(raw.title)
        .ok_or_else(|| "entry has neither properties/Id nor a title".to_string())?;

    let published = raw
        .published
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    let download_src = raw
        .content_src
        .ok_or_else(|| "entry/content has no usable download src".to_string())?;

    let dependencies = raw
        .dependencies
        .as_deref()
        .map(parse_dependency_tokens)
        .unwrap_or_default();

    Ok(PackageMetadata {
        package_name: official_name,
        source_url: feed_url.to_string(),
        download_location: DownloadLocation::Remote(download_src),
        license_url: raw.license_url.unwrap_or_default(),
        unlisted: published == magic_unlisting_date(),
        dependencies,
        cache_version: crate::metadata::CURRENT_CACHE_VERSION.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<entry xmlns="http://www.w3.org/2005/Atom"
       xmlns:d="http://schemas.microsoft.com/ado/2007/08/dataservices"
       xmlns:m="http://schemas.microsoft.com/ado/2007/08/dataservices/metadata">
  <title type="text">Newtonsoft.Json</title>
  <content type="application/zip" src="https://example.test/download/newtonsoft.json/9.0.1" />
  <m:properties>
    <d:Id>Newtonsoft.Json</d:Id>
    <d:Published>2016-06-13T00:00:00Z</d:Published>
    <d:LicenseUrl>https://example.test/license</d:LicenseUrl>
    <d:Dependencies>Newtonsoft.Json:9.0.1:net45|NuGet.Core::|Portable.Sample:1.0:portable-net45+win8</d:Dependencies>
  </m:properties>
</entry>"#;

    #[test]
    fn parses_official_name_from_properties_id() {
        let meta = parse_entry(SAMPLE, "https://example.test/nuget").unwrap();
        assert_eq!(meta.package_name, "Newtonsoft.Json");
    }

    #[test]
    fn parses_download_link_from_content_src() {
        let meta = parse_entry(SAMPLE, "https://example.test/nuget").unwrap();
        assert_eq!(
            meta.download_location,
            DownloadLocation::Remote("https://example.test/download/newtonsoft.json/9.0.1".into())
        );
    }

    #[test]
    fn parses_license_url() {
        let meta = parse_entry(SAMPLE, "https://example.test/nuget").unwrap();
        assert_eq!(meta.license_url, "https://example.test/license");
    }

    #[test]
    fn not_unlisted_for_ordinary_publish_date() {
        let meta = parse_entry(SAMPLE, "https://example.test/nuget").unwrap();
        assert!(!meta.unlisted);
    }

    #[test]
    fn detects_unlisted_via_magic_date() {
        let unlisted_xml = SAMPLE.replace("2016-06-13T00:00:00Z", "1900-01-01T00:00:00Z");
        let meta = parse_entry(&unlisted_xml, "https://example.test/nuget").unwrap();
        assert!(meta.unlisted);
    }

    #[test]
    fn dependency_grammar_scenario() {
        let deps = parse_dependency_tokens(
            "Newtonsoft.Json:9.0.1:net45|NuGet.Core::|Portable.Sample:1.0:portable-net45+win8",
        );
        assert_eq!(deps.len(), 3);
        assert_eq!(deps[0].name.as_str(), "Newtonsoft.Json");
        assert_eq!(deps[0].requirement, VersionRequirement::Minimum(crate::version::SemVer::parse("9.0.1").unwrap()));
        assert_eq!(deps[1].name.as_str(), "NuGet.Core");
        assert_eq!(deps[1].requirement, VersionRequirement::Unbounded);
        assert!(deps[1].restrictions.is_empty());
        assert_eq!(deps[2].name.as_str(), "Portable.Sample");
    }

    #[test]
    fn fatal_when_no_official_name() {
        let xml = r#"<entry><content type="application/zip" src="x"/></entry>"#;
        assert!(parse_entry(xml, "https://example.test").is_err());
    }

    #[test]
    fn fatal_when_no_download_link() {
        let xml = r#"<entry><title>Foo</title></entry>"#;
        assert!(parse_entry(xml, "https://example.test").is_err());
    }

    #[test]
    fn falls_back_to_root_entry_without_feed_wrapper() {
        // The same document parses whether or not it's wrapped in a <feed>.
        let wrapped = format!("<feed xmlns=\"http://www.w3.org/2005/Atom\">{SAMPLE}</feed>");
        let meta = parse_entry(&wrapped, "https://example.test/nuget").unwrap();
        assert_eq!(meta.package_name, "Newtonsoft.Json");
    }
}
