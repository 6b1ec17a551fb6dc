//! A minimal reader for the `.nuspec` manifest embedded in a `.nupkg`.
//!
//! This stands in for the external `Nuspec` collaborator referenced in
//! §4.1's local-adapter description. It only extracts what the local feed
//! client needs to build a [`PackageMetadata`]: identity, license URL and
//! the dependency list (optionally grouped by target framework).

use crate::framework::{parse_framework_identifier, FrameworkRestriction};
use crate::metadata::{optimize_dependencies, DependencyEntry};
use crate::package_name::PackageName;
use crate::version_requirement::VersionRequirement;
use quick_xml::events::Event;
use quick_xml::reader::Reader;

fn local_name(qualified: &str) -> &str {
    qualified.rsplit(':').next().unwrap_or(qualified)
}

pub struct NuspecManifest {
    pub id: String,
    pub license_url: String,
    pub dependencies: Vec<DependencyEntry>,
}

pub fn parse_nuspec(xml: &str) -> Result<NuspecManifest, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut current_group_framework: Option<String> = None;

    let mut id = None;
    let mut license_url = String::new();
    let mut dependencies = Vec::new();

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

                if local == "group" {
                    current_group_framework = tag
                        .attributes()
                        .flatten()
                        .find(|a| local_name(&String::from_utf8_lossy(a.key.as_ref())) == "targetFramework")
                        .and_then(|a| {
                            a.decode_and_unescape_value(reader.decoder())
                                .ok()
                                .map(|v| v.to_string())
                        });
                }

                if local == "dependency" {
                    let mut dep_id = None;
                    let mut dep_version = None;
                    for attr in tag.attributes().flatten() {
                        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
                        let value = attr
                            .decode_and_unescape_value(reader.decoder())
                            .map(|v| v.to_string())
                            .unwrap_or_default();
                        match local_name(&key) {
                            "id" => dep_id = Some(value),
                            "version" => dep_version = Some(value),
                            _ => {}
                        }
                    }
                    if let Some(dep_id) = dep_id {
                        let requirement = dep_version
                            .as_deref()
                            .map(VersionRequirement::parse)
                            .transpose()
                            .unwrap_or(None)
                            .unwrap_or(VersionRequirement::Unbounded);
                        let restrictions = current_group_framework
                            .as_deref()
                            .and_then(parse_framework_identifier)
                            .map(FrameworkRestriction::Exactly)
                            .into_iter()
                            .collect();
                        dependencies.push(DependencyEntry {
                            name: PackageName::new(dep_id),
                            requirement,
                            restrictions,
                        });
                    }
                }

                if !is_empty {
                    stack.push(local);
                } else if local == "group" {
                    // An empty `<group targetFramework="..."/>` with no children
                    // never closes the framework scope via `End`, so reset here.
                    current_group_framework = None;
                }
            }
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(|e| format!("xml decode error: {e}"))?
                    .to_string();
                if text.is_empty() {
                    continue;
                }
                match stack.last().map(String::as_str) {
                    Some("id") => id = Some(text),
                    Some("licenseUrl") => license_url = text,
                    _ => {}
                }
            }
            Event::End(tag) => {
                let name = String::from_utf8_lossy(tag.name().as_ref()).to_string();
                let local = local_name(&name);
                if local == "group" {
                    current_group_framework = None;
                }
                stack.pop();
            }
            _ => {}
        }

        buf.clear();
    }

    Ok(NuspecManifest {
        id: id.ok_or_else(|| "nuspec has no <id>".to_string())?,
        license_url,
        dependencies: optimize_dependencies(dependencies),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0"?>
<package xmlns="http://schemas.microsoft.com/packaging/2013/05/nuspec.xsd">
  <metadata>
    <id>Foo.Bar</id>
    <version>1.0.0</version>
    <licenseUrl>https://example.test/license</licenseUrl>
    <dependencies>
      <group targetFramework="net45">
        <dependency id="Newtonsoft.Json" version="9.0.1" />
      </group>
      <dependency id="NuGet.Core" />
    </dependencies>
  </metadata>
</package>"#;

    #[test]
    fn parses_identity() {
        let manifest = parse_nuspec(SAMPLE).unwrap();
        assert_eq!(manifest.id, "Foo.Bar");
        assert_eq!(manifest.license_url, "https://example.test/license");
    }

    #[test]
    fn parses_grouped_and_ungrouped_dependencies() {
        let manifest = parse_nuspec(SAMPLE).unwrap();
        assert_eq!(manifest.dependencies.len(), 2);
        let grouped = manifest
            .dependencies
            .iter()
            .find(|d| d.name.as_str() == "Newtonsoft.Json")
            .unwrap();
        assert_eq!(grouped.restrictions.len(), 1);

        let ungrouped = manifest
            .dependencies
            .iter()
            .find(|d| d.name.as_str() == "NuGet.Core")
            .unwrap();
        assert!(ungrouped.restrictions.is_empty());
    }
}
