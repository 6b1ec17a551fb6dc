use crate::framework::FrameworkRestriction;
use crate::package_name::PackageName;
use crate::version_requirement::VersionRequirement;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The schema version stamped into every freshly fetched [`PackageMetadata`].
/// A cache file whose `cache_version` differs from this literal is treated
/// as stale and refetched (§3 invariants, §8 scenario 2).
pub const CURRENT_CACHE_VERSION: &str = "2.0";

/// Where to obtain the archive bytes for a resolved package.
///
/// The original design used a magic string (`downloadUrl = packageName`)
/// to signal "local — no download required"; we replace that with an
/// explicit variant per the Open Questions resolution in DESIGN.md.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownloadLocation {
    Remote(String),
    Local(PathBuf),
}

impl DownloadLocation {
    pub fn as_remote(&self) -> Option<&str> {
        match self {
            DownloadLocation::Remote(url) => Some(url),
            DownloadLocation::Local(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEntry {
    pub name: PackageName,
    pub requirement: VersionRequirement,
    pub restrictions: Vec<FrameworkRestriction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub package_name: String,
    pub source_url: String,
    pub download_location: DownloadLocation,
    pub license_url: String,
    pub unlisted: bool,
    pub dependencies: Vec<DependencyEntry>,
    pub cache_version: String,
}

impl PackageMetadata {
    pub fn is_current_schema(&self) -> bool {
        self.cache_version == CURRENT_CACHE_VERSION
    }
}

/// De-duplicates dependency entries and merges the framework restrictions
/// of entries that otherwise agree on `(name, requirement)`.
///
/// This stands in for the external `optimizeDependencies` collaborator
/// (§3): a real dependency resolver would do considerably more (conflict
/// detection, narrowing), but that belongs to the resolution layer this
/// crate deliberately does not implement.
pub fn optimize_dependencies(entries: Vec<DependencyEntry>) -> Vec<DependencyEntry> {
    let mut merged: Vec<DependencyEntry> = Vec::with_capacity(entries.len());

    for entry in entries {
        if let Some(existing) = merged
            .iter_mut()
            .find(|e| e.name == entry.name && e.requirement == entry.requirement)
        {
            for restriction in entry.restrictions {
                if !existing.restrictions.contains(&restriction) {
                    existing.restrictions.push(restriction);
                }
            }
        } else {
            merged.push(entry);
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::SemVer;

    fn entry(name: &str, restriction: Option<FrameworkRestriction>) -> DependencyEntry {
        DependencyEntry {
            name: PackageName::new(name),
            requirement: VersionRequirement::Minimum(SemVer::parse("1.0.0").unwrap()),
            restrictions: restriction.into_iter().collect(),
        }
    }

    #[test]
    fn merges_duplicate_entries() {
        let merged = optimize_dependencies(vec![
            entry("Foo", Some(FrameworkRestriction::Exactly("net45".into()))),
            entry("Foo", Some(FrameworkRestriction::Exactly("net46".into()))),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].restrictions.len(), 2);
    }

    #[test]
    fn keeps_distinct_requirements_separate() {
        let mut a = entry("Foo", None);
        a.requirement = VersionRequirement::Minimum(SemVer::parse("2.0.0").unwrap());
        let b = entry("Foo", None);
        let merged = optimize_dependencies(vec![a, b]);
        assert_eq!(merged.len(), 2);
    }
}
