use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::Display;

/// A NuGet package version.
///
/// NuGet versions are semver-like but historically allow a fourth
/// "revision" segment (`1.0.0.0`) inherited from `System.Version`. We parse
/// with the strict [`semver`] crate first and fall back to a lenient
/// four-component parse so that legacy packages don't fail outright.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct SemVer {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    /// Fourth `System.Version`-style revision segment, if present.
    pub revision: Option<u64>,
    pub pre: semver::Prerelease,
    pub build: semver::BuildMetadata,
    /// The exact string this version was parsed from, kept for the
    /// permissive `to_string_original` fallback match described in the
    /// data model.
    original: String,
}

impl SemVer {
    pub fn parse(input: &str) -> Result<Self, String> {
        let trimmed = input.trim();
        if let Ok(v) = semver::Version::parse(trimmed) {
            return Ok(Self {
                major: v.major,
                minor: v.minor,
                patch: v.patch,
                revision: None,
                pre: v.pre,
                build: v.build,
                original: trimmed.to_string(),
            });
        }

        Self::parse_lenient(trimmed).ok_or_else(|| format!("not a valid version: {trimmed}"))
    }

    /// Accepts `major.minor[.patch[.revision]][-prerelease][+build]`,
    /// defaulting missing numeric segments to zero.
    fn parse_lenient(input: &str) -> Option<Self> {
        let (core_and_rev, build) = match input.split_once('+') {
            Some((a, b)) => (a, b.to_string()),
            None => (input, String::new()),
        };
        let (core_and_rev, pre) = match core_and_rev.split_once('-') {
            Some((a, b)) => (a, b.to_string()),
            None => (core_and_rev, String::new()),
        };

        let mut segments = core_and_rev.split('.');
        let major = segments.next()?.parse().ok()?;
        let minor = segments.next().unwrap_or("0").parse().ok()?;
        let patch = segments.next().unwrap_or("0").parse().ok()?;
        let revision = segments.next().and_then(|s| s.parse().ok());
        if segments.next().is_some() {
            return None;
        }

        Some(Self {
            major,
            minor,
            patch,
            revision,
            pre: if pre.is_empty() {
                semver::Prerelease::EMPTY
            } else {
                semver::Prerelease::new(&pre).ok()?
            },
            build: if build.is_empty() {
                semver::BuildMetadata::EMPTY
            } else {
                semver::BuildMetadata::new(&build).ok()?
            },
            original: input.to_string(),
        })
    }

    pub fn is_prerelease(&self) -> bool {
        !self.pre.is_empty()
    }

    /// Canonical string used for cache keys and feed query parameters:
    /// trailing zero revision is dropped, the three-component core is
    /// always emitted, prerelease is preserved, build metadata is dropped
    /// (NuGet considers build metadata semantically irrelevant).
    pub fn normalize(&self) -> String {
        let mut s = format!("{}.{}.{}", self.major, self.minor, self.patch);
        if let Some(rev) = self.revision {
            if rev != 0 {
                s.push_str(&format!(".{rev}"));
            }
        }
        if !self.pre.is_empty() {
            s.push('-');
            s.push_str(self.pre.as_str());
        }
        s
    }

    /// Permissive fallback form: the exact text this version was parsed
    /// from, used when an exact string match (rather than a normalized
    /// one) is required, e.g. local `.nupkg` filename lookups.
    pub fn to_string_original(&self) -> &str {
        &self.original
    }
}

impl Display for SemVer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.normalize())
    }
}

impl PartialEq for SemVer {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl PartialOrd for SemVer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SemVer {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch, self.revision.unwrap_or(0))
            .cmp(&(other.major, other.minor, other.patch, other.revision.unwrap_or(0)))
            .then_with(|| match (self.is_prerelease(), other.is_prerelease()) {
                (false, true) => Ordering::Greater,
                (true, false) => Ordering::Less,
                _ => self.pre.cmp(&other.pre),
            })
    }
}

impl std::hash::Hash for SemVer {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.normalize().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_trailing_zero_revision() {
        let v = SemVer::parse("1.2.3.0").unwrap();
        assert_eq!(v.normalize(), "1.2.3");
    }

    #[test]
    fn keeps_nonzero_revision() {
        let v = SemVer::parse("1.2.3.4").unwrap();
        assert_eq!(v.normalize(), "1.2.3.4");
    }

    #[test]
    fn parses_strict_semver_with_prerelease() {
        let v = SemVer::parse("2.0.0-preview.1").unwrap();
        assert_eq!(v.normalize(), "2.0.0-preview.1");
        assert!(v.is_prerelease());
    }

    #[test]
    fn stable_sorts_after_prerelease() {
        let stable = SemVer::parse("1.0.0").unwrap();
        let pre = SemVer::parse("1.0.0-beta").unwrap();
        assert!(stable > pre);
    }

    #[test]
    fn rejects_garbage() {
        assert!(SemVer::parse("not-a-version").is_err());
    }
}
