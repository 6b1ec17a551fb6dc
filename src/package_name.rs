use compact_str::{CompactString, ToCompactString};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::hash::{Hash, Hasher};

/// A case-preserving package identifier.
///
/// Equality, ordering and hashing all go through the normalized (lowercase)
/// form, matching NuGet's case-insensitive package-id semantics, while
/// `as_str` still returns whatever casing the caller (or feed) supplied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageName {
    raw: CompactString,
    normalized: CompactString,
}

impl PackageName {
    pub fn new(raw: impl AsRef<str>) -> Self {
        let raw = raw.as_ref().to_compact_string();
        let normalized = raw.to_lowercase().to_compact_string();
        Self { raw, normalized }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn normalized(&self) -> &str {
        &self.normalized
    }
}

impl Display for PackageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialEq for PackageName {
    fn eq(&self, other: &Self) -> bool {
        self.normalized == other.normalized
    }
}

impl Eq for PackageName {}

impl Hash for PackageName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized.hash(state);
    }
}

impl PartialOrd for PackageName {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackageName {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.normalized.cmp(&other.normalized)
    }
}

impl From<&str> for PackageName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PackageName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_ignores_case() {
        assert_eq!(PackageName::new("Newtonsoft.Json"), PackageName::new("newtonsoft.json"));
    }

    #[test]
    fn preserves_original_casing() {
        let name = PackageName::new("Newtonsoft.Json");
        assert_eq!(name.as_str(), "Newtonsoft.Json");
        assert_eq!(name.normalized(), "newtonsoft.json");
    }

    #[test]
    fn hashes_match_for_different_casing() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(PackageName::new("Foo.Bar"));
        assert!(set.contains(&PackageName::new("foo.bar")));
    }
}
