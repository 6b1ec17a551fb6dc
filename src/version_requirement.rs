use crate::version::SemVer;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// A parsed NuGet version range.
///
/// NuGet's range grammar (see the "Version Ranges" reference in the
/// glossary) layers a few shapes on top of a bare version:
/// - empty or `"0"` — unbounded, satisfied by anything (§4.2).
/// - a bare version `"1.0.0"` — a floating minimum, inclusive.
/// - `"[1.0.0]"` — pinned to exactly that version.
/// - `"[1.0.0,2.0.0)"` / `"(1.0.0,2.0.0]"` — bounded range with
///   independently inclusive/exclusive edges; either edge may be omitted.
/// - `"1.0.*"` — a wildcard matching any version sharing the given prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionRequirement {
    Unbounded,
    Minimum(SemVer),
    Exact(SemVer),
    Range {
        min: Option<(SemVer, bool)>,
        max: Option<(SemVer, bool)>,
    },
    Wildcard(String),
}

impl VersionRequirement {
    pub fn parse(input: &str) -> Result<Self, String> {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed == "0" {
            return Ok(Self::Unbounded);
        }

        if trimmed.ends_with('*') {
            return Ok(Self::Wildcard(trimmed.trim_end_matches('*').to_string()));
        }

        let first = trimmed.chars().next().unwrap();
        if first == '[' || first == '(' {
            return Self::parse_bracketed(trimmed);
        }

        SemVer::parse(trimmed)
            .map(Self::Minimum)
            .map_err(|e| format!("invalid version requirement {trimmed:?}: {e}"))
    }

    fn parse_bracketed(input: &str) -> Result<Self, String> {
        let min_inclusive = input.starts_with('[');
        let max_inclusive = input.ends_with(']');
        if !(min_inclusive || input.starts_with('('))
            || !(max_inclusive || input.ends_with(')'))
        {
            return Err(format!("malformed version range: {input}"));
        }

        let inner = &input[1..input.len() - 1];

        if !inner.contains(',') {
            // `[1.0.0]` — exact pin.
            let v = SemVer::parse(inner)
                .map_err(|e| format!("invalid pinned version in {input:?}: {e}"))?;
            return Ok(Self::Exact(v));
        }

        let (min_str, max_str) = inner
            .split_once(',')
            .ok_or_else(|| format!("malformed version range: {input}"))?;
        let min_str = min_str.trim();
        let max_str = max_str.trim();

        let min = if min_str.is_empty() {
            None
        } else {
            Some((
                SemVer::parse(min_str)
                    .map_err(|e| format!("invalid lower bound in {input:?}: {e}"))?,
                min_inclusive,
            ))
        };
        let max = if max_str.is_empty() {
            None
        } else {
            Some((
                SemVer::parse(max_str)
                    .map_err(|e| format!("invalid upper bound in {input:?}: {e}"))?,
                max_inclusive,
            ))
        };

        Ok(Self::Range { min, max })
    }

    pub fn satisfies(&self, version: &SemVer) -> bool {
        match self {
            Self::Unbounded => true,
            Self::Minimum(min) => version >= min,
            Self::Exact(exact) => version == exact,
            Self::Range { min, max } => {
                let min_ok = min
                    .as_ref()
                    .map(|(v, inclusive)| if *inclusive { version >= v } else { version > v })
                    .unwrap_or(true);
                let max_ok = max
                    .as_ref()
                    .map(|(v, inclusive)| if *inclusive { version <= v } else { version < v })
                    .unwrap_or(true);
                min_ok && max_ok
            }
            Self::Wildcard(prefix) => version.normalize().starts_with(prefix.as_str()),
        }
    }
}

impl Display for VersionRequirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unbounded => write!(f, "0"),
            Self::Minimum(v) => write!(f, "{v}"),
            Self::Exact(v) => write!(f, "[{v}]"),
            Self::Range { min, max } => {
                let open = min.as_ref().map(|(_, i)| *i).unwrap_or(false);
                write!(f, "{}", if open { '[' } else { '(' })?;
                if let Some((v, _)) = min {
                    write!(f, "{v}")?;
                }
                write!(f, ",")?;
                if let Some((v, _)) = max {
                    write!(f, "{v}")?;
                }
                let close = max.as_ref().map(|(_, i)| *i).unwrap_or(false);
                write!(f, "{}", if close { ']' } else { ')' })
            }
            Self::Wildcard(prefix) => write!(f, "{prefix}*"),
        }
    }
}

impl Serialize for VersionRequirement {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for VersionRequirement {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
