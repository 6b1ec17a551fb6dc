use serde::{Deserialize, Serialize};

/// A predicate over target frameworks gating whether a dependency applies.
///
/// Emitted by the metadata parser; the resolver treats these opaquely
/// (it never inspects the framework identifier or profile string itself).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameworkRestriction {
    Exactly(String),
    Portable(String),
}

/// Attempts to recognize `spec` as a target-framework moniker (e.g.
/// `net45`, `netstandard2.0`, `win8`). NuGet's real identifier table is
/// large; we recognize the common prefixes and otherwise fail, matching
/// the "on success Exactly(fw), on failure no restriction" contract in
/// the metadata parser.
pub fn parse_framework_identifier(spec: &str) -> Option<String> {
    const KNOWN_PREFIXES: &[&str] = &[
        "net", "netstandard", "netcoreapp", "win", "wp", "wpa", "sl", "uap", "monoandroid",
        "monotouch", "xamarinios", "xamarinmac", "tizen",
    ];

    let lower = spec.to_ascii_lowercase();
    if KNOWN_PREFIXES
        .iter()
        .any(|prefix| lower.starts_with(prefix) && lower.len() > prefix.len())
    {
        Some(spec.to_string())
    } else {
        None
    }
}

/// Parses a single `frameworkSpec` token from the dependency grammar
/// (§4.2): empty means no restriction, a `portable` prefix (case
/// insensitive) yields `Portable`, otherwise a recognized moniker yields
/// `Exactly`, and an unrecognized token yields no restriction at all.
pub fn parse_framework_spec(spec: &str) -> Option<FrameworkRestriction> {
    if spec.is_empty() {
        return None;
    }
    if spec.len() >= 8 && spec[..8].eq_ignore_ascii_case("portable") {
        return Some(FrameworkRestriction::Portable(spec.to_string()));
    }
    parse_framework_identifier(spec).map(FrameworkRestriction::Exactly)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_exact_framework() {
        assert_eq!(
            parse_framework_spec("net45"),
            Some(FrameworkRestriction::Exactly("net45".into()))
        );
    }

    #[test]
    fn recognizes_portable_case_insensitively() {
        assert_eq!(
            parse_framework_spec("Portable-net45+win8"),
            Some(FrameworkRestriction::Portable("Portable-net45+win8".into()))
        );
    }

    #[test]
    fn empty_spec_has_no_restriction() {
        assert_eq!(parse_framework_spec(""), None);
    }

    #[test]
    fn unrecognized_moniker_has_no_restriction() {
        assert_eq!(parse_framework_spec("some-made-up-thing"), None);
    }
}
