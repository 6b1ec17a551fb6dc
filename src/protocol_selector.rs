//! Per-`(auth, feed-URL)` memoization of which V2 listing variant actually
//! answers a given feed, so repeated calls stop trying variants that are
//! known not to be served there (§4.3, §4.8 state machine).

use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::future::Future;

/// Which V2 `listVersions` shape last produced a result for an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ODataVariant {
    Filter,
    FindPackagesById,
    JsonVersions,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EndpointKey {
    auth: Option<String>,
    url: String,
}

static SELECTOR: Lazy<DashMap<EndpointKey, ODataVariant>> = Lazy::new(DashMap::new);

fn key(auth: Option<&str>, url: &str) -> EndpointKey {
    EndpointKey {
        auth: auth.map(ToString::to_string),
        url: url.to_string(),
    }
}

/// Runs `attempt` for `variant` at `(auth, url)` unless the memo is already
/// bound to a different variant, in which case this short-circuits to
/// `None` without running `attempt` at all.
///
/// On a successful (`Some`) result the memo binds to `variant`; a `None`
/// result never updates the memo (§3 invariants: "a variant that yields
/// `None` does not update the memo").
pub async fn guarded<F, Fut, T>(
    auth: Option<&str>,
    url: &str,
    variant: ODataVariant,
    attempt: F,
) -> Option<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let endpoint = key(auth, url);

    if let Some(bound) = SELECTOR.get(&endpoint) {
        if *bound != variant {
            return None;
        }
    }

    let result = attempt().await;
    if result.is_some() {
        SELECTOR.insert(endpoint, variant);
    }
    result
}

/// Clears every memoized binding. Exposed for test isolation; the core
/// never calls this itself.
#[cfg(test)]
pub fn reset_for_tests() {
    SELECTOR.clear();
}
