//! Small shared helpers: the lazily-built HTTP clients, JSON decoding with
//! path-aware errors, and a generic retry loop, carried over from the
//! teacher's ambient plumbing and generalized away from its npm-specific use.

use once_cell::sync::Lazy;
use reqwest::{Client, ClientBuilder};
use serde::de::DeserializeOwned;
use std::future::Future;
use tracing::warn;

/// A plain client for requests that want no special encoding negotiation
/// (JSON feed calls, HEAD-style probes), routed through no proxy. Production
/// call sites should prefer a client built via [`build_client`] off of
/// [`crate::env::NuGetEnvironment`] so an injected proxy is actually
/// honored; this static remains for tests and call sites with no `env` of
/// their own.
pub static CLIENT: Lazy<Client> = Lazy::new(|| build_client(None));

/// As [`CLIENT`], but configured to negotiate `gzip, deflate` content
/// encoding, used for archive and license downloads (§4.6).
pub static CLIENT_Z: Lazy<Client> = Lazy::new(|| build_client_z(None));

fn apply_proxy(builder: ClientBuilder, proxy: Option<&str>) -> ClientBuilder {
    match proxy.map(reqwest::Proxy::all) {
        Some(Ok(proxy)) => builder.proxy(proxy),
        Some(Err(e)) => {
            warn!("ignoring unparsable proxy url: {e}");
            builder
        }
        None => builder,
    }
}

/// Builds a plain HTTP client, routed through `proxy` when given (§4.6 step
/// 5: "honor an injected proxy provider"). `None` yields a direct
/// connection, matching the system default.
pub fn build_client(proxy: Option<&str>) -> Client {
    apply_proxy(ClientBuilder::new(), proxy)
        .build()
        .expect("reqwest client construction is infallible for this configuration")
}

/// As [`build_client`], negotiating `gzip, deflate` content encoding for
/// archive and license downloads (§4.6).
pub fn build_client_z(proxy: Option<&str>) -> Client {
    apply_proxy(ClientBuilder::new().brotli(true).gzip(true).deflate(true), proxy)
        .build()
        .expect("reqwest client construction is infallible for this configuration")
}

/// Deserializes JSON with a path-annotated error, so a malformed feed
/// response names the exact field that didn't match rather than just a
/// byte offset.
pub fn decode_json<T: DeserializeOwned>(
    bytes: &[u8],
) -> Result<T, serde_path_to_error::Error<serde_json::Error>> {
    let mut de = serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize(&mut de)
}

/// Retries `f` up to `attempts` times, logging each failure as a warning.
/// Returns the last error if every attempt fails.
pub async fn retry<T, E: std::fmt::Display, Fut: Future<Output = Result<T, E>>>(
    attempts: usize,
    mut f: impl FnMut() -> Fut,
) -> Result<T, E> {
    let mut last = None;
    for attempt in 0..attempts.max(1) {
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                warn!(attempt, "retrying after error: {e}");
                last = Some(e);
            }
        }
    }
    Err(last.expect("attempts.max(1) guarantees at least one iteration ran"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn retry_gives_up_after_exhausting_attempts() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), &str> = retry(3, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("boom") }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_succeeds_once_f_returns_ok() {
        let calls = AtomicUsize::new(0);
        let result = retry(5, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { if n < 2 { Err("not yet") } else { Ok(n) } }
        })
        .await;
        assert_eq!(result, Ok(2));
    }
}
