//! The injected, process-wide state a caller hands the facade: where the
//! on-disk cache lives, and the handful of environment facts §9's Design
//! Notes insist be modeled as data rather than runtime probes.

use crate::util::{build_client, build_client_z};
use reqwest::Client;
use std::path::PathBuf;

/// Everything the core needs from its host environment, gathered in one
/// place so tests can substitute a throwaway `cache_dir` instead of
/// reaching for real platform directories (§9: "model as a single injected
/// value; test doubles replace it").
#[derive(Debug, Clone)]
pub struct NuGetEnvironment {
    /// Root of the on-disk metadata/archive/license cache.
    pub cache_dir: PathBuf,
    /// Whether the host runtime is known to write invalid zip entry
    /// timestamps, requiring the repair pass in `ExtractPackage` (§4.7,
    /// §9: "expose as a boolean capability flag ... the core does not
    /// inspect runtime identity directly").
    pub archive_timestamp_bug: bool,
    /// Optional proxy URL applied to outbound HTTP clients. `None` means
    /// use the system default (direct connection). `client` and `client_z`
    /// are rebuilt from this value whenever it changes, so it is never a
    /// dead field — every feed adapter and the Downloader read the clients
    /// here instead of reaching for a process-global default.
    pub proxy: Option<String>,
    /// Plain client for feed/JSON calls, routed through `proxy`.
    pub client: Client,
    /// `gzip, deflate`-negotiating client for archive/license downloads,
    /// routed through `proxy` (§4.6).
    pub client_z: Client,
}

impl NuGetEnvironment {
    /// Resolves the platform cache directory via `dirs::cache_dir()`,
    /// falling back to a process temp directory when unavailable (§6).
    pub fn resolve() -> Self {
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("NuGet")
            .join("Cache");

        Self::at(cache_dir)
    }

    /// Builds an environment rooted at an arbitrary directory, for tests
    /// and for callers that want an explicit cache location.
    pub fn at(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            archive_timestamp_bug: false,
            proxy: None,
            client: build_client(None),
            client_z: build_client_z(None),
        }
    }

    pub fn with_archive_timestamp_bug(mut self, enabled: bool) -> Self {
        self.archive_timestamp_bug = enabled;
        self
    }

    /// Rebuilds `client`/`client_z` to route through `proxy` (§4.6 step 5,
    /// SPEC_FULL §6's injected proxy-provider contract).
    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.client = build_client(proxy.as_deref());
        self.client_z = build_client_z(proxy.as_deref());
        self.proxy = proxy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_never_panics_and_yields_nuget_cache_suffix() {
        let env = NuGetEnvironment::resolve();
        assert!(env.cache_dir.ends_with("NuGet/Cache") || env.cache_dir.to_string_lossy().contains("NuGet"));
    }

    #[test]
    fn at_uses_the_given_directory_verbatim() {
        let env = NuGetEnvironment::at(PathBuf::from("/tmp/example-cache"));
        assert_eq!(env.cache_dir, PathBuf::from("/tmp/example-cache"));
    }
}
