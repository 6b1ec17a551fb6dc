//! Local `nuget.toml` configuration: a default list of package sources and
//! their authentication, loaded lazily and memoized the same way the
//! teacher's `read_config` memoizes `cotton.toml` (§2 ambient stack, §6
//! "an optional `cotton.toml`-style local config file").

use crate::source::{Authentication, PackageSource};
use cached::proc_macro::cached;
use color_eyre::eyre::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs::read_to_string;

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default, rename = "source")]
    pub sources: Vec<ConfiguredSource>,
    /// Proxy URL outbound HTTP clients should route through (§4.6 step 5,
    /// SPEC_FULL §6's injected proxy-provider contract). A CLI `--proxy`
    /// flag takes precedence over this when both are given.
    #[serde(default)]
    pub proxy: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ConfiguredSource {
    /// A remote feed URL. Mutually exclusive with `path`.
    pub url: Option<String>,
    /// A local directory of `.nupkg` files. Mutually exclusive with `url`.
    pub path: Option<String>,
    pub auth: Option<ConfiguredAuth>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfiguredAuth {
    Token { token: String },
    Basic { username: String, password: String },
}

impl From<&ConfiguredAuth> for Authentication {
    fn from(auth: &ConfiguredAuth) -> Self {
        match auth {
            ConfiguredAuth::Token { token } => Authentication::Token(token.clone()),
            ConfiguredAuth::Basic { username, password } => {
                Authentication::BasicCredentials(username.clone(), password.clone())
            }
        }
    }
}

impl ConfiguredSource {
    pub fn into_package_source(self) -> Option<PackageSource> {
        if let Some(url) = self.url {
            Some(PackageSource::RemoteNuget {
                url,
                authentication: self.auth.as_ref().map(Authentication::from),
            })
        } else {
            self.path.map(|path| PackageSource::LocalPath { path: PathBuf::from(path) })
        }
    }
}

impl Config {
    pub fn into_sources(self) -> Vec<PackageSource> {
        self.sources.into_iter().filter_map(ConfiguredSource::into_package_source).collect()
    }
}

/// Reads `nuget.toml` from the current directory, returning an empty
/// config if it doesn't exist. Memoized for the lifetime of the process,
/// matching the teacher's `#[cached(result)] read_config`.
#[cached(result)]
pub async fn read_config() -> Result<Config> {
    match read_to_string("nuget.toml").await {
        Ok(raw) => Ok(toml::from_str(&raw)?),
        Err(_) => Ok(Config::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_remote_source_with_basic_auth() {
        let toml = r#"
            [[source]]
            url = "https://example.test/v3"

            [source.auth]
            kind = "basic"
            username = "user"
            password = "pass"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        let sources = config.into_sources();
        assert_eq!(sources.len(), 1);
        assert!(matches!(
            sources[0],
            PackageSource::RemoteNuget { authentication: Some(Authentication::BasicCredentials(..)), .. }
        ));
    }

    #[test]
    fn parses_a_local_path_source() {
        let toml = r#"
            [[source]]
            path = "/srv/nupkgs"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        let sources = config.into_sources();
        assert_eq!(sources.len(), 1);
        assert!(matches!(sources[0], PackageSource::LocalPath { .. }));
    }

    #[test]
    fn proxy_defaults_to_none_and_parses_when_given() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.proxy, None);

        let config: Config = toml::from_str(r#"proxy = "http://proxy.local:8080""#).unwrap();
        assert_eq!(config.proxy.as_deref(), Some("http://proxy.local:8080"));
    }
}
