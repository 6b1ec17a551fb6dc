use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Authentication {
    Token(String),
    BasicCredentials(String, String),
}

impl Authentication {
    /// Builds the preemptive `Authorization` header value for this
    /// credential kind, if any. `Token` authentication relies on the
    /// host's default credential flow instead of an explicit header
    /// (§4.6), so it returns `None` here.
    pub fn authorization_header(&self) -> Option<String> {
        match self {
            Authentication::Token(_) => None,
            Authentication::BasicCredentials(user, password) => {
                use base64::Engine;
                let encoded =
                    base64::engine::general_purpose::STANDARD.encode(format!("{user}:{password}"));
                Some(format!("Basic {encoded}"))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PackageSource {
    RemoteNuget {
        url: String,
        authentication: Option<Authentication>,
    },
    LocalPath {
        path: PathBuf,
    },
}

impl PackageSource {
    pub fn describe(&self) -> String {
        match self {
            PackageSource::RemoteNuget { url, .. } => url.clone(),
            PackageSource::LocalPath { path } => path.display().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_auth_builds_preemptive_header() {
        let auth = Authentication::BasicCredentials("user".into(), "pass".into());
        assert_eq!(
            auth.authorization_header().unwrap(),
            format!("Basic {}", {
                use base64::Engine;
                base64::engine::general_purpose::STANDARD.encode("user:pass")
            })
        );
    }

    #[test]
    fn token_auth_has_no_explicit_header() {
        let auth = Authentication::Token("abc".into());
        assert_eq!(auth.authorization_header(), None);
    }
}
