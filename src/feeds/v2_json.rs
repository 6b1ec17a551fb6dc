//! NuGet V2 JSON `package-versions` adapter — the fast flat-array shape
//! some V2-compatible feeds serve alongside OData (§4.1).

use super::apply_auth;
use crate::package_name::PackageName;
use crate::source::Authentication;
use crate::util::decode_json;
use crate::version::SemVer;
use reqwest::Client;

pub async fn list_versions(
    client: &Client,
    auth: Option<&Authentication>,
    feed_url: &str,
    name: &PackageName,
) -> Option<Vec<SemVer>> {
    let url = format!(
        "{feed_url}/package-versions/{}?includePrerelease=true",
        urlencoding::encode(name.as_str())
    );

    let response = apply_auth(client.get(&url), auth).send().await.ok()?;
    if !response.status().is_success() {
        return None;
    }

    let bytes = response.bytes().await.ok()?;
    let raw: Vec<String> = decode_json(&bytes).ok()?;

    Some(raw.iter().filter_map(|v| SemVer::parse(v).ok()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::CLIENT;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn parses_flat_version_array() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/package-versions/Newtonsoft.Json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vec!["1.0.0", "1.0.1-beta"]))
            .mount(&server)
            .await;

        let versions = list_versions(&CLIENT, None, &server.uri(), &PackageName::new("Newtonsoft.Json"))
            .await
            .unwrap();
        assert_eq!(versions.len(), 2);
    }

    #[tokio::test]
    async fn non_2xx_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/package-versions/Missing.Package"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let versions = list_versions(&CLIENT, None, &server.uri(), &PackageName::new("Missing.Package")).await;
        assert_eq!(versions, None);
    }
}
