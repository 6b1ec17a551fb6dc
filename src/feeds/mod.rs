//! The four protocol adapters (§4.1): V3 JSON, two V2 OData shapes, V2 JSON,
//! and a local filesystem feed. Each adapter exposes `list_versions`
//! (`None` = protocol not served here, `Some(vec)` possibly empty = served)
//! and, where the protocol supports it, `fetch_metadata` for one version.
//! V3 is the one exception: it folds an empty result into `None` too, so a
//! V3 index that resolves but lists nothing never outruns a V2 variant
//! still in flight in the version race (§4.1, §2).

pub mod local;
pub mod v2_json;
pub mod v2_odata;
pub mod v3;

use crate::source::Authentication;
use reqwest::RequestBuilder;

/// Applies preemptive auth to an outgoing request the way the Downloader
/// does (§4.6): `BasicCredentials` gets an explicit header, `Token` relies
/// on the host's default credential flow and is left untouched here.
pub(crate) fn apply_auth(request: RequestBuilder, auth: Option<&Authentication>) -> RequestBuilder {
    match auth.and_then(Authentication::authorization_header) {
        Some(header) => request.header("Authorization", header),
        None => request,
    }
}

pub(crate) const MAX_PAGES: usize = 1000;
