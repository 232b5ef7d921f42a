//! URL derivation for search and map-service requests.

use serde::Serialize;

/// CKAN action path appended to the repository URL.
pub const SEARCH_PATH: &str = "api/3/action/package_search";

/// Asks the repository for every matching row in one page.
pub const SEARCH_ROWS: u32 = 100_000;

/// The URL up to (not including) its query string or fragment.
pub fn strip_query(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

/// First value of the query parameter named exactly `name`.
pub fn query_param(url: &str, name: &str) -> Option<String> {
    let query = url.split_once('?')?.1;
    let query = query.split('#').next().unwrap_or_default();
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Layer name carried by a map-service URL (`LAYERS`, then `layers`).
pub fn layer_name(url: &str) -> Option<String> {
    query_param(url, "LAYERS").or_else(|| query_param(url, "layers"))
}

/// Search request for one filter query. The filter is appended verbatim.
pub fn search_url(endpoint: &str, filter_query: &str) -> String {
    let base = strip_query(endpoint).trim_end_matches('/');
    if filter_query.is_empty() {
        format!("{base}/{SEARCH_PATH}?rows={SEARCH_ROWS}")
    } else {
        format!("{base}/{SEARCH_PATH}?rows={SEARCH_ROWS}&{filter_query}")
    }
}

/// GetCapabilities request for a WMS endpoint.
pub fn capabilities_url(endpoint: &str) -> String {
    format!("{}?service=WMS&request=GetCapabilities", strip_query(endpoint))
}

/// Identity of a layer on a map server: stripped endpoint plus layer name.
///
/// A URL without a layer parameter gets an empty layer name, which no
/// capability entry can match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ServerLayerKey {
    pub endpoint: String,
    pub layer: String,
}

impl ServerLayerKey {
    pub fn new(endpoint: impl Into<String>, layer: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            layer: layer.into(),
        }
    }

    pub fn from_url(url: &str) -> Self {
        Self {
            endpoint: strip_query(url).to_string(),
            layer: layer_name(url).unwrap_or_default(),
        }
    }
}
