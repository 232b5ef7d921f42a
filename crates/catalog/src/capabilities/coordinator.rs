use std::collections::{BTreeMap, BTreeSet};

use futures::future::join_all;
use mapcat_core::RawCatalogRecord;
use tracing::{debug, info};

use super::document::CapabilitiesDocument;
use super::filter::filter_layers;
use super::{Decision, FilterDecisions};
use crate::diagnostics::{DiagnosticEvent, Diagnostics};
use crate::endpoint::{capabilities_url, ServerLayerKey};
use crate::fetch::Fetcher;
use crate::proxy::{route, ProxySelector};

/// Decisions plus the events raised while producing them.
#[derive(Debug, Default)]
pub struct ValidationOutcome {
    pub decisions: FilterDecisions,
    pub diagnostics: Diagnostics,
    pub endpoints: usize,
}

/// Endpoint -> layer names for every WMS resource with a usable URL.
pub fn group_wms_layers(records: &[RawCatalogRecord]) -> BTreeMap<String, BTreeSet<String>> {
    let mut servers: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for record in records {
        for resource in record.resources.iter().filter(|r| r.is_wms()) {
            let Some(url) = resource.url.as_deref() else {
                continue;
            };
            let key = ServerLayerKey::from_url(url);
            servers.entry(key.endpoint).or_default().insert(key.layer);
        }
    }
    servers
}

/// Fetch each distinct endpoint's capabilities concurrently and decide
/// every grouped layer. Never fails: an endpoint that cannot be checked
/// leaves all of its layers excluded.
pub async fn validate_layers(
    records: &[RawCatalogRecord],
    threshold: Option<f64>,
    fetcher: &dyn Fetcher,
    proxy: &dyn ProxySelector,
    cache_hint: Option<&str>,
) -> ValidationOutcome {
    let servers = group_wms_layers(records);
    info!(endpoints = servers.len(), "validating WMS layers against capabilities");

    let checks = servers.iter().map(|(endpoint, layers)| {
        check_endpoint(endpoint, layers, threshold, fetcher, proxy, cache_hint)
    });
    let results = join_all(checks).await;

    let mut outcome = ValidationOutcome {
        endpoints: servers.len(),
        ..Default::default()
    };
    for ((endpoint, _), (decisions, diagnostics)) in servers.iter().zip(results) {
        for (layer, decision) in decisions {
            outcome
                .decisions
                .insert(ServerLayerKey::new(endpoint.clone(), layer), decision);
        }
        outcome.diagnostics.append(diagnostics);
    }

    info!(
        layers = outcome.decisions.len(),
        included = outcome.decisions.included_count(),
        "capability validation complete"
    );
    outcome
}

async fn check_endpoint(
    endpoint: &str,
    layers: &BTreeSet<String>,
    threshold: Option<f64>,
    fetcher: &dyn Fetcher,
    proxy: &dyn ProxySelector,
    cache_hint: Option<&str>,
) -> (BTreeMap<String, Decision>, Diagnostics) {
    let mut diagnostics = Diagnostics::new();
    let url = route(proxy, &capabilities_url(endpoint), cache_hint);
    debug!(endpoint, url = %url, layers = layers.len(), "fetching capabilities");

    let document = match fetcher.fetch_text(&url).await {
        Ok(xml) => CapabilitiesDocument::parse(&xml).map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };

    let decisions = match document {
        Ok(document) => filter_layers(endpoint, &document, layers, threshold, &mut diagnostics),
        Err(reason) => {
            diagnostics.push(DiagnosticEvent::CapabilityUnavailable {
                endpoint: endpoint.to_string(),
                reason,
            });
            layers
                .iter()
                .map(|layer| (layer.clone(), Decision::Excluded))
                .collect()
        }
    };

    (decisions, diagnostics)
}
