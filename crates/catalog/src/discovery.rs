//! Top-level discovery run: search fan-out, optional capability
//! validation, then tree assembly.
//!
//! The caller's root group is only touched once every fetch for the run
//! has settled, and not at all when the run fails.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use mapcat_core::{CatalogGroup, DiscoveryConfig, RawCatalogRecord, SearchConfiguration};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::capabilities::{validate_layers, FilterDecisions};
use crate::diagnostics::{DiagnosticEvent, Diagnostics};
use crate::endpoint::search_url;
use crate::error::{DiscoveryError, FetchError};
use crate::fetch::{Fetcher, HttpFetcher};
use crate::proxy::{self, route, ProxySelector};
use crate::tree::build_tree;

/// Outcome of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    /// Search results received across all filter queries.
    pub records: usize,
    /// WMS endpoints whose capabilities were checked.
    pub endpoints_checked: usize,
    pub items_created: usize,
    pub groups_created: usize,
    pub diagnostics: Vec<DiagnosticEvent>,
}

/// Records merged from every filter query, in declaration order.
#[derive(Debug, Default)]
pub struct SearchResults {
    pub records: Vec<RawCatalogRecord>,
    pub diagnostics: Diagnostics,
}

/// Runs discovery against one CKAN-style repository.
#[derive(Clone)]
pub struct CatalogDiscovery {
    fetcher: Arc<dyn Fetcher>,
    proxy: Arc<dyn ProxySelector>,
    cache_hint: Option<String>,
}

impl CatalogDiscovery {
    pub fn new(fetcher: Arc<dyn Fetcher>, proxy: Arc<dyn ProxySelector>) -> Self {
        Self {
            fetcher,
            proxy,
            cache_hint: None,
        }
    }

    /// Cache duration passed to the proxy when a request is rewritten.
    pub fn with_cache_hint(mut self, hint: impl Into<String>) -> Self {
        self.cache_hint = Some(hint.into()).filter(|h| !h.is_empty());
        self
    }

    /// HTTP fetcher and proxy selector as described by `config`.
    pub fn from_config(config: &DiscoveryConfig) -> Result<Self, FetchError> {
        let fetcher = HttpFetcher::new(&config.http)?;
        Ok(Self::new(Arc::new(fetcher), proxy::from_config(&config.proxy))
            .with_cache_hint(config.proxy.cache_hint.clone()))
    }

    /// Run every filter query concurrently and merge their results.
    ///
    /// All queries are awaited; if any failed, the first failure in
    /// declaration order is returned.
    pub async fn search(&self, config: &SearchConfiguration) -> Result<SearchResults, DiscoveryError> {
        if config.url.trim().is_empty() {
            return Err(DiscoveryError::InvalidConfiguration(
                "search URL must not be empty".to_string(),
            ));
        }

        let urls: Vec<String> = config
            .filter_query
            .iter()
            .map(|query| search_url(&config.url, query))
            .collect();
        let fetches = urls.iter().map(|url| self.fetch_results(url));
        let responses = join_all(fetches).await;

        let mut pages = Vec::with_capacity(responses.len());
        for (url, response) in urls.iter().zip(responses) {
            match response {
                Ok(page) => pages.push(page),
                Err(source) => {
                    warn!(url = %url, error = %source, "search query failed");
                    return Err(DiscoveryError::UpstreamUnavailable {
                        url: url.clone(),
                        source,
                    });
                }
            }
        }

        let mut results = SearchResults::default();
        for (index, value) in pages.into_iter().flatten().enumerate() {
            match RawCatalogRecord::from_json(&value) {
                Ok(record) => {
                    for skipped in &record.skipped {
                        results.diagnostics.push(DiagnosticEvent::MalformedField {
                            record: record.title.clone(),
                            field: skipped.field.clone(),
                            reason: skipped.reason.clone(),
                        });
                    }
                    results.records.push(record);
                }
                Err(e) => results.diagnostics.push(DiagnosticEvent::MalformedRecord {
                    index,
                    reason: e.to_string(),
                }),
            }
        }
        Ok(results)
    }

    /// Discover layers and add them to `root`.
    pub async fn run(
        &self,
        config: &SearchConfiguration,
        root: &mut CatalogGroup,
    ) -> Result<DiscoveryReport, DiscoveryError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();
        info!(%run_id, url = %config.url, queries = config.filter_query.len(), "discovery started");

        let SearchResults {
            records,
            mut diagnostics,
        } = self.search(config).await?;

        let mut endpoints_checked = 0;
        let decisions = if config.filter_by_capabilities && config.include_wms {
            let outcome = validate_layers(
                &records,
                config.effective_scale_threshold(),
                self.fetcher.as_ref(),
                self.proxy.as_ref(),
                self.cache_hint.as_deref(),
            )
            .await;
            endpoints_checked = outcome.endpoints;
            diagnostics.append(outcome.diagnostics);
            outcome.decisions
        } else {
            FilterDecisions::new()
        };

        let summary = build_tree(&records, config, &decisions, root, &mut diagnostics);

        let report = DiscoveryReport {
            run_id,
            started_at,
            elapsed_ms: start.elapsed().as_millis() as u64,
            records: records.len(),
            endpoints_checked,
            items_created: summary.items_created,
            groups_created: summary.groups_created,
            diagnostics: diagnostics.into_events(),
        };
        info!(
            %run_id,
            records = report.records,
            items = report.items_created,
            groups = report.groups_created,
            diagnostics = report.diagnostics.len(),
            elapsed_ms = report.elapsed_ms,
            "discovery complete"
        );
        Ok(report)
    }

    async fn fetch_results(&self, url: &str) -> Result<Vec<Value>, FetchError> {
        let routed = route(self.proxy.as_ref(), url, self.cache_hint.as_deref());
        let mut body = self.fetcher.fetch_json(&routed).await?;
        match body.pointer_mut("/result/results").map(Value::take) {
            Some(Value::Array(results)) => Ok(results),
            _ => Err(FetchError::Decode {
                url: routed,
                message: "response has no result.results array".to_string(),
            }),
        }
    }
}
