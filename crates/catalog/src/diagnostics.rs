//! Typed diagnostic events returned alongside a discovery result.
//!
//! Nothing here is an error: every event describes something that was
//! skipped or excluded while the run carried on. Each event is also
//! emitted through `tracing` when recorded.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DiagnosticEvent {
    /// The record's title is blacklisted; it contributed nothing.
    BlacklistedRecord { title: String },
    /// One of the record's groups is blacklisted; items skip that group.
    BlacklistedGroup { record: String, group: String },
    /// A search result could not be normalized and was skipped.
    MalformedRecord { index: usize, reason: String },
    /// A field or list element of a record had the wrong shape and was
    /// dropped; the rest of the record was kept.
    MalformedField {
        record: String,
        field: String,
        reason: String,
    },
    /// A WMS / Esri REST resource had no usable URL.
    MissingResourceUrl { record: String, format: String },
    /// The geographic coverage string was not four numbers.
    MalformedCoverage {
        record: String,
        coverage: String,
        reason: String,
    },
    /// An endpoint's GetCapabilities could not be fetched or parsed.
    CapabilityUnavailable { endpoint: String, reason: String },
    /// A capability layer matched but its scale ceiling is below the threshold.
    ScaleExcluded {
        endpoint: String,
        layer: String,
        max_scale_denominator: f64,
        threshold: f64,
    },
    /// A resource was left out of the tree by capability validation.
    CapabilityExcluded {
        record: String,
        endpoint: String,
        layer: String,
    },
}

impl DiagnosticEvent {
    fn log(&self) {
        match self {
            DiagnosticEvent::BlacklistedRecord { title } => {
                tracing::debug!(title = %title, "skipping blacklisted record");
            }
            DiagnosticEvent::BlacklistedGroup { record, group } => {
                tracing::debug!(record = %record, group = %group, "skipping blacklisted group");
            }
            DiagnosticEvent::MalformedRecord { index, reason } => {
                tracing::warn!(index, reason = %reason, "skipping malformed search result");
            }
            DiagnosticEvent::MalformedField {
                record,
                field,
                reason,
            } => {
                tracing::debug!(record = %record, field = %field, reason = %reason, "dropping malformed field");
            }
            DiagnosticEvent::MissingResourceUrl { record, format } => {
                tracing::debug!(record = %record, format = %format, "resource has no URL");
            }
            DiagnosticEvent::MalformedCoverage {
                record,
                coverage,
                reason,
            } => {
                tracing::debug!(record = %record, coverage = %coverage, reason = %reason, "ignoring coverage");
            }
            DiagnosticEvent::CapabilityUnavailable { endpoint, reason } => {
                tracing::warn!(endpoint = %endpoint, reason = %reason, "capabilities unavailable, excluding its layers");
            }
            DiagnosticEvent::ScaleExcluded {
                endpoint,
                layer,
                max_scale_denominator,
                threshold,
            } => {
                tracing::info!(
                    endpoint = %endpoint,
                    layer = %layer,
                    max_scale_denominator,
                    threshold,
                    "layer excluded by MaxScaleDenominator"
                );
            }
            DiagnosticEvent::CapabilityExcluded {
                record,
                endpoint,
                layer,
            } => {
                tracing::debug!(record = %record, endpoint = %endpoint, layer = %layer, "resource excluded by capability check");
            }
        }
    }
}

/// Ordered collector of [`DiagnosticEvent`]s.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    events: Vec<DiagnosticEvent>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: DiagnosticEvent) {
        event.log();
        self.events.push(event);
    }

    /// Append events already logged by another collector.
    pub fn append(&mut self, other: Diagnostics) {
        self.events.extend(other.events);
    }

    pub fn events(&self) -> &[DiagnosticEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<DiagnosticEvent> {
        self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
