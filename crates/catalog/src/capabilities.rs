//! Cross-validation of WMS layers against each server's GetCapabilities.
//!
//! The coordinator groups WMS resources by endpoint, fetches one
//! capabilities document per endpoint, and produces [`FilterDecisions`]
//! for the tree builder. Resources are never mutated.

mod coordinator;
mod document;
mod filter;

#[cfg(test)]
mod tests;

use std::collections::HashMap;

use serde::Serialize;

use crate::endpoint::ServerLayerKey;

pub use coordinator::{group_wms_layers, validate_layers, ValidationOutcome};
pub use document::{CapabilitiesDocument, CapabilityError, CapabilityLayer};
pub use filter::filter_layers;

/// Whether a server layer may appear in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Included,
    Excluded,
}

/// Per-layer decisions for every WMS resource that was evaluated.
///
/// Keys that were never evaluated have no entry and count as included.
#[derive(Debug, Clone, Default)]
pub struct FilterDecisions {
    decisions: HashMap<ServerLayerKey, Decision>,
}

impl FilterDecisions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: ServerLayerKey, decision: Decision) {
        self.decisions.insert(key, decision);
    }

    pub fn get(&self, key: &ServerLayerKey) -> Option<Decision> {
        self.decisions.get(key).copied()
    }

    pub fn is_excluded(&self, key: &ServerLayerKey) -> bool {
        self.get(key) == Some(Decision::Excluded)
    }

    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }

    pub fn included_count(&self) -> usize {
        self.decisions
            .values()
            .filter(|d| **d == Decision::Included)
            .count()
    }
}
