//! Discovery of map layers published through a CKAN-style catalog.
//!
//! A run searches the repository with one or more filter queries,
//! optionally checks WMS layers against each server's GetCapabilities,
//! and adds the surviving layers to a caller-owned catalog tree.

pub mod capabilities;
pub mod diagnostics;
pub mod discovery;
pub mod endpoint;
pub mod error;
pub mod fetch;
pub mod proxy;
pub mod tree;

pub use capabilities::{
    filter_layers, group_wms_layers, validate_layers, CapabilitiesDocument, CapabilityError,
    CapabilityLayer, Decision, FilterDecisions, ValidationOutcome,
};
pub use diagnostics::{DiagnosticEvent, Diagnostics};
pub use discovery::{CatalogDiscovery, DiscoveryReport, SearchResults};
pub use endpoint::ServerLayerKey;
pub use error::{DiscoveryError, FetchError};
pub use fetch::{Fetcher, HttpFetcher};
pub use proxy::{CorsProxy, NoProxy, ProxySelector};
pub use tree::{build_tree, describe, BuildSummary, TreeBuilder};
