pub mod config;
pub mod error;
pub mod node;
pub mod record;

pub use config::{load_dotenv, DiscoveryConfig, HttpConfig, ProxyConfig, SearchConfiguration};
pub use error::*;
pub use node::{CatalogGroup, CatalogItem, CatalogNode, ItemFields, ItemKind};
pub use record::{Organization, RawCatalogRecord, Rectangle, RecordError, Resource, SkippedField};
