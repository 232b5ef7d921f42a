use std::collections::{BTreeMap, HashSet};
use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// ── Top-level config ──────────────────────────────────────────

/// Everything one discovery run needs: what to search, how to fetch, and
/// whether requests go through a CORS proxy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default)]
    pub search: SearchConfiguration,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
}

impl DiscoveryConfig {
    /// Parse config from a TOML string, then apply env overrides and validate.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(toml_str)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Read a file and apply env overrides without validating, so callers
    /// can layer further overrides before calling [`validate`](Self::validate).
    pub fn read_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let mut config: Self = toml::from_str(&content)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Build config from environment variables alone (call `load_dotenv()` first).
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Profile is read from `MAPCAT_PROFILE`. When set (e.g. `PROD`), every
    /// key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn apply_env_overrides(&mut self) {
        let profile = env_opt("MAPCAT_PROFILE")
            .unwrap_or_default()
            .to_uppercase();
        self.apply_overrides(|key| profiled_env_opt(&profile, key));
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Keys:
    /// - `MAPCAT_SEARCH_URL` -> `search.url`
    /// - `MAPCAT_SEARCH_FILTER_QUERY` -> `search.filter_query` (`|`-separated)
    /// - `MAPCAT_DATA_CUSTODIAN` -> `search.data_custodian`
    /// - `MAPCAT_MIN_SCALE_DENOMINATOR` -> `search.minimum_max_scale_denominator`
    /// - `MAPCAT_FILTER_BY_CAPABILITIES` -> `search.filter_by_capabilities`
    /// - `MAPCAT_HTTP_TIMEOUT_SECS` -> `http.timeout_secs`
    /// - `MAPCAT_PROXY_URL` -> `proxy.url`
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("MAPCAT_SEARCH_URL") {
            self.search.url = v;
        }
        if let Some(v) = lookup("MAPCAT_SEARCH_FILTER_QUERY") {
            self.search.filter_query = v
                .split('|')
                .map(str::trim)
                .filter(|q| !q.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = lookup("MAPCAT_DATA_CUSTODIAN") {
            self.search.data_custodian = Some(v);
        }
        if let Some(v) = lookup("MAPCAT_MIN_SCALE_DENOMINATOR") {
            match v.trim().parse::<f64>() {
                Ok(scale) => self.search.minimum_max_scale_denominator = Some(scale),
                Err(_) => tracing::warn!(value = %v, "ignoring unparseable MAPCAT_MIN_SCALE_DENOMINATOR"),
            }
        }
        if let Some(v) = lookup("MAPCAT_FILTER_BY_CAPABILITIES") {
            match parse_bool(&v) {
                Some(flag) => self.search.filter_by_capabilities = flag,
                None => tracing::warn!(value = %v, "ignoring unparseable MAPCAT_FILTER_BY_CAPABILITIES"),
            }
        }
        if let Some(v) = lookup("MAPCAT_HTTP_TIMEOUT_SECS") {
            if let Ok(secs) = v.trim().parse::<u64>() {
                self.http.timeout_secs = secs;
            }
        }
        if let Some(v) = lookup("MAPCAT_PROXY_URL") {
            self.proxy.url = Some(v);
        }
    }

    /// Check the preconditions a discovery run relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.search.url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "search.url must not be empty".to_string(),
            ));
        }
        if let Some(scale) = self.search.minimum_max_scale_denominator {
            if !scale.is_finite() || scale < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "search.minimum_max_scale_denominator must be a non-negative number, got {scale}"
                )));
            }
        }
        if self.http.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "http.timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  search:  url={}, queries={}", self.search.url, self.search.filter_query.len());
        tracing::info!(
            "  filter:  capabilities={}, min_scale={}",
            self.search.filter_by_capabilities,
            self.search
                .effective_scale_threshold()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "(none)".to_string())
        );
        tracing::info!("  http:    timeout={}s", self.http.timeout_secs);
        tracing::info!("  proxy:   url={}", self.proxy.url.as_deref().unwrap_or("(none)"));
    }
}

// ── Search ────────────────────────────────────────────────────

/// Immutable per-run search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfiguration {
    /// Base URL of the CKAN-style repository.
    pub url: String,
    /// One upstream query-string fragment per parallel search, passed through verbatim.
    pub filter_query: Vec<String>,
    /// Record titles and group names to leave out of the tree.
    pub blacklist: HashSet<String>,
    /// Layers whose `MaxScaleDenominator` is below this are excluded.
    pub minimum_max_scale_denominator: Option<f64>,
    /// Cross-validate WMS layers against each server's GetCapabilities.
    pub filter_by_capabilities: bool,
    /// Overrides the custodian derived from each record's organization.
    pub data_custodian: Option<String>,
    /// Extra parameters applied to every created map-service item.
    pub parameters: BTreeMap<String, String>,
    pub include_wms: bool,
    pub include_esri_rest: bool,
}

impl Default for SearchConfiguration {
    fn default() -> Self {
        Self {
            url: String::new(),
            filter_query: Vec::new(),
            blacklist: HashSet::new(),
            minimum_max_scale_denominator: None,
            filter_by_capabilities: false,
            data_custodian: None,
            parameters: BTreeMap::new(),
            include_wms: true,
            include_esri_rest: true,
        }
    }
}

impl SearchConfiguration {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// The scale threshold, which only applies while cross-validation is on.
    pub fn effective_scale_threshold(&self) -> Option<f64> {
        if self.filter_by_capabilities {
            self.minimum_max_scale_denominator
        } else {
            None
        }
    }

    pub fn is_blacklisted(&self, name: &str) -> bool {
        self.blacklist.contains(name)
    }
}

// ── HTTP ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: concat!("mapcat/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

// ── Proxy ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Proxy base URL, e.g. `https://maps.example.org/proxy`. `None` disables proxying.
    pub url: Option<String>,
    /// Hosts known to serve CORS headers; requests to them go direct.
    pub cors_domains: Vec<String>,
    /// How long the proxy may cache upstream responses (e.g. `1d`).
    pub cache_hint: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            url: None,
            cors_domains: Vec::new(),
            cache_hint: "1d".to_string(),
        }
    }
}
