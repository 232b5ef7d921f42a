//! Proxy selection for upstreams that do not send CORS headers.

use std::sync::Arc;

use mapcat_core::ProxyConfig;

/// Decides whether a URL must be fetched through a proxy, and how.
pub trait ProxySelector: Send + Sync {
    fn should_proxy(&self, url: &str) -> bool;

    fn rewrite(&self, url: &str, cache_hint: Option<&str>) -> String;
}

/// Apply `proxy` to `url` when it asks for it.
pub fn route(proxy: &dyn ProxySelector, url: &str, cache_hint: Option<&str>) -> String {
    if proxy.should_proxy(url) {
        proxy.rewrite(url, cache_hint)
    } else {
        url.to_string()
    }
}

/// Build the selector described by a [`ProxyConfig`].
pub fn from_config(config: &ProxyConfig) -> Arc<dyn ProxySelector> {
    match config.url.as_deref().filter(|u| !u.trim().is_empty()) {
        Some(proxy_url) => Arc::new(CorsProxy::new(proxy_url, config.cors_domains.clone())),
        None => Arc::new(NoProxy),
    }
}

/// Every request goes direct.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProxy;

impl ProxySelector for NoProxy {
    fn should_proxy(&self, _url: &str) -> bool {
        false
    }

    fn rewrite(&self, url: &str, _cache_hint: Option<&str>) -> String {
        url.to_string()
    }
}

/// Proxies every absolute URL whose host is not a known CORS domain.
///
/// Rewritten form: `{proxy}/_{cache_hint}/{url}`, or `{proxy}/{url}` without a hint.
#[derive(Debug, Clone)]
pub struct CorsProxy {
    proxy_url: String,
    cors_domains: Vec<String>,
}

impl CorsProxy {
    pub fn new(proxy_url: impl Into<String>, cors_domains: Vec<String>) -> Self {
        let proxy_url = proxy_url.into().trim_end_matches('/').to_string();
        let cors_domains = cors_domains
            .into_iter()
            .map(|d| d.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|d| !d.is_empty())
            .collect();
        Self {
            proxy_url,
            cors_domains,
        }
    }

    fn is_cors_domain(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.cors_domains
            .iter()
            .any(|d| host == *d || host.ends_with(&format!(".{d}")))
    }
}

impl ProxySelector for CorsProxy {
    fn should_proxy(&self, url: &str) -> bool {
        if url.starts_with(&self.proxy_url) {
            return false;
        }
        // Relative or unparseable URLs are same-origin.
        match url::Url::parse(url) {
            Ok(parsed) => match parsed.host_str() {
                Some(host) => !self.is_cors_domain(host),
                None => false,
            },
            Err(_) => false,
        }
    }

    fn rewrite(&self, url: &str, cache_hint: Option<&str>) -> String {
        match cache_hint.filter(|h| !h.is_empty()) {
            Some(hint) => format!("{}/_{}/{}", self.proxy_url, hint, url),
            None => format!("{}/{}", self.proxy_url, url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proxy() -> CorsProxy {
        CorsProxy::new(
            "https://maps.example.org/proxy/",
            vec!["data.example.org".to_string(), ".gov.example".to_string()],
        )
    }

    #[test]
    fn cors_domains_go_direct() {
        let p = proxy();
        assert!(!p.should_proxy("https://data.example.org/api/3/action/package_search"));
        assert!(!p.should_proxy("http://maps.agency.gov.example/wms"));
        assert!(p.should_proxy("http://other.example.com/wms"));
        assert!(!p.should_proxy("/relative/path"));
    }

    #[test]
    fn proxy_urls_are_not_proxied_twice() {
        let p = proxy();
        let once = route(&p, "http://other.example.com/wms", Some("1d"));
        assert_eq!(once, "https://maps.example.org/proxy/_1d/http://other.example.com/wms");
        assert_eq!(route(&p, &once, Some("1d")), once);
    }

    #[test]
    fn rewrite_without_hint() {
        assert_eq!(
            proxy().rewrite("http://s/wms", None),
            "https://maps.example.org/proxy/http://s/wms"
        );
    }

    #[test]
    fn config_without_url_never_proxies() {
        let selector = from_config(&ProxyConfig::default());
        assert!(!selector.should_proxy("http://other.example.com/wms"));
        assert_eq!(route(selector.as_ref(), "http://s/wms", Some("1d")), "http://s/wms");
    }
}
