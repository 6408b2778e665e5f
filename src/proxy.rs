//! Proxy URL rewriting
//!
//! Every media and subtitle URL handed back to callers is routed through a
//! proxy origin. The proxy itself lives outside this crate; this module only
//! knows how to address it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// Outbound request headers, kept sorted so rewritten URLs are deterministic
pub type OutboundHeaders = BTreeMap<String, String>;

/// Rewrites upstream URLs so they are fetched through a proxy
///
/// Implementors must be deterministic: the same url and headers must always
/// produce the same proxied URL, since results are deduplicated on it.
pub trait ProxyUrlBuilder: Send + Sync {
    /// Returns the proxied form of `url`, which the proxy will fetch using `headers`
    fn create_proxy_url(&self, url: &str, headers: &OutboundHeaders) -> String;
}

/// The upstream request a proxied URL stands for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyRequest {
    /// Upstream URL to fetch
    pub url: String,
    /// Headers to send upstream
    pub headers: OutboundHeaders,
}

/// Proxy addressing scheme that packs the upstream request into a query parameter
///
/// Produces `<base>/v1/proxy?data=<urlencoded JSON ProxyRequest>`.
#[derive(Debug, Clone)]
pub struct QueryProxy {
    endpoint: Url,
}

impl QueryProxy {
    /// Path of the proxy endpoint below the proxy origin
    pub const PATH: &'static str = "/v1/proxy";

    /// Creates a proxy builder for the given proxy origin
    pub fn new(base_url: &Url) -> Self {
        let mut endpoint = base_url.clone();
        let path = format!("{}{}", base_url.path().trim_end_matches('/'), Self::PATH);
        endpoint.set_path(&path);
        endpoint.set_query(None);
        endpoint.set_fragment(None);
        Self { endpoint }
    }

    /// Recovers the upstream request from a URL produced by this builder
    pub fn parse(&self, proxied: &str) -> Option<ProxyRequest> {
        let proxied = Url::parse(proxied).ok()?;
        if proxied.path() != self.endpoint.path() {
            return None;
        }
        let (_, data) = proxied.query_pairs().find(|(key, _)| key == "data")?;
        serde_json::from_str(&data).ok()
    }
}

impl ProxyUrlBuilder for QueryProxy {
    fn create_proxy_url(&self, url: &str, headers: &OutboundHeaders) -> String {
        let data = serde_json::json!({
            "url": url,
            "headers": headers,
        });

        let mut proxied = self.endpoint.clone();
        proxied
            .query_pairs_mut()
            .append_pair("data", &data.to_string());
        proxied.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers() -> OutboundHeaders {
        OutboundHeaders::from([
            ("Referer".to_string(), "https://mirror.example/".to_string()),
            ("User-Agent".to_string(), "test-agent".to_string()),
        ])
    }

    #[test]
    fn test_create_proxy_url_round_trips_request() {
        let proxy = QueryProxy::new(&Url::parse("http://localhost:3000").unwrap());
        let proxied =
            proxy.create_proxy_url("https://cdn.example/a b/index.m3u8?x=1&y=2", &headers());

        assert!(proxied.starts_with("http://localhost:3000/v1/proxy?data="));

        let request = proxy.parse(&proxied).unwrap();
        assert_eq!(request.url, "https://cdn.example/a b/index.m3u8?x=1&y=2");
        assert_eq!(request.headers, headers());
    }

    #[test]
    fn test_create_proxy_url_is_deterministic() {
        let proxy = QueryProxy::new(&Url::parse("http://localhost:3000/").unwrap());
        let mut reversed = OutboundHeaders::new();
        reversed.insert("User-Agent".to_string(), "test-agent".to_string());
        reversed.insert("Referer".to_string(), "https://mirror.example/".to_string());

        assert_eq!(
            proxy.create_proxy_url("https://cdn.example/x.vtt", &headers()),
            proxy.create_proxy_url("https://cdn.example/x.vtt", &reversed)
        );
    }

    #[test]
    fn test_new_keeps_base_path_and_drops_query() {
        let base = Url::parse("https://edge.example/scout/?token=1#top").unwrap();
        let proxy = QueryProxy::new(&base);
        let proxied = proxy.create_proxy_url("https://cdn.example/x", &OutboundHeaders::new());

        assert!(proxied.starts_with("https://edge.example/scout/v1/proxy?data="));
        assert!(!proxied.contains("token"));
    }

    #[test]
    fn test_parse_rejects_foreign_urls() {
        let proxy = QueryProxy::new(&Url::parse("http://localhost:3000").unwrap());
        assert!(proxy.parse("http://localhost:3000/other?data=%7B%7D").is_none());
        assert!(proxy.parse("not a url").is_none());
        assert!(proxy.parse("http://localhost:3000/v1/proxy").is_none());
    }
}
