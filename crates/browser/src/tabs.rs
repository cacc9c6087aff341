//! Tab discovery against the browser's debugging directory endpoint.
//!
//! The endpoint serves `GET /json` (one descriptor per open target) and
//! `GET /json/version` (liveness probe). Selection never retries: a miss
//! is reported to the caller, which owns any retry policy.

use std::time::Duration;

use chatpilot_core::{BrowserConfig, Error, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// One open page target as listed by the directory endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TabDescriptor {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "webSocketDebuggerUrl", default)]
    pub ws_url: Option<String>,
}

impl TabDescriptor {
    pub fn is_page(&self) -> bool {
        self.kind == "page"
    }
}

/// Client for the debugging directory endpoint.
pub struct TabRegistry {
    client: reqwest::Client,
    endpoint: String,
}

impl TabRegistry {
    pub fn new(config: &BrowserConfig) -> Result<Self> {
        let mut builder =
            reqwest::Client::builder().timeout(Duration::from_secs(config.list_timeout_secs));
        if config.bypass_proxy {
            builder = builder.no_proxy();
        }
        let client = builder
            .build()
            .map_err(|e| Error::Transport(format!("failed to build directory client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint(),
        })
    }

    /// Fetch all open targets, in listing order.
    pub async fn list(&self) -> Result<Vec<TabDescriptor>> {
        let url = format!("{}/json", self.endpoint);
        let tabs: Vec<TabDescriptor> = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("directory listing failed: {}", e)))?
            .json()
            .await
            .map_err(|e| Error::Transport(format!("malformed directory listing: {}", e)))?;
        debug!(count = tabs.len(), "listed debugging targets");
        Ok(tabs)
    }

    /// Liveness probe. Returns the browser's version descriptor.
    pub async fn version(&self) -> Result<Value> {
        let url = format!("{}/json/version", self.endpoint);
        self.client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("debug endpoint not reachable: {}", e)))?
            .json()
            .await
            .map_err(|e| Error::Transport(format!("malformed version reply: {}", e)))
    }
}

/// Pick the chat tab from a listing.
///
/// A page whose URL contains both the base URL and the conversation marker
/// wins immediately; otherwise the first page matching just the base URL
/// is used. Scan order is listing order.
pub fn find_chat_tab<'a>(
    tabs: &'a [TabDescriptor],
    base_url: &str,
    conversation_marker: &str,
) -> Option<&'a TabDescriptor> {
    let mut fallback = None;
    for tab in tabs {
        if !tab.is_page() || !tab.url.contains(base_url) {
            continue;
        }
        if tab.url.contains(conversation_marker) {
            return Some(tab);
        }
        if fallback.is_none() {
            fallback = Some(tab);
        }
    }
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tab(kind: &str, url: &str) -> TabDescriptor {
        TabDescriptor {
            id: String::new(),
            kind: kind.to_string(),
            url: url.to_string(),
            title: String::new(),
            ws_url: Some("ws://127.0.0.1:9222/devtools/page/x".to_string()),
        }
    }

    #[test]
    fn test_conversation_tab_beats_earlier_base_match() {
        let tabs = vec![
            tab("page", "https://chatgpt.com/"),
            tab("page", "https://chatgpt.com/c/abc123"),
        ];
        let found = find_chat_tab(&tabs, "chatgpt.com", "/c/").unwrap();
        assert_eq!(found.url, "https://chatgpt.com/c/abc123");
    }

    #[test]
    fn test_first_base_match_wins_without_conversation() {
        let tabs = vec![
            tab("page", "https://example.com/"),
            tab("page", "https://chatgpt.com/first"),
            tab("page", "https://chatgpt.com/second"),
        ];
        let found = find_chat_tab(&tabs, "chatgpt.com", "/c/").unwrap();
        assert_eq!(found.url, "https://chatgpt.com/first");
    }

    #[test]
    fn test_non_page_targets_never_match() {
        let tabs = vec![
            tab("service_worker", "https://chatgpt.com/c/abc"),
            tab("iframe", "https://chatgpt.com/"),
        ];
        assert!(find_chat_tab(&tabs, "chatgpt.com", "/c/").is_none());
    }

    #[test]
    fn test_no_match_is_none() {
        let tabs = vec![tab("page", "https://news.example.org/")];
        assert!(find_chat_tab(&tabs, "chatgpt.com", "/c/").is_none());
    }

    fn config_for(server_uri: &str) -> BrowserConfig {
        // MockServer URIs look like http://127.0.0.1:PORT
        let port = server_uri.rsplit(':').next().unwrap().parse().unwrap();
        BrowserConfig {
            debug_host: "127.0.0.1".to_string(),
            debug_port: port,
            ..BrowserConfig::default()
        }
    }

    #[tokio::test]
    async fn test_list_deserializes_directory_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"[
                    {
                        "id": "A1",
                        "type": "page",
                        "url": "https://chatgpt.com/c/abc",
                        "title": "ChatGPT",
                        "webSocketDebuggerUrl": "ws://127.0.0.1:9222/devtools/page/A1"
                    },
                    {
                        "id": "B2",
                        "type": "background_page",
                        "url": "chrome-extension://x",
                        "title": "ext"
                    }
                ]"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let registry = TabRegistry::new(&config_for(&server.uri())).unwrap();
        let tabs = registry.list().await.unwrap();
        assert_eq!(tabs.len(), 2);
        assert!(tabs[0].is_page());
        assert_eq!(
            tabs[0].ws_url.as_deref(),
            Some("ws://127.0.0.1:9222/devtools/page/A1")
        );
        assert!(tabs[1].ws_url.is_none());
    }

    #[tokio::test]
    async fn test_version_probe() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/version"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"Browser": "Chrome/120.0.0.0", "Protocol-Version": "1.3"}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let registry = TabRegistry::new(&config_for(&server.uri())).unwrap();
        let version = registry.version().await.unwrap();
        assert_eq!(version["Browser"], "Chrome/120.0.0.0");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_failure() {
        let server = MockServer::start().await;
        let config = config_for(&server.uri());
        drop(server);

        let registry = TabRegistry::new(&config).unwrap();
        let err = registry.list().await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }
}
