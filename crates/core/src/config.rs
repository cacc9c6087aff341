use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::paths::Paths;

/// Connection settings for the browser's remote debugging endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserConfig {
    #[serde(default = "default_debug_host")]
    pub debug_host: String,
    #[serde(default = "default_debug_port")]
    pub debug_port: u16,
    /// Dial the endpoint directly, ignoring any configured HTTP proxy.
    #[serde(default = "default_bypass_proxy")]
    pub bypass_proxy: bool,
    #[serde(default = "default_evaluate_timeout")]
    pub evaluate_timeout_secs: u64,
    #[serde(default = "default_list_timeout")]
    pub list_timeout_secs: u64,
}

fn default_debug_host() -> String {
    "127.0.0.1".to_string()
}

fn default_debug_port() -> u16 {
    9222
}

fn default_bypass_proxy() -> bool {
    true
}

fn default_evaluate_timeout() -> u64 {
    10
}

fn default_list_timeout() -> u64 {
    5
}

impl BrowserConfig {
    pub fn endpoint(&self) -> String {
        format!("http://{}:{}", self.debug_host, self.debug_port)
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            debug_host: default_debug_host(),
            debug_port: default_debug_port(),
            bypass_proxy: default_bypass_proxy(),
            evaluate_timeout_secs: default_evaluate_timeout(),
            list_timeout_secs: default_list_timeout(),
        }
    }
}

/// Everything that describes one chat application: which tab to pick,
/// what the message DOM looks like, and how to pace the reply polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatConfig {
    /// Substring a candidate tab URL must contain.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// URL segment marking a tab with an open conversation. Preferred
    /// over a plain base-URL match when both are present.
    #[serde(default = "default_conversation_marker")]
    pub conversation_marker: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Consecutive identical polls required before a reply counts as done.
    #[serde(default = "default_stable_threshold")]
    pub stable_threshold: u32,
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,
    /// Pause between injecting the input and clicking send, so the page's
    /// own reactive handlers see the change first.
    #[serde(default = "default_input_settle_ms")]
    pub input_settle_ms: u64,
    #[serde(default = "default_input_selector")]
    pub input_selector: String,
    #[serde(default = "default_send_button_selector")]
    pub send_button_selector: String,
    #[serde(default = "default_user_selector")]
    pub user_selector: String,
    #[serde(default = "default_assistant_selector")]
    pub assistant_selector: String,
    /// Rendered message body inside an assistant element.
    #[serde(default = "default_body_selector")]
    pub body_selector: String,
    #[serde(default = "default_user_bubble_selector")]
    pub user_bubble_selector: String,
}

fn default_base_url() -> String {
    "chatgpt.com".to_string()
}

fn default_conversation_marker() -> String {
    "/c/".to_string()
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_stable_threshold() -> u32 {
    3
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_input_settle_ms() -> u64 {
    300
}

fn default_input_selector() -> String {
    "#prompt-textarea".to_string()
}

fn default_send_button_selector() -> String {
    r#"button[data-testid="send-button"]"#.to_string()
}

fn default_user_selector() -> String {
    r#"[data-message-author-role="user"]"#.to_string()
}

fn default_assistant_selector() -> String {
    r#"[data-message-author-role="assistant"]"#.to_string()
}

fn default_body_selector() -> String {
    ".markdown".to_string()
}

fn default_user_bubble_selector() -> String {
    ".whitespace-pre-wrap".to_string()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            conversation_marker: default_conversation_marker(),
            poll_interval_ms: default_poll_interval_ms(),
            stable_threshold: default_stable_threshold(),
            default_timeout_secs: default_timeout_secs(),
            input_settle_ms: default_input_settle_ms(),
            input_selector: default_input_selector(),
            send_button_selector: default_send_button_selector(),
            user_selector: default_user_selector(),
            assistant_selector: default_assistant_selector(),
            body_selector: default_body_selector(),
            user_bubble_selector: default_user_bubble_selector(),
        }
    }
}

/// Settings for bootstrapping a debug-mode browser when none is running.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchConfig {
    /// Browser to launch: "chrome" or "edge".
    #[serde(default = "default_browser")]
    pub browser: String,
    #[serde(default = "default_start_url")]
    pub start_url: String,
    /// Profile directory. None uses a dedicated profile under the
    /// chatpilot base dir so the debug instance never collides with the
    /// user's normal browser profile.
    #[serde(default)]
    pub user_data_dir: Option<String>,
    #[serde(default = "default_ready_timeout")]
    pub ready_timeout_secs: u64,
}

fn default_browser() -> String {
    "chrome".to_string()
}

fn default_start_url() -> String {
    "https://chatgpt.com".to_string()
}

fn default_ready_timeout() -> u64 {
    10
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            browser: default_browser(),
            start_url: default_start_url(),
            user_data_dir: None,
            ready_timeout_secs: default_ready_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub launch: LaunchConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn load_or_default(paths: &Paths) -> Result<Self> {
        let config_path = paths.config_file();
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_sections() {
        let raw = r#"{ "browser": { "debugPort": 9333 } }"#;
        let cfg: Config = serde_json::from_str(raw).unwrap();
        assert_eq!(cfg.browser.debug_port, 9333);
        assert_eq!(cfg.browser.debug_host, "127.0.0.1");
        assert_eq!(cfg.chat.stable_threshold, 3);
        assert_eq!(cfg.chat.poll_interval_ms, 500);
        assert_eq!(cfg.launch.browser, "chrome");
    }

    #[test]
    fn test_endpoint_format() {
        let cfg = BrowserConfig::default();
        assert_eq!(cfg.endpoint(), "http://127.0.0.1:9222");
    }

    #[test]
    fn test_camel_case_round_trip() {
        let cfg = Config::default();
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(json.contains("conversationMarker"));
        assert!(json.contains("stableThreshold"));
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back.chat.base_url, cfg.chat.base_url);
    }
}
