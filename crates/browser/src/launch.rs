//! Debug-mode browser bootstrap.
//!
//! Starts Chrome or Edge with remote debugging enabled when no endpoint
//! is listening yet, using a dedicated profile directory so the debug
//! instance never touches the user's normal profile. The spawned browser
//! deliberately outlives this process.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use chatpilot_core::{BrowserConfig, Error, LaunchConfig, Paths, Result};
use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::tabs::TabRegistry;

/// Supported browser engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserKind {
    Chrome,
    Edge,
}

impl BrowserKind {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "edge" | "msedge" => Self::Edge,
            _ => Self::Chrome,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Chrome => "chrome",
            Self::Edge => "edge",
        }
    }
}

/// Find a browser binary on the system for the given engine.
pub fn find_browser_binary(kind: BrowserKind) -> Option<String> {
    let candidates = match kind {
        BrowserKind::Chrome => {
            if cfg!(target_os = "macos") {
                vec![
                    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
                    "/Applications/Chromium.app/Contents/MacOS/Chromium",
                ]
            } else if cfg!(target_os = "linux") {
                vec![
                    "google-chrome",
                    "google-chrome-stable",
                    "chromium",
                    "chromium-browser",
                    "/usr/bin/google-chrome",
                    "/usr/bin/chromium",
                ]
            } else {
                vec![
                    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
                    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
                ]
            }
        }
        BrowserKind::Edge => {
            if cfg!(target_os = "macos") {
                vec!["/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge"]
            } else if cfg!(target_os = "linux") {
                vec![
                    "microsoft-edge",
                    "microsoft-edge-stable",
                    "/usr/bin/microsoft-edge",
                ]
            } else {
                vec![
                    r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
                    r"C:\Program Files\Microsoft\Edge\Application\msedge.exe",
                ]
            }
        }
    };

    for candidate in candidates {
        if std::path::Path::new(candidate).exists() {
            return Some(candidate.to_string());
        }
        if !candidate.contains('/') && !candidate.contains('\\') && which::which(candidate).is_ok()
        {
            return Some(candidate.to_string());
        }
    }
    None
}

/// Command line for a debug-mode launch.
fn build_launch_args(
    debug_port: u16,
    user_data_dir: &std::path::Path,
    start_url: &str,
) -> Vec<String> {
    vec![
        format!("--remote-debugging-port={}", debug_port),
        "--remote-allow-origins=*".to_string(),
        format!("--user-data-dir={}", user_data_dir.display()),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
        start_url.to_string(),
    ]
}

fn profile_dir(launch: &LaunchConfig, kind: BrowserKind) -> PathBuf {
    match &launch.user_data_dir {
        Some(dir) => PathBuf::from(dir),
        None => Paths::new()
            .profiles_dir()
            .join(format!("{}-debug", kind.name())),
    }
}

/// Launch a debug-mode browser and wait for the endpoint to answer.
///
/// If the endpoint is already live nothing is spawned and `None` is
/// returned; the running instance is reused.
pub async fn ensure_running(
    launch: &LaunchConfig,
    browser: &BrowserConfig,
) -> Result<Option<Child>> {
    let registry = TabRegistry::new(browser)?;
    if registry.version().await.is_ok() {
        info!(endpoint = %browser.endpoint(), "debug endpoint already running");
        return Ok(None);
    }

    let kind = BrowserKind::from_str(&launch.browser);
    let binary = find_browser_binary(kind).ok_or_else(|| {
        Error::Launch(format!("{} not found on this system", kind.name()))
    })?;

    let user_data_dir = profile_dir(launch, kind);
    std::fs::create_dir_all(&user_data_dir)
        .map_err(|e| Error::Launch(format!("failed to create profile dir: {}", e)))?;

    let args = build_launch_args(browser.debug_port, &user_data_dir, &launch.start_url);
    info!(
        browser = kind.name(),
        port = browser.debug_port,
        url = %launch.start_url,
        "launching debug-mode browser"
    );
    debug!(binary = %binary, ?args, "spawn");

    // The browser must keep running after this process exits.
    let child = Command::new(&binary)
        .args(&args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| Error::Launch(format!("failed to launch {}: {}", kind.name(), e)))?;

    wait_ready(&registry, launch.ready_timeout_secs).await?;
    Ok(Some(child))
}

/// Poll the version probe until the endpoint answers.
async fn wait_ready(registry: &TabRegistry, timeout_secs: u64) -> Result<()> {
    let attempts = timeout_secs.max(1);
    for attempt in 0..attempts {
        tokio::time::sleep(Duration::from_secs(1)).await;
        if registry.version().await.is_ok() {
            debug!(attempt, "debug endpoint ready");
            return Ok(());
        }
    }
    Err(Error::Launch(format!(
        "debug endpoint not ready after {}s",
        attempts
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_str() {
        assert_eq!(BrowserKind::from_str("edge"), BrowserKind::Edge);
        assert_eq!(BrowserKind::from_str("msedge"), BrowserKind::Edge);
        assert_eq!(BrowserKind::from_str("chrome"), BrowserKind::Chrome);
        assert_eq!(BrowserKind::from_str("anything"), BrowserKind::Chrome);
    }

    #[test]
    fn test_launch_args_include_debug_flags() {
        let args = build_launch_args(9222, std::path::Path::new("/tmp/profile"), "https://chatgpt.com");
        assert!(args.contains(&"--remote-debugging-port=9222".to_string()));
        assert!(args.contains(&"--remote-allow-origins=*".to_string()));
        assert!(args.iter().any(|a| a.starts_with("--user-data-dir=")));
        assert_eq!(args.last().unwrap(), "https://chatgpt.com");
    }

    #[test]
    fn test_explicit_profile_dir_wins() {
        let launch = LaunchConfig {
            user_data_dir: Some("/tmp/custom".to_string()),
            ..LaunchConfig::default()
        };
        assert_eq!(profile_dir(&launch, BrowserKind::Edge), PathBuf::from("/tmp/custom"));
    }
}
