use chatpilot_browser::{find_chat_tab, TabRegistry};
use chatpilot_core::{Config, Paths};

pub async fn run() -> anyhow::Result<()> {
    let paths = Paths::new();

    println!("chatpilot status");
    println!("================");
    println!();

    let config_path = paths.config_file();
    println!(
        "Config:   {} {}",
        config_path.display(),
        if config_path.exists() {
            "✓"
        } else {
            "✗ (not found, using defaults)"
        }
    );

    let config = Config::load_or_default(&paths)?;
    println!("Endpoint: {}", config.browser.endpoint());
    println!("Chat URL: {}", config.chat.base_url);
    println!();

    let registry = TabRegistry::new(&config.browser)?;
    match registry.version().await {
        Ok(version) => {
            let browser = version
                .get("Browser")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            println!("Debug endpoint: ✓ {}", browser);

            let tabs = registry.list().await?;
            match find_chat_tab(&tabs, &config.chat.base_url, &config.chat.conversation_marker) {
                Some(tab) => println!("Chat tab:       ✓ {} ({})", tab.title, tab.url),
                None => println!("Chat tab:       ✗ open {} first", config.chat.base_url),
            }
        }
        Err(_) => {
            println!("Debug endpoint: ✗ not reachable");
            println!();
            println!("Run `chatpilot launch` to start a debug-mode browser.");
        }
    }

    Ok(())
}
