use chatpilot_browser::{find_chat_tab, TabRegistry};
use chatpilot_core::{Config, Paths};

pub async fn run() -> anyhow::Result<()> {
    let config = Config::load_or_default(&Paths::new())?;
    let registry = TabRegistry::new(&config.browser)?;
    let tabs = registry.list().await?;

    if tabs.is_empty() {
        println!("No open targets.");
        return Ok(());
    }

    let selected = find_chat_tab(&tabs, &config.chat.base_url, &config.chat.conversation_marker)
        .map(|t| t.id.clone());

    for tab in &tabs {
        let marker = if Some(&tab.id) == selected.as_ref() {
            "*"
        } else {
            " "
        };
        println!("{} [{}] {} {}", marker, tab.kind, tab.title, tab.url);
    }
    Ok(())
}
