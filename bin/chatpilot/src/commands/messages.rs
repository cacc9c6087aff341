use chatpilot_browser::ChatDriver;
use chatpilot_core::{Config, Paths};

pub async fn run() -> anyhow::Result<()> {
    let config = Config::load_or_default(&Paths::new())?;
    let driver = ChatDriver::connect(&config)?;
    let messages = driver.messages().await?;

    println!("user ({}):", messages.user.len());
    for text in &messages.user {
        println!("  {}", text.replace('\n', "\n  "));
    }
    println!();
    println!("assistant ({}):", messages.assistant.len());
    for text in &messages.assistant {
        println!("  {}", text.replace('\n', "\n  "));
    }
    Ok(())
}
