use anyhow::bail;
use chatpilot_browser::{ChatDriver, ChatOutcome};
use chatpilot_core::{Config, Paths};

pub async fn run(message: String, no_wait: bool, timeout: Option<u64>) -> anyhow::Result<()> {
    let config = Config::load_or_default(&Paths::new())?;
    let timeout_secs = timeout.unwrap_or(config.chat.default_timeout_secs);

    let mut driver = ChatDriver::connect(&config)?;
    let result = driver.send(&message, !no_wait, timeout_secs).await;

    if !result.text.is_empty() {
        println!("{}", result.text);
    }
    if !result.images.is_empty() {
        println!();
        for image in &result.images {
            let alt = if image.alt.is_empty() {
                "image"
            } else {
                image.alt.as_str()
            };
            println!("![{}]({})", alt, image.src);
        }
    }

    match result.outcome {
        ChatOutcome::Success => {
            if no_wait {
                println!("Sent.");
            }
            Ok(())
        }
        ChatOutcome::Timeout => bail!("timed out waiting for the reply; partial output above"),
        ChatOutcome::Failure => bail!(
            "{}",
            result.error.unwrap_or_else(|| "send failed".to_string())
        ),
    }
}
