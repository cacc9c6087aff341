use chatpilot_browser::ensure_running;
use chatpilot_core::{Config, Paths};

pub async fn run(url: Option<String>) -> anyhow::Result<()> {
    let paths = Paths::new();
    paths.ensure_dirs()?;
    let config = Config::load_or_default(&paths)?;

    let mut launch = config.launch.clone();
    if let Some(url) = url {
        launch.start_url = url;
    }

    // The child handle is dropped on purpose; the browser keeps running.
    match ensure_running(&launch, &config.browser).await? {
        Some(_child) => println!(
            "Browser launched; debug endpoint at {}",
            config.browser.endpoint()
        ),
        None => println!(
            "Debug endpoint already running at {}",
            config.browser.endpoint()
        ),
    }
    Ok(())
}
