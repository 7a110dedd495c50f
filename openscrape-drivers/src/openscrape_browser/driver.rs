use crate::openscrape_browser::page::OpenscrapePage;
use anyhow::{Context, Result};
use fantoccini::{Client, ClientBuilder};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use webdriver::capabilities::Capabilities;

/// Where to find the WebDriver service and how to launch the browser.
#[derive(Debug, Clone)]
pub struct DriverOptions {
    /// WebDriver endpoint, e.g. Chromedriver on `http://localhost:9515`.
    pub webdriver_url: String,
    pub headless: bool,
    pub user_agent: Option<String>,
    pub window_size: (u32, u32),
    /// Upper bound for selector waits on pages opened by this driver.
    pub wait_timeout: Duration,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            headless: true,
            user_agent: None,
            window_size: (1920, 1080),
            wait_timeout: Duration::from_secs(30),
        }
    }
}

/// Construct Chrome command-line arguments for the given options.
pub fn build_browser_arguments(options: &DriverOptions) -> Vec<String> {
    let mut args = vec![
        "--disable-dev-shm-usage".to_string(),
        "--no-sandbox".to_string(),
        "--disable-extensions".to_string(),
        format!(
            "--window-size={},{}",
            options.window_size.0, options.window_size.1
        ),
    ];
    if let Some(user_agent) = &options.user_agent {
        args.push(format!("--user-agent={user_agent}"));
    }
    if options.headless {
        args.push("--headless".to_string());
        args.push("--disable-gpu".to_string());
    }
    args
}

/// Thin wrapper around a `fantoccini` WebDriver client.
pub struct OpenscrapeDriver {
    pub client: Client,
    options: DriverOptions,
}

impl OpenscrapeDriver {
    /// Create a new driver connected to a running WebDriver service.
    pub async fn new(options: DriverOptions) -> Result<Self> {
        let mut caps = Capabilities::new();
        let mut chrome_opts = HashMap::new();
        chrome_opts.insert("args".to_string(), json!(build_browser_arguments(&options)));
        caps.insert("goog:chromeOptions".to_string(), json!(chrome_opts));

        debug!(
            target: "browser.driver",
            endpoint = %options.webdriver_url,
            headless = options.headless,
            "connecting to webdriver"
        );
        let client = ClientBuilder::native()
            .capabilities(caps)
            .connect(&options.webdriver_url)
            .await
            .with_context(|| format!("failed to connect to webdriver at {}", options.webdriver_url))?;

        Ok(Self { client, options })
    }

    /// Navigate to `url` and return an [`OpenscrapePage`] once the browser
    /// reports the document as loaded.
    pub async fn goto(&mut self, url: &str) -> Result<OpenscrapePage> {
        let mut page = OpenscrapePage::new(self.client.clone(), self.options.wait_timeout);
        page.goto(url).await?;
        Ok(page)
    }

    /// Close the underlying browser session.
    pub async fn close(self) -> Result<()> {
        self.client.close().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headless_adds_headless_flags() {
        let args = build_browser_arguments(&DriverOptions::default());
        assert!(args.contains(&"--headless".to_string()));
        assert!(args.contains(&"--window-size=1920,1080".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("--user-agent")));
    }

    #[test]
    fn headed_session_with_custom_user_agent() {
        let options = DriverOptions {
            headless: false,
            user_agent: Some("openscrape/0.1".to_string()),
            window_size: (1280, 720),
            ..DriverOptions::default()
        };
        let args = build_browser_arguments(&options);
        assert!(!args.contains(&"--headless".to_string()));
        assert!(args.contains(&"--user-agent=openscrape/0.1".to_string()));
        assert!(args.contains(&"--window-size=1280,720".to_string()));
    }
}
