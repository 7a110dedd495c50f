use anyhow::{Context, Result};
use fantoccini::{Client, Locator};
use std::time::Duration;
use tracing::debug;

/// Every anchor's resolved `href` property, in document order.
const LINKS_SCRIPT: &str = r#"
    return Array.from(document.querySelectorAll("a")).map((a) => a.href || "");
"#;

/// Every image's resolved `src` property, in document order.
const IMAGES_SCRIPT: &str = r#"
    return Array.from(document.querySelectorAll("img")).map((img) => img.src || "");
"#;

/// A loaded page in the driver's browser session.
pub struct OpenscrapePage {
    pub(crate) client: Client,
    pub(crate) wait_timeout: Duration,
}

impl OpenscrapePage {
    /// Construct a page wrapper around an existing WebDriver client.
    pub fn new(client: Client, wait_timeout: Duration) -> Self {
        Self {
            client,
            wait_timeout,
        }
    }

    /// Navigate to `url`; returns after the session's page-load strategy is satisfied.
    pub async fn goto(&mut self, url: &str) -> Result<()> {
        debug!(target: "browser.page", %url, "navigating");
        self.client
            .goto(url)
            .await
            .with_context(|| format!("navigation to {url} failed"))?;
        Ok(())
    }

    /// Block until an element matching `selector` is present.
    pub async fn wait_for_selector(&self, selector: &str) -> Result<()> {
        debug!(target: "browser.page", %selector, "waiting for selector");
        self.client
            .wait()
            .at_most(self.wait_timeout)
            .for_element(Locator::Css(selector))
            .await
            .with_context(|| format!("selector `{selector}` never appeared"))?;
        Ok(())
    }

    /// Return the full page HTML source.
    pub async fn get_content(&self) -> Result<String> {
        self.client.source().await.map_err(anyhow::Error::msg)
    }

    /// Return the current page URL.
    pub async fn get_url(&self) -> Result<String> {
        self.client
            .current_url()
            .await
            .map(|url| url.to_string())
            .map_err(anyhow::Error::msg)
    }

    /// PNG screenshot of the current viewport.
    pub async fn screenshot(&self) -> Result<Vec<u8>> {
        debug!(target: "browser.page", "taking screenshot");
        self.client
            .screenshot()
            .await
            .context("screenshot capture failed")
    }

    /// Raw `href` of every anchor, unfiltered.
    pub async fn collect_links(&self) -> Result<Vec<String>> {
        self.collect_strings(LINKS_SCRIPT).await
    }

    /// Raw `src` of every image, unfiltered.
    pub async fn collect_images(&self) -> Result<Vec<String>> {
        self.collect_strings(IMAGES_SCRIPT).await
    }

    async fn collect_strings(&self, script: &str) -> Result<Vec<String>> {
        let value = self.client.execute(script, vec![]).await?;
        let items: Vec<Option<String>> =
            serde_json::from_value(value).context("page script returned a non-string list")?;
        Ok(items.into_iter().map(Option::unwrap_or_default).collect())
    }
}
