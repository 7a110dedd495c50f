use anyhow::{Context, Result};
use openscrape_drivers::openscrape_browser::driver::{DriverOptions, OpenscrapeDriver};
use openscrape_drivers::openscrape_browser::page::OpenscrapePage;
use tracing::{debug, warn};
use url::Url;

/// What the page driver should collect while the page is open.
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    pub url: Url,
    pub wait_for_selector: Option<String>,
    pub screenshot: bool,
    pub links: bool,
    pub images: bool,
}

/// A fully loaded page as handed over by the driver.
#[derive(Debug, Clone, Default)]
pub struct PageCapture {
    /// Where the browser ended up after redirects, when known.
    pub url: Option<Url>,
    pub html: String,
    /// Raw anchor hrefs, unfiltered.
    pub links: Vec<String>,
    /// Raw image srcs, unfiltered.
    pub images: Vec<String>,
    pub screenshot_png: Option<Vec<u8>>,
}

#[async_trait::async_trait]
pub trait PageCapturer: Send + Sync {
    async fn capture(&self, request: &CaptureRequest) -> Result<PageCapture>;
}

/// Concrete capturer backed by the fantoccini driver. Opens one browser
/// session per capture.
pub struct FantocciniCapturer {
    options: DriverOptions,
}

impl FantocciniCapturer {
    pub fn new(options: DriverOptions) -> Self {
        Self { options }
    }
}

#[async_trait::async_trait]
impl PageCapturer for FantocciniCapturer {
    async fn capture(&self, request: &CaptureRequest) -> Result<PageCapture> {
        let mut driver = OpenscrapeDriver::new(self.options.clone()).await?;
        let result = match driver.goto(request.url.as_str()).await {
            Ok(page) => read_page(&page, request).await,
            Err(e) => Err(e),
        };
        // Always attempt to close the driver before returning
        if let Err(e) = driver.close().await {
            warn!(target: "browser.capture", error = %e, "failed to close browser session");
        }
        result
    }
}

async fn read_page(page: &OpenscrapePage, request: &CaptureRequest) -> Result<PageCapture> {
    if let Some(selector) = &request.wait_for_selector {
        page.wait_for_selector(selector).await?;
    }

    let screenshot_png = if request.screenshot {
        Some(page.screenshot().await?)
    } else {
        None
    };

    let html = page.get_content().await?;
    let links = if request.links {
        page.collect_links().await?
    } else {
        Vec::new()
    };
    let images = if request.images {
        page.collect_images().await?
    } else {
        Vec::new()
    };
    let landed = page.get_url().await?;
    let url = Url::parse(&landed)
        .with_context(|| format!("browser reported an unparsable page url: {landed}"))?;

    debug!(
        target: "browser.capture",
        html_len = html.len(),
        links = links.len(),
        images = images.len(),
        "page captured"
    );
    Ok(PageCapture {
        url: Some(url),
        html,
        links,
        images,
        screenshot_png,
    })
}

/// Drop empty and `javascript:` hrefs.
pub fn filter_links(links: Vec<String>) -> Vec<String> {
    links
        .into_iter()
        .filter(|href| {
            let trimmed = href.trim();
            !trimmed.is_empty()
                && !trimmed
                    .get(..11)
                    .is_some_and(|prefix| prefix.eq_ignore_ascii_case("javascript:"))
        })
        .collect()
}

/// Drop empty image sources.
pub fn filter_images(images: Vec<String>) -> Vec<String> {
    images
        .into_iter()
        .filter(|src| !src.trim().is_empty())
        .collect()
}
