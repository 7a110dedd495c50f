//! Request pipeline: admission, capture, extraction.
//!
//! The admission gate runs before the page driver is touched; a denied URL
//! never reaches the network.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::admission::{AdmissionVerdict, DenialReason, assess};
use crate::browser::{CaptureRequest, PageCapture, PageCapturer, filter_images, filter_links};
use crate::extract::{CleanedDocument, ExtractError, ExtractionConfig, extract_text};
use crate::snapshot::DocumentSnapshot;

pub const DEFAULT_PAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// One scrape invocation.
#[derive(Debug, Clone, Default)]
pub struct ScrapeOptions {
    pub url: String,
    pub wait_for_selector: Option<String>,
    pub screenshot: bool,
    pub extract_text: bool,
    pub extract_links: bool,
    pub extract_images: bool,
    pub extraction: ExtractionConfig,
}

impl ScrapeOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeResult {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    /// PNG bytes; persisting them is up to the caller.
    #[serde(skip)]
    pub screenshot_png: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_path: Option<PathBuf>,
    /// RFC 3339, UTC, millisecond precision.
    pub timestamp: String,
}

#[derive(thiserror::Error, Debug)]
pub enum ScrapeError {
    #[error("URL rejected: {0}")]
    Denied(DenialReason),

    #[error("page capture failed: {0:#}")]
    Capture(#[from] anyhow::Error),

    #[error("scrape did not finish within {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("extraction worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

pub struct Scraper<C> {
    capturer: C,
    page_timeout: Duration,
}

impl<C: PageCapturer> Scraper<C> {
    pub fn new(capturer: C) -> Self {
        Self {
            capturer,
            page_timeout: DEFAULT_PAGE_TIMEOUT,
        }
    }

    /// Deadline covering capture and extraction.
    pub fn with_page_timeout(mut self, page_timeout: Duration) -> Self {
        self.page_timeout = page_timeout;
        self
    }

    pub async fn scrape(&self, options: &ScrapeOptions) -> Result<ScrapeResult, ScrapeError> {
        if let AdmissionVerdict::Denied(reason) = assess(&options.url) {
            warn!(target: "scrape", url = %options.url, %reason, "url denied by admission gate");
            return Err(ScrapeError::Denied(reason));
        }
        let url = Url::parse(&options.url)
            .map_err(|_| ScrapeError::Denied(DenialReason::InvalidFormat))?;

        info!(target: "scrape", %url, "scraping");
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);

        let (capture, text) = tokio::time::timeout(self.page_timeout, self.run(url, options))
            .await
            .map_err(|_| ScrapeError::Timeout(self.page_timeout))??;

        Ok(ScrapeResult {
            url: options.url.clone(),
            text: text.map(CleanedDocument::into_string),
            links: options.extract_links.then(|| filter_links(capture.links)),
            images: options.extract_images.then(|| filter_images(capture.images)),
            screenshot_png: capture.screenshot_png,
            screenshot_path: None,
            timestamp,
        })
    }

    async fn run(
        &self,
        url: Url,
        options: &ScrapeOptions,
    ) -> Result<(PageCapture, Option<CleanedDocument>), ScrapeError> {
        let request = CaptureRequest {
            url,
            wait_for_selector: options.wait_for_selector.clone(),
            screenshot: options.screenshot,
            links: options.extract_links,
            images: options.extract_images,
        };
        let mut capture = self.capturer.capture(&request).await?;
        debug!(target: "scrape", html_len = capture.html.len(), "capture complete");

        // Redirect targets pass the same gate.
        if let Some(landed) = &capture.url {
            if let AdmissionVerdict::Denied(reason) = assess(landed.as_str()) {
                warn!(target: "scrape", %landed, %reason, "navigation landed on a denied url");
                return Err(ScrapeError::Denied(reason));
            }
        }

        if !options.extract_text {
            return Ok((capture, None));
        }

        let html = std::mem::take(&mut capture.html);
        let config = options.extraction.clone();
        let cleaned = tokio::task::spawn_blocking(move || -> Result<CleanedDocument, ExtractError> {
            let snapshot = DocumentSnapshot::parse_html(&html)?;
            extract_text(&snapshot, &config)
        })
        .await??;
        debug!(target: "scrape", text_len = cleaned.as_str().len(), "text extracted");
        Ok((capture, Some(cleaned)))
    }
}
