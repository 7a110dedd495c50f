use anyhow::{Result, anyhow};
use openscrape_web::browser::{CaptureRequest, PageCapture, PageCapturer};
use openscrape_web::{
    DenialReason, ExtractionConfig, RemoveClassNames, ScrapeError, ScrapeOptions, Scraper,
};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use url::Url;

const PAGE: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <title>Fixture</title>
    <link rel="stylesheet" href="/site.css">
    <script src="/app.js"></script>
  </head>
  <body class="page">

    <!-- build 1234 -->
    <div class="ad promo" style="display:block">
      <p>Hello</p>
    </div>
    <iframe src="https://www.youtube.com/embed/abc123"></iframe>
  </body>
</html>"#;

/// What the fake saw; shared with the test after the capturer moves.
#[derive(Default)]
struct Probe {
    calls: AtomicUsize,
    last_request: Mutex<Option<CaptureRequest>>,
}

impl Probe {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_request(&self) -> Option<CaptureRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

/// In-process stand-in for the browser.
struct FakeCapturer {
    html: String,
    probe: Arc<Probe>,
    delay: Option<Duration>,
    fail: bool,
    redirect_to: Option<Url>,
}

impl FakeCapturer {
    fn serving(html: &str) -> (Self, Arc<Probe>) {
        let probe = Arc::new(Probe::default());
        let fake = Self {
            html: html.to_string(),
            probe: Arc::clone(&probe),
            delay: None,
            fail: false,
            redirect_to: None,
        };
        (fake, probe)
    }
}

#[async_trait::async_trait]
impl PageCapturer for FakeCapturer {
    async fn capture(&self, request: &CaptureRequest) -> Result<PageCapture> {
        self.probe.calls.fetch_add(1, Ordering::SeqCst);
        *self.probe.last_request.lock().unwrap() = Some(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(anyhow!("navigation failed: net::ERR_NAME_NOT_RESOLVED"));
        }
        Ok(PageCapture {
            url: Some(self.redirect_to.clone().unwrap_or_else(|| request.url.clone())),
            html: self.html.clone(),
            links: vec![
                "https://example.com/about".into(),
                "javascript:void(0)".into(),
                "".into(),
            ],
            images: vec!["https://example.com/logo.png".into(), "".into()],
            screenshot_png: request.screenshot.then(|| vec![0x89, b'P', b'N', b'G']),
        })
    }
}

fn full_options(url: &str) -> ScrapeOptions {
    ScrapeOptions {
        extract_text: true,
        extract_links: true,
        extract_images: true,
        screenshot: true,
        wait_for_selector: Some("main".into()),
        ..ScrapeOptions::new(url)
    }
}

#[tokio::test]
async fn denied_urls_never_reach_the_driver() {
    let (fake, probe) = FakeCapturer::serving(PAGE);
    let scraper = Scraper::new(fake);

    for (url, reason) in [
        ("http://127.0.0.1/admin", DenialReason::BlockedDomain),
        ("http://10.0.0.1/", DenialReason::PrivateAddress),
        ("file:///etc/passwd", DenialReason::BlockedProtocol),
        ("not a url", DenialReason::InvalidFormat),
    ] {
        let err = scraper.scrape(&full_options(url)).await.unwrap_err();
        assert!(
            matches!(err, ScrapeError::Denied(r) if r == reason),
            "{url}: {err}"
        );
    }
    assert_eq!(probe.calls(), 0);
}

#[tokio::test]
async fn allowed_url_is_captured_and_sanitized() {
    let (fake, probe) = FakeCapturer::serving(PAGE);
    let scraper = Scraper::new(fake);
    let mut options = full_options("https://example.com/page");
    options.extraction = ExtractionConfig {
        remove_class_names: RemoveClassNames::specific(["ad"]),
    };

    let result = scraper.scrape(&options).await.expect("scrape");
    assert_eq!(probe.calls(), 1);

    let request = probe.last_request().unwrap();
    assert_eq!(request.url.as_str(), "https://example.com/page");
    assert_eq!(request.wait_for_selector.as_deref(), Some("main"));
    assert!(request.screenshot && request.links && request.images);

    let text = result.text.expect("text requested");
    assert!(text.contains(r#"<div class="promo"><p>Hello</p></div>"#), "{text}");
    assert!(text.contains(r#"<body class="page">"#), "{text}");
    assert!(text.contains(
        r#"<a href="https://www.youtube.com/embed/abc123">[Video: https://www.youtube.com/embed/abc123]</a>"#
    ));
    for gone in ["<script", "<iframe", "stylesheet", "build 1234", "style=", "\n"] {
        assert!(!text.contains(gone), "{gone:?} survived in {text}");
    }

    assert_eq!(result.links, Some(vec!["https://example.com/about".to_string()]));
    assert_eq!(result.images, Some(vec!["https://example.com/logo.png".to_string()]));
    assert_eq!(result.screenshot_png.as_deref(), Some(&[0x89, b'P', b'N', b'G'][..]));
    assert_eq!(result.url, "https://example.com/page");
    assert!(result.timestamp.ends_with('Z'));
}

#[tokio::test]
async fn unrequested_outputs_are_absent() {
    let (fake, probe) = FakeCapturer::serving(PAGE);
    let scraper = Scraper::new(fake);

    let result = scraper
        .scrape(&ScrapeOptions::new("https://example.com/"))
        .await
        .expect("scrape");

    assert_eq!(probe.calls(), 1);
    assert!(result.text.is_none());
    assert!(result.links.is_none());
    assert!(result.images.is_none());
    assert!(result.screenshot_png.is_none());
}

#[tokio::test]
async fn all_classes_policy_strips_every_class() {
    let (fake, _probe) = FakeCapturer::serving(PAGE);
    let scraper = Scraper::new(fake);
    let mut options = ScrapeOptions::new("https://example.com/");
    options.extract_text = true;
    options.extraction.remove_class_names = RemoveClassNames::AllClasses;

    let text = scraper.scrape(&options).await.unwrap().text.unwrap();
    assert!(!text.contains("class="), "{text}");
    assert!(text.contains("<p>Hello</p>"));
}

#[tokio::test]
async fn driver_failures_surface_as_capture_errors() {
    let (mut fake, _probe) = FakeCapturer::serving(PAGE);
    fake.fail = true;
    let scraper = Scraper::new(fake);

    let err = scraper
        .scrape(&full_options("https://example.invalid/"))
        .await
        .unwrap_err();
    assert!(matches!(err, ScrapeError::Capture(_)));
    assert!(err.to_string().contains("ERR_NAME_NOT_RESOLVED"));
}

#[tokio::test(start_paused = true)]
async fn slow_pages_hit_the_deadline() {
    let (mut fake, _probe) = FakeCapturer::serving(PAGE);
    fake.delay = Some(Duration::from_secs(120));
    let scraper = Scraper::new(fake).with_page_timeout(Duration::from_secs(5));

    let err = scraper
        .scrape(&full_options("https://example.com/slow"))
        .await
        .unwrap_err();
    assert!(matches!(err, ScrapeError::Timeout(d) if d == Duration::from_secs(5)));
}

#[tokio::test]
async fn redirects_into_private_addresses_are_denied() {
    let (mut fake, probe) = FakeCapturer::serving(PAGE);
    fake.redirect_to = Some(Url::parse("http://169.254.169.254/latest/meta-data/").unwrap());
    let scraper = Scraper::new(fake);

    let err = scraper
        .scrape(&full_options("https://example.com/redirect"))
        .await
        .unwrap_err();
    assert_eq!(probe.calls(), 1);
    assert!(matches!(err, ScrapeError::Denied(DenialReason::PrivateAddress)));
}

#[tokio::test]
async fn redirects_to_public_pages_are_kept() {
    let (mut fake, _probe) = FakeCapturer::serving(PAGE);
    fake.redirect_to = Some(Url::parse("https://www.example.com/landing").unwrap());
    let scraper = Scraper::new(fake);

    let result = scraper
        .scrape(&full_options("https://example.com/redirect"))
        .await
        .expect("scrape");
    assert_eq!(result.url, "https://example.com/redirect");
    assert!(result.text.is_some());
}
