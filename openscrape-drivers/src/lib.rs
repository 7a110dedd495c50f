//! Driver layer for browser automation.
//!
//! This crate exposes the WebDriver-backed browser session and page helpers
//! used to load a page and read back what it rendered.
//!
//! - [`openscrape_browser::driver::OpenscrapeDriver`]: WebDriver client wrapper
//! - [`openscrape_browser::driver::DriverOptions`]: endpoint and browser flags
//! - [`openscrape_browser::page::OpenscrapePage`]: source, links, images and screenshots
pub mod openscrape_browser;
