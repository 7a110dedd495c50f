use anyhow::{Context, Result};
use openscrape_web::ScrapeResult;
use std::path::{Path, PathBuf};
use tracing::info;

/// `<dir>/<unix-millis>.png`
pub fn screenshot_path(dir: &Path, unix_millis: i64) -> PathBuf {
    dir.join(format!("{unix_millis}.png"))
}

/// Persist the PNG bytes and return where they went.
pub fn save_screenshot(dir: &Path, png: &[u8], unix_millis: i64) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create screenshot directory: {}", dir.display()))?;
    let path = screenshot_path(dir, unix_millis);
    std::fs::write(&path, png)
        .with_context(|| format!("failed to write screenshot: {}", path.display()))?;
    info!(target: "app.output", path = %path.display(), bytes = png.len(), "screenshot saved");
    Ok(path)
}

pub fn render_json(result: &ScrapeResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize scrape result")
}

/// Write the JSON document to `path`, creating parent directories.
pub fn save_results(result: &ScrapeResult, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory: {}", parent.display()))?;
    }
    std::fs::write(path, render_json(result)?)
        .with_context(|| format!("failed to write results: {}", path.display()))?;
    Ok(())
}
