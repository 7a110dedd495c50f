use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use openscrape_common::observability::{LogConfig, init_logging};
use openscrape_config::{
    CONFIG_FILE_NAME, ClassRemoval, OpenscrapeConfig, OpenscrapeConfigLoader, user_config_path,
};
use openscrape_drivers::openscrape_browser::driver::DriverOptions;
use openscrape_web::browser::FantocciniCapturer;
use openscrape_web::{ExtractionConfig, RemoveClassNames, ScrapeOptions, Scraper};
use std::path::Path;
use std::process::ExitCode;
use tracing::{error, info};

mod cli;
mod output;

use cli::{Cli, Commands, ScrapeArgs};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(target: "app", error = %format!("{e:#}"), "command failed");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Scrape(args) => {
            let config = load_config(args.config.as_deref())?;
            init_logging(log_config(&config))?;
            scrape(args, config).await
        }
    }
}

/// An explicit `--config` must exist; otherwise the user config and then
/// `./openscrape.yaml` are merged when present.
fn load_config(explicit: Option<&Path>) -> Result<OpenscrapeConfig> {
    let loader = match explicit {
        Some(path) => OpenscrapeConfigLoader::new().with_file(path),
        None => {
            let mut loader = OpenscrapeConfigLoader::new();
            if let Some(user) = user_config_path() {
                loader = loader.with_optional_file(user);
            }
            loader.with_optional_file(CONFIG_FILE_NAME)
        }
    };
    Ok(loader.load()?)
}

fn log_config(config: &OpenscrapeConfig) -> LogConfig {
    LogConfig {
        log_dir: config.log.dir.clone(),
        emit_stderr: config.log.stderr,
        format: config.log.format,
        level: config.log.level,
        ..LogConfig::default()
    }
}

fn driver_options(config: &OpenscrapeConfig) -> DriverOptions {
    let browser = &config.browser;
    DriverOptions {
        webdriver_url: browser.webdriver_url.clone(),
        headless: browser.headless,
        user_agent: browser.user_agent.clone(),
        window_size: (browser.window_width, browser.window_height),
        wait_timeout: browser.page_timeout(),
    }
}

fn class_policy(removal: ClassRemoval) -> RemoveClassNames {
    match removal {
        ClassRemoval::All => RemoveClassNames::AllClasses,
        ClassRemoval::None => RemoveClassNames::NoClasses,
        ClassRemoval::Specific(names) => RemoveClassNames::specific(names),
    }
}

fn scrape_options(args: &ScrapeArgs, config: &OpenscrapeConfig) -> ScrapeOptions {
    let removal = args
        .remove_classes
        .clone()
        .unwrap_or_else(|| config.extraction.remove_class_names.clone());
    ScrapeOptions {
        url: args.url.clone(),
        wait_for_selector: args.wait_for.clone(),
        screenshot: args.screenshot,
        extract_text: args.text,
        extract_links: args.links,
        extract_images: args.images,
        extraction: ExtractionConfig {
            remove_class_names: class_policy(removal),
        },
    }
}

async fn scrape(args: ScrapeArgs, config: OpenscrapeConfig) -> Result<()> {
    let options = scrape_options(&args, &config);
    let scraper = Scraper::new(FantocciniCapturer::new(driver_options(&config)))
        .with_page_timeout(config.browser.page_timeout());

    let mut result = scraper.scrape(&options).await?;

    if let Some(png) = result.screenshot_png.take() {
        let path = output::save_screenshot(
            &config.output.screenshot_dir,
            &png,
            Utc::now().timestamp_millis(),
        )?;
        result.screenshot_path = Some(path);
    }

    match &args.output {
        Some(path) => {
            output::save_results(&result, path)?;
            info!(target: "app", path = %path.display(), "results written");
            println!("Results saved to {}", path.display());
        }
        None => println!("{}", output::render_json(&result)?),
    }
    Ok(())
}
