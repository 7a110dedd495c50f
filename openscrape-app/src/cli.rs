use clap::{Args, Parser, Subcommand};
use openscrape_config::ClassRemoval;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "openscrape")]
#[command(about = "Scrape web pages through a headless browser, with SSRF checks and HTML cleanup")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scrape a single page
    Scrape(ScrapeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ScrapeArgs {
    /// Page to scrape (http or https only)
    #[arg(short, long)]
    pub url: String,

    /// CSS selector to wait for before reading the page
    #[arg(short, long = "wait-for", value_name = "SELECTOR")]
    pub wait_for: Option<String>,

    /// Save a PNG screenshot into the configured screenshot directory
    #[arg(short, long)]
    pub screenshot: bool,

    /// Include the cleaned page markup
    #[arg(short, long)]
    pub text: bool,

    /// Include link targets
    #[arg(short, long)]
    pub links: bool,

    /// Include image sources
    #[arg(short, long)]
    pub images: bool,

    /// Write JSON results to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Class attributes to strip: `all`, `none`, or a comma-separated list
    #[arg(long = "remove-classes", value_name = "all|none|LIST")]
    pub remove_classes: Option<ClassRemoval>,

    /// Configuration file (defaults to ./openscrape.yaml and the user config dir)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}
