//! Loader for `openscrape.yaml` with environment overlays.
//!
//! Precedence, lowest to highest: built-in defaults, the YAML file(s) in the
//! order they were attached, then `OPENSCRAPE__SECTION__KEY` environment
//! variables (e.g. `OPENSCRAPE__BROWSER__HEADLESS=false`). String values may
//! reference other environment variables as `${VAR}`; these are expanded after
//! merging, recursively up to a fixed depth.
//!
//! ```yaml
//! log:
//!   level: debug        # debug | info | warn | error
//!   format: json        # text | json
//!   dir: ~/logs/openscrape
//!   stderr: true
//! browser:
//!   webdriver_url: "${WEBDRIVER_URL}"
//!   headless: true
//!   page_timeout_secs: 30
//! extraction:
//!   remove_class_names: [ad, promo]   # or `all` / `none`
//! output:
//!   screenshot_dir: screenshots
//! ```
use config::{Config, ConfigError, Environment, File};
use openscrape_common::LogLevel;
use openscrape_common::observability::LogFormat;
use serde::Deserialize;
use serde_json::Value;
use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

/// File name looked up in the working directory and the user config dir.
pub const CONFIG_FILE_NAME: &str = "openscrape.yaml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OpenscrapeConfig {
    pub log: LogSettings,
    pub browser: BrowserSettings,
    pub extraction: ExtractionSettings,
    pub output: OutputSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: LogLevel,
    pub format: LogFormat,
    pub dir: Option<PathBuf>,
    pub stderr: bool,
}

/// WebDriver session settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub webdriver_url: String,
    pub headless: bool,
    pub page_timeout_secs: u64,
    pub user_agent: Option<String>,
    pub window_width: u32,
    pub window_height: u32,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            webdriver_url: default_webdriver_url(),
            headless: true,
            page_timeout_secs: 30,
            user_agent: None,
            window_width: 1920,
            window_height: 1080,
        }
    }
}

impl BrowserSettings {
    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    pub remove_class_names: ClassRemoval,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub screenshot_dir: PathBuf,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            screenshot_dir: PathBuf::from("screenshots"),
        }
    }
}

/// Which `class` attributes the sanitizer strips.
///
/// In YAML this is either the keyword `all` / `none` or a list of class
/// names. A single comma-separated string (handy for env overrides) is read
/// as a list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "ClassRemovalRepr")]
pub enum ClassRemoval {
    All,
    #[default]
    None,
    Specific(Vec<String>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ClassRemovalRepr {
    Keyword(String),
    List(Vec<String>),
}

impl From<ClassRemovalRepr> for ClassRemoval {
    fn from(repr: ClassRemovalRepr) -> Self {
        match repr {
            ClassRemovalRepr::Keyword(s) => s.parse().unwrap_or_default(),
            ClassRemovalRepr::List(names) => ClassRemoval::Specific(
                names
                    .into_iter()
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty())
                    .collect(),
            ),
        }
    }
}

impl FromStr for ClassRemoval {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("all") {
            return Ok(ClassRemoval::All);
        }
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
            return Ok(ClassRemoval::None);
        }
        Ok(ClassRemoval::Specific(
            trimmed
                .split(',')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(String::from)
                .collect(),
        ))
    }
}

fn default_webdriver_url() -> String {
    "http://localhost:9515".into()
}

/// `$XDG_CONFIG_HOME/openscrape/openscrape.yaml` (or the platform equivalent).
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("openscrape").join(CONFIG_FILE_NAME))
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct OpenscrapeConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
    env_prefix: String,
}

impl Default for OpenscrapeConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenscrapeConfigLoader {
    /// Start from defaults; `OPENSCRAPE__` env overrides are applied last.
    ///
    /// ```
    /// use openscrape_config::{ClassRemoval, OpenscrapeConfigLoader};
    ///
    /// let config = OpenscrapeConfigLoader::new()
    ///     .with_yaml_str("browser:\n  headless: false")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert!(!config.browser.headless);
    /// assert_eq!(config.browser.webdriver_url, "http://localhost:9515");
    /// assert_eq!(config.extraction.remove_class_names, ClassRemoval::None);
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
            env_prefix: "OPENSCRAPE".to_string(),
        }
    }

    /// Use a different environment prefix (tests isolate themselves this way).
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Attach a YAML/TOML/JSON file that must exist; format is inferred by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that is merged only when present.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Allow tests/CLI to merge inline YAML snippets.
    ///
    /// ```
    /// use openscrape_config::{ClassRemoval, OpenscrapeConfigLoader};
    ///
    /// let cfg = OpenscrapeConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// extraction:
    ///   remove_class_names: [ad, promo]
    /// output:
    ///   screenshot_dir: /tmp/shots
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(
    ///     cfg.extraction.remove_class_names,
    ///     ClassRemoval::Specific(vec!["ad".into(), "promo".into()])
    /// );
    /// assert_eq!(cfg.output.screenshot_dir.to_str(), Some("/tmp/shots"));
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources into strongly typed config.
    ///
    /// `${VAR}` placeholders are expanded before the typed structs are built.
    ///
    /// ```
    /// use openscrape_config::OpenscrapeConfigLoader;
    ///
    /// unsafe { std::env::set_var("DOC_WEBDRIVER", "http://grid.internal:4444"); }
    ///
    /// let config = OpenscrapeConfigLoader::new()
    ///     .with_yaml_str("browser:\n  webdriver_url: \"${DOC_WEBDRIVER}\"")
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// assert_eq!(config.browser.webdriver_url, "http://grid.internal:4444");
    ///
    /// unsafe { std::env::remove_var("DOC_WEBDRIVER"); }
    /// ```
    pub fn load(self) -> Result<OpenscrapeConfig, ConfigError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: OpenscrapeConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;

        Ok(typed)
    }
}
