use providers::saucenao::{SearchIndex, DEFAULT_NUM_RESULTS};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub saucenao: SauceNaoSettings,
    pub e621: E621Settings,
    pub scan: ScanSettings,
    pub output: OutputSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SauceNaoSettings {
    pub api_key: String,
    pub index: SearchIndex,
    pub num_results: u32,
    /// Stored search response to parse instead of searching live.
    pub replay: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct E621Settings {
    pub username: String,
    pub api_key: String,
    pub user_agent: Option<String>,
    /// Stored post document used for every post id instead of fetching live.
    pub replay: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    pub max_depth: usize,
    pub extensions: Vec<String>,
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Alternate root for organized files; the originals are copied there.
    pub base_dir: Option<PathBuf>,
    pub no_rename: bool,
    pub store_raw: bool,
    pub debug_dir: PathBuf,
    pub verbose: bool,
}

impl Default for SauceNaoSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            index: SearchIndex::default(),
            num_results: DEFAULT_NUM_RESULTS,
            replay: None,
        }
    }
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            max_depth: 4,
            extensions: ["jpg", "jpeg", "png", "gif"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
            exclude: Vec::new(),
        }
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            base_dir: None,
            no_rename: false,
            store_raw: false,
            debug_dir: PathBuf::from("."),
            verbose: false,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing credential `{0}` (set it in the config file or the environment)")]
    MissingCredential(&'static str),
}

impl AppConfig {
    /// Live searches need an API key; replayed ones do not.
    pub fn require_credentials(&self, live_search: bool) -> Result<(), ConfigError> {
        if live_search && self.saucenao.api_key.trim().is_empty() {
            return Err(ConfigError::MissingCredential("saucenao.api_key"));
        }
        Ok(())
    }

    pub fn raw_dump_path(&self, service: &str) -> Option<PathBuf> {
        self.output
            .store_raw
            .then(|| self.output.debug_dir.join(format!("debug-{}.json", service)))
    }

    /// Fills empty credentials from the variable names used by older setups.
    fn apply_legacy_env(&mut self) {
        fill_from_env(&mut self.saucenao.api_key, "saucenao_api_key");
        fill_from_env(&mut self.e621.username, "e621_username");
        fill_from_env(&mut self.e621.api_key, "e621_api_key");
    }
}

fn fill_from_env(field: &mut String, var: &str) {
    if field.is_empty() {
        if let Ok(value) = std::env::var(var) {
            *field = value;
        }
    }
}

/// Loads `.env`, the TOML file (or `config/default` when present), then
/// `IMGLOOKUP__SECTION__KEY` environment variables.
pub fn load(path: Option<&str>) -> anyhow::Result<AppConfig> {
    dotenv::dotenv().ok();
    let mut settings = config::Config::builder();
    if let Some(p) = path {
        settings = settings.add_source(config::File::with_name(p));
    } else {
        settings = settings.add_source(config::File::with_name("config/default").required(false));
    }
    settings = settings.add_source(
        config::Environment::with_prefix("IMGLOOKUP")
            .separator("__")
            .try_parsing(true),
    );
    let cfg = settings.build()?;
    let mut app: AppConfig = cfg.try_deserialize()?;
    app.apply_legacy_env();
    Ok(app)
}
