use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use trade_lifecycle::LifecycleSettings;

/// Paper fill price for one symbol. A list rather than a map because
/// `config` lowercases map keys.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MarkPrice {
    pub symbol: String,
    pub price: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    pub log_level: String,
    pub store_path: PathBuf,
    /// Whether the paper session starts authenticated.
    pub authenticated: bool,
    pub mark_prices: Vec<MarkPrice>,
    pub lifecycle: LifecycleSettings,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            store_path: PathBuf::from("trades.json"),
            authenticated: true,
            mark_prices: Vec::new(),
            lifecycle: LifecycleSettings::default(),
        }
    }
}

impl RunnerSettings {
    /// Defaults, then the optional file, then `LIFECYCLE__*` variables
    /// (`LIFECYCLE__LIFECYCLE__PERSIST_BEFORE_SUBMIT=true`).
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder
            .add_source(
                Environment::with_prefix("LIFECYCLE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
