use crate::constants::{DEFAULT_DELAY_MS, DEFAULT_MONTHS_AHEAD};
use crate::error::{Result, ScraperError};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub http: HttpConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub sources: SourcesConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_seconds: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            user_agent: format!("allet_scraper/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite file. Without one, runs go to an in-memory store and are lost
    /// on exit.
    pub database_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: "logs".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SourcesConfig {
    pub opera_hu: OperaHuConfig,
    pub wiener_staatsoper: WienerStaatsoperConfig,
    pub zaz_tour: TourConfig,
    pub coeur_de_pirate: TourConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OperaHuConfig {
    pub enabled: bool,
    pub delay_ms: u64,
    /// Extra programme pages crawled on top of the active months
    pub seed_urls: Vec<String>,
    /// Keep a whitelist of inline tags in the synopsis instead of plain text
    pub rich_synopsis: bool,
}

impl Default for OperaHuConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_ms: DEFAULT_DELAY_MS,
            seed_urls: Vec::new(),
            rich_synopsis: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WienerStaatsoperConfig {
    pub enabled: bool,
    pub delay_ms: u64,
    pub months_ahead: u32,
}

impl Default for WienerStaatsoperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_ms: DEFAULT_DELAY_MS,
            months_ahead: DEFAULT_MONTHS_AHEAD,
        }
    }
}

/// Single-page tour sources need no pacing, only a switch.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TourConfig {
    pub enabled: bool,
}

impl Default for TourConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Config {
    /// Load configuration from a TOML file, then apply environment overrides.
    /// A missing file yields the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| {
                ScraperError::Config(format!(
                    "Failed to read config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
            Self::from_toml_str(&content)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = env::var("ALLET_DATABASE_PATH") {
            if !path.trim().is_empty() {
                self.storage.database_path = Some(path);
            }
        }
        if let Ok(agent) = env::var("ALLET_USER_AGENT") {
            if !agent.trim().is_empty() {
                self.http.user_agent = agent;
            }
        }
        if let Ok(dir) = env::var("ALLET_LOG_DIR") {
            if !dir.trim().is_empty() {
                self.logging.directory = dir;
            }
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_seconds)
    }
}
