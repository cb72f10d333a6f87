use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl ScraperError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ScraperError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, ScraperError>;
