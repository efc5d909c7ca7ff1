use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImporterError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV decoding failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Environment variable error: {0}")]
    Env(#[from] std::env::VarError),

    #[error("Pipeline task failed: {0}")]
    Pipeline(String),

    #[error("Deduplication oracle error: {0}")]
    Oracle(#[from] crate::dedupe::OracleError),
}

pub type Result<T> = std::result::Result<T, ImporterError>;
