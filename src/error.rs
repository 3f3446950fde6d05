use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrepError {
    #[error("DataFrame operation failed: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML deserialization failed: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Transform error: {message}")]
    Transform { message: String },
}

pub type Result<T> = std::result::Result<T, PrepError>;
