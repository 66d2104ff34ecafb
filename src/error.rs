use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Custodian
#[derive(Error, Debug)]
pub enum CustodianError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// No repository URL could be resolved for a package
    #[error("No repository URL found for {ecosystem} package '{package}'")]
    UnresolvedPackage { package: String, ecosystem: String },

    /// Unknown ecosystem name passed at the boundary
    #[error("Unsupported ecosystem: {0}")]
    UnsupportedEcosystem(String),

    /// Git clone/log failures (terminal for the affected package only)
    #[error("Git error for {repo_url}: {message}")]
    Git { repo_url: String, message: String },

    /// Registry or GitHub HTTP failures
    #[error("HTTP error: {context}: {source}")]
    Http {
        source: reqwest::Error,
        context: String,
    },

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Score cache errors
    #[error("Cache error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type for Custodian operations
pub type Result<T> = std::result::Result<T, CustodianError>;
