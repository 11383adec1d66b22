use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Serialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("Provider error: {0}")]
    Provider(#[from] ethers::providers::ProviderError),

    #[error("Contract reverted: {0}")]
    Revert(#[from] crate::contract::Revert),

    #[error("No quote: {0}")]
    NoQuote(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Other: {0}")]
    Other(String),
}

impl AppError {
    /// Transient infrastructure failures get retried with backoff; everything
    /// else fails the single operation immediately.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::Network(_) | AppError::Timeout(_) | AppError::Provider(_)
        )
    }

    /// Connectivity loss moves the resilience layer into offline buffering.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, AppError::Network(_) | AppError::Timeout(_))
    }
}
