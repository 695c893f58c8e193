/// Error types for the ingestion engine
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BirdfeedError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("XML error: {0}")]
    Xml(String),

    /// A completion arrived with a status other than 200
    #[error("{endpoint} request failed. HTTP STATUS: {status}")]
    TransportFailure { endpoint: String, status: u16 },
}

pub type Result<T> = std::result::Result<T, BirdfeedError>;
