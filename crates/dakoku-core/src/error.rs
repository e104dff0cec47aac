use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Card identifier errors
    #[error("Invalid card id: {0}")]
    InvalidCardId(String),

    // Reader identification errors
    #[error("Invalid reader id: {0}")]
    InvalidReaderId(String),

    // Terminal identity errors
    #[error("Terminal identity unavailable: {0}")]
    Identity(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
