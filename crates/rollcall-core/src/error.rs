use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Identifier errors
    #[error("Invalid tag UID: {0}")]
    InvalidTagUid(String),

    #[error("Invalid guest id: {0}")]
    InvalidGuestId(String),

    #[error("Invalid station: {0}")]
    InvalidStation(String),

    #[error("Invalid cell value: {0}")]
    InvalidCellValue(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing configuration key: {0}")]
    MissingConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
