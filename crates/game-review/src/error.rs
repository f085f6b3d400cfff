//! Review pipeline error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// The engine could not be launched or never acknowledged the handshake.
    #[error("Engine startup failed: {0}")]
    EngineStartup(String),

    /// A single request could not be parsed or completed.
    #[error("Engine protocol error: {0}")]
    EngineProtocol(String),

    /// The engine process died or one of its streams closed.
    #[error("Engine transport error: {0}")]
    EngineTransport(String),

    #[error("Engine did not answer within {0} ms")]
    EngineTimeout(u64),

    #[error("Engine pool is closed")]
    PoolClosed,

    #[error("PGN error: {0}")]
    Pgn(String),

    #[error("Analysis error: {0}")]
    Analysis(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<chess_core::PgnError> for ReviewError {
    fn from(e: chess_core::PgnError) -> Self {
        ReviewError::Pgn(e.to_string())
    }
}
