//! Crate-wide error type for the UCI adapter and opening-book loader.

use std::fmt;

use crate::board::FenError;

#[derive(Debug)]
pub enum EngineError {
    Fen(FenError),
    UnknownCommand(String),
    MalformedCommand(String),
    OpeningBook(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Fen(e) => write!(f, "{e}"),
            EngineError::UnknownCommand(cmd) => write!(f, "unknown command: {cmd}"),
            EngineError::MalformedCommand(msg) => write!(f, "malformed command: {msg}"),
            EngineError::OpeningBook(msg) => write!(f, "opening book error: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<FenError> for EngineError {
    fn from(e: FenError) -> Self {
        EngineError::Fen(e)
    }
}
