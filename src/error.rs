// Error types
//
// Display setup failures are fatal to `DisplayEngine::start`; export
// failures are reported by the render loop and never stop it.

use crate::app::EngineState;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The terminal surface or the render thread could not be created
    #[error("unable to initialize display: {0}")]
    DisplaySetup(String),

    #[error(
        "terminal is {columns}x{rows}; at least {min_columns} columns and {min_rows} rows are required"
    )]
    TerminalTooSmall {
        columns: u16,
        rows: u16,
        min_columns: u16,
        min_rows: u16,
    },

    #[error("display engine cannot start from state {0:?}")]
    InvalidState(EngineState),
}

impl EngineError {
    pub fn setup(context: &str, err: io::Error) -> Self {
        EngineError::DisplaySetup(format!("{}: {}", context, err))
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("cannot write export file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot encode export document: {0}")]
    Encode(#[from] serde_json::Error),
}
