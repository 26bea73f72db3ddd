//! CLI entry point for the yoyo-export tool.

use std::process::ExitCode;

mod app;
mod app_config;
mod cli;

/// Process outcome, mapped onto the exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    /// Everything fetched, normalized, downloaded and written.
    Success,
    /// Decks were written but some pages, records or audio files are missing.
    Partial,
    /// Unexpected runtime failure (for example the output directory is not writable).
    Failure,
    /// Bad flags, bad config file or missing credentials.
    Usage,
    /// The fetch was aborted before any usable data arrived.
    FetchAborted,
}

impl ProcessExit {
    pub(crate) fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Partial | Self::Failure => 1,
            Self::Usage => 2,
            Self::FetchAborted => 3,
        }
    }
}

impl From<ProcessExit> for ExitCode {
    fn from(outcome: ProcessExit) -> Self {
        ExitCode::from(outcome.code())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match app::runtime::run().await {
        Ok(outcome) => outcome.into(),
        Err(error) => {
            eprintln!("Error: {error:#}");
            app::exit_handler::exit_for_error(&error).into()
        }
    }
}
