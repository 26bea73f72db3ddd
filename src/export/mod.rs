//! Deck file output.

mod tsv;

use std::path::{Path, PathBuf};

use thiserror::Error;

pub use tsv::{RowFormat, TsvExporter, rich_row, simple_row, write_tsv};

/// Errors produced while writing deck files.
#[derive(Debug, Error)]
pub enum ExportError {
    /// I/O error writing a deck file or creating its directory.
    #[error("I/O error writing {path}: {source}")]
    Io {
        /// The path being written.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl ExportError {
    fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}
