//! Tab-separated row formats and deck file layouts.

use std::fmt;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, info, instrument};

use super::ExportError;
use crate::card::{Card, Classification};

/// Column layout of the exported rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowFormat {
    /// Two fields: front (text + sound) and back (pinyin and gloss).
    #[default]
    Simple,
    /// Seven fields: simplified, pinyin, english, traditional, audio, code, type.
    Rich,
}

impl RowFormat {
    /// Name used in file names and on the command line.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Rich => "rich",
        }
    }

    /// Renders one card.
    #[must_use]
    pub fn row(self, card: &Card) -> Vec<String> {
        match self {
            Self::Simple => simple_row(card),
            Self::Rich => rich_row(card),
        }
    }
}

impl fmt::Display for RowFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RowFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(Self::Simple),
            "rich" => Ok(Self::Rich),
            other => Err(format!("unknown format '{other}' (expected simple or rich)")),
        }
    }
}

fn sound_tag(card: &Card) -> Option<String> {
    card.local_audio_file_name()
        .map(|name| format!("[sound:{name}]"))
}

/// `[front, back]` where front is the simplified text plus its sound tag and
/// back is `pinyin — gloss` (just the gloss when pinyin is empty).
#[must_use]
pub fn simple_row(card: &Card) -> Vec<String> {
    let front = match sound_tag(card) {
        Some(tag) => format!("{} {tag}", card.simplified),
        None => card.simplified.clone(),
    };
    let gloss = card.gloss();
    let back = if card.pinyin.is_empty() {
        gloss
    } else {
        format!("{} — {gloss}", card.pinyin)
    };
    vec![front, back]
}

/// Simplified, pinyin, gloss, traditional, sound tag, lesson code, type label.
#[must_use]
pub fn rich_row(card: &Card) -> Vec<String> {
    vec![
        card.simplified.clone(),
        card.pinyin.clone(),
        card.gloss(),
        card.traditional.clone().unwrap_or_default(),
        sound_tag(card).unwrap_or_default(),
        card.code.clone(),
        card.classification.label().to_string(),
    ]
}

/// Writes `rows` as TSV, replacing tabs and line breaks inside fields with spaces.
///
/// # Errors
///
/// Returns [`ExportError::Io`] when the file cannot be written. A partially
/// written file is removed.
pub fn write_tsv(path: &Path, rows: &[Vec<String>]) -> Result<(), ExportError> {
    let file = fs::File::create(path).map_err(|source| ExportError::io(path, source))?;
    let result = {
        let mut writer = BufWriter::new(file);
        rows.iter()
            .try_for_each(|row| {
                let line: Vec<String> = row.iter().map(|field| sanitize_field(field)).collect();
                writeln!(writer, "{}", line.join("\t"))
            })
            .and_then(|()| writer.flush())
    };
    if let Err(source) = result {
        let _ = fs::remove_file(path);
        return Err(ExportError::io(path, source));
    }
    debug!(path = %path.display(), rows = rows.len(), "wrote TSV");
    Ok(())
}

fn sanitize_field(field: &str) -> String {
    field.replace(['\t', '\r', '\n'], " ")
}

/// Writes deck files into one output directory.
#[derive(Debug, Clone)]
pub struct TsvExporter {
    output_dir: PathBuf,
    deck_name: String,
    format: RowFormat,
}

impl TsvExporter {
    /// Creates an exporter. The directory is created on first write.
    pub fn new(output_dir: impl Into<PathBuf>, deck_name: impl Into<String>, format: RowFormat) -> Self {
        Self {
            output_dir: output_dir.into(),
            deck_name: deck_name.into(),
            format,
        }
    }

    /// Path of a deck file with the given infix (`<deck>[.<infix>].<format>.tsv`).
    #[must_use]
    pub fn file_path(&self, infix: Option<&str>) -> PathBuf {
        let name = match infix {
            Some(infix) => format!("{}.{infix}.{}.tsv", self.deck_name, self.format),
            None => format!("{}.{}.tsv", self.deck_name, self.format),
        };
        self.output_dir.join(name)
    }

    /// Writes every card into `<deck>.<format>.tsv`. The file is written even
    /// when `cards` is empty.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError`] on I/O failure.
    #[instrument(skip(self, cards), fields(cards = cards.len()))]
    pub fn write_single(&self, cards: &[Card]) -> Result<Vec<PathBuf>, ExportError> {
        let path = self.file_path(None);
        self.write_bucket(&path, cards.iter())?;
        info!(path = %path.display(), "wrote deck");
        Ok(vec![path])
    }

    /// Writes `<deck>.word.<format>.tsv` and `<deck>.sentence.<format>.tsv`,
    /// skipping empty buckets.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError`] on I/O failure.
    #[instrument(skip(self, cards), fields(cards = cards.len()))]
    pub fn write_by_classification(&self, cards: &[Card]) -> Result<Vec<PathBuf>, ExportError> {
        let mut written = Vec::new();
        for classification in [Classification::Word, Classification::Sentence] {
            let bucket: Vec<&Card> = cards
                .iter()
                .filter(|card| card.classification == classification)
                .collect();
            if bucket.is_empty() {
                debug!(%classification, "no cards, skipping file");
                continue;
            }
            let infix = classification.label().to_ascii_lowercase();
            let path = self.file_path(Some(&infix));
            self.write_bucket(&path, bucket.into_iter())?;
            written.push(path);
        }
        info!(files = written.len(), "wrote split decks");
        Ok(written)
    }

    /// Writes `<deck>.level<N>.<format>.tsv` per `(level, cards)` group,
    /// skipping empty levels.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError`] on I/O failure.
    #[instrument(skip(self, levels), fields(levels = levels.len()))]
    pub fn write_by_level(&self, levels: &[(usize, Vec<Card>)]) -> Result<Vec<PathBuf>, ExportError> {
        let mut written = Vec::new();
        for (level, cards) in levels {
            if cards.is_empty() {
                debug!(level, "no cards, skipping file");
                continue;
            }
            let path = self.file_path(Some(&format!("level{level}")));
            self.write_bucket(&path, cards.iter())?;
            written.push(path);
        }
        info!(files = written.len(), "wrote level decks");
        Ok(written)
    }

    fn write_bucket<'c>(
        &self,
        path: &Path,
        cards: impl Iterator<Item = &'c Card>,
    ) -> Result<(), ExportError> {
        fs::create_dir_all(&self.output_dir)
            .map_err(|source| ExportError::io(&self.output_dir, source))?;
        let rows: Vec<Vec<String>> = cards.map(|card| self.format.row(card)).collect();
        write_tsv(path, &rows)
    }
}
