//! Glue between the fetcher, the normalizer, the downloader and export.
//!
//! Order is preserved throughout: normalized cards follow fetch order, and
//! audio tasks follow card order with duplicates dropped.

use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, warn};

use crate::card::{AudioSpeed, Card, Normalizer, RawCard};
use crate::download::{DownloadReport, DownloadTask};

/// Directory under the output directory that holds audio files.
pub const MEDIA_DIR: &str = "media";

/// Normalized cards plus the number of raw records that were dropped.
#[derive(Debug, Default)]
pub struct NormalizedBatch {
    /// Cards in fetch order.
    pub cards: Vec<Card>,
    /// Raw records that could not be normalized.
    pub rejected: usize,
}

/// Normalizes `records`, logging and counting the ones that fail.
#[must_use]
pub fn normalize_all(normalizer: &Normalizer, records: &[RawCard]) -> NormalizedBatch {
    let mut batch = NormalizedBatch {
        cards: Vec::with_capacity(records.len()),
        rejected: 0,
    };
    for (position, raw) in records.iter().enumerate() {
        match normalizer.normalize(raw) {
            Ok(card) => batch.cards.push(card),
            Err(error) => {
                warn!(position, %error, "skipping card record");
                batch.rejected += 1;
            }
        }
    }
    batch
}

/// One download task per distinct audio file referenced by `cards` at `speed`.
///
/// Destinations are `<media_dir>/<code>.mp3`. Cards without audio at that
/// speed contribute nothing.
#[must_use]
pub fn plan_audio_tasks(cards: &[Card], speed: AudioSpeed, media_dir: &Path) -> Vec<DownloadTask> {
    let mut seen = HashSet::new();
    let tasks: Vec<DownloadTask> = cards
        .iter()
        .filter_map(|card| card.audio(speed))
        .filter(|audio| seen.insert(audio.file_name.clone()))
        .map(|audio| DownloadTask::new(audio.url.clone(), media_dir.join(&audio.file_name)))
        .collect();
    debug!(cards = cards.len(), tasks = tasks.len(), %speed, "planned audio tasks");
    tasks
}

/// Points each card at its local audio file when that file is on disk.
///
/// A card gets a local path only when the download report marks its task as
/// downloaded or skipped. Returns how many cards have local audio.
pub fn attach_local_audio(
    cards: &mut [Card],
    speed: AudioSpeed,
    media_dir: &Path,
    report: &DownloadReport,
) -> usize {
    let mut attached = 0;
    for card in cards.iter_mut() {
        let Some(audio) = card.audio(speed) else {
            continue;
        };
        let task = DownloadTask::new(audio.url.clone(), media_dir.join(&audio.file_name));
        if report.outcome(&task).is_some_and(|outcome| outcome.has_file()) {
            card.local_audio = Some(task.destination);
            attached += 1;
        }
    }
    attached
}
