//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use yoyo_export::api::{DEFAULT_API_URL, DEFAULT_MASTERY_TYPE, DEFAULT_PAGE_SIZE};
use yoyo_export::card::DEFAULT_AUDIO_BASE_URL;
use yoyo_export::{AudioSpeed, DEFAULT_WORKERS, RowFormat};

pub(crate) const DEFAULT_OUTPUT_DIR: &str = "export";
pub(crate) const DEFAULT_DECK_NAME: &str = "YoyoChinese";
pub(crate) const DEFAULT_MAX_RETRIES: u8 = 3;
pub(crate) const DEFAULT_DELAY_MS: u64 = 200;
pub(crate) const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Export YoYo Chinese flashcards to Anki-importable TSV files.
///
/// Fetches your flashcards with a browser session cookie, optionally downloads
/// pronunciation audio into `<output>/media`, and writes one or more TSV decks.
///
/// Exit codes: 0 success, 1 partial export, 2 usage or configuration error,
/// 3 fetch aborted.
#[derive(Parser, Debug)]
#[command(name = "yoyo-export")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Cookie header copied from a logged-in browser session (with or without the `Cookie:` prefix)
    #[arg(long, env = "YOYO_COOKIE", hide_env_values = true)]
    pub cookie: Option<String>,

    /// Deck name used in output file names [default: YoyoChinese, or "YoyoChinese <course>" with --course]
    #[arg(long)]
    pub deck_name: Option<String>,

    /// Output directory for TSV files and media
    #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
    pub output: PathBuf,

    /// Cards requested per page (1-1000)
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE, value_parser = clap::value_parser!(u32).range(1..=1000))]
    pub per_page: u32,

    /// Stop after this many cards (per level with --levels-subdecks)
    #[arg(long = "max")]
    pub max_records: Option<usize>,

    /// Delay between page requests in milliseconds (0-60000)
    #[arg(long, default_value_t = DEFAULT_DELAY_MS, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub delay: u64,

    /// Mastery filter as understood by the site (e.g. all, learning, mastered)
    #[arg(long, default_value = DEFAULT_MASTERY_TYPE)]
    pub mastery_type: String,

    /// Course ID filter
    #[arg(long, conflicts_with = "course")]
    pub course_id: Option<String>,

    /// Pick a known course by its 1-based position in --list-courses
    #[arg(long)]
    pub course: Option<usize>,

    /// Print the known courses and exit
    #[arg(long)]
    pub list_courses: bool,

    /// Level ID filter
    #[arg(long)]
    pub level_id: Option<String>,

    /// Unit ID filter
    #[arg(long)]
    pub unit_id: Option<String>,

    /// Lesson ID filter
    #[arg(long)]
    pub lesson_id: Option<String>,

    /// Row format: simple (Front/Back) or rich (7 fields)
    #[arg(long, default_value_t = RowFormat::Simple)]
    pub format: RowFormat,

    /// Download audio into <output>/media and reference it from the decks
    #[arg(long)]
    pub include_audio: bool,

    /// Maximum concurrent audio downloads (1-64)
    #[arg(long, default_value_t = DEFAULT_WORKERS as u8, value_parser = clap::value_parser!(u8).range(1..=64))]
    pub audio_workers: u8,

    /// Audio speed to download and reference: normal or slow
    #[arg(long, default_value_t = AudioSpeed::Normal)]
    pub audio_speed: AudioSpeed,

    /// Write separate decks for words and sentences
    #[arg(long)]
    pub split_by_wordtype: bool,

    /// Fetch each level of the course separately and write one deck per level (overrides --split-by-wordtype)
    #[arg(long)]
    pub levels_subdecks: bool,

    /// Retries after the first attempt for transient failures (0-10)
    #[arg(short = 'r', long, default_value_t = DEFAULT_MAX_RETRIES, value_parser = clap::value_parser!(u8).range(0..=10))]
    pub max_retries: u8,

    /// Per-request timeout in seconds (1-3600)
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub timeout: u64,

    /// Flashcard API endpoint
    #[arg(long, default_value = DEFAULT_API_URL, hide = true)]
    pub api_url: String,

    /// Base URL audio codes are resolved against
    #[arg(long, default_value = DEFAULT_AUDIO_BASE_URL, hide = true)]
    pub audio_base_url: String,
}
