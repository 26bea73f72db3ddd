//! Card records: the raw API shape and the normalized internal shape.
//!
//! [`Normalizer::normalize`] is a pure mapping from one [`RawCard`] to one
//! [`Card`]. It performs no I/O; the only side effect is a log line when the
//! entry type is not one we recognize.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// CDN location of practice audio clips.
pub const DEFAULT_AUDIO_BASE_URL: &str = "https://cdn.yoyochinese.com/audio/practice/";

/// Raw `wordType` value the site uses for single words.
const WORD_TYPE_WORD: i64 = 2;

/// Raw `wordType` value the site uses for full sentences.
const WORD_TYPE_SENTENCE: i64 = 3;

/// One entry of an API page, kept exactly as received.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawCard(Map<String, Value>);

impl RawCard {
    /// Wraps an already-parsed JSON object.
    #[must_use]
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Returns a top-level field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns all fields.
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for RawCard {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// Whether a card holds a single word or a full sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Classification {
    /// A single vocabulary item.
    Word,
    /// A complete sentence.
    Sentence,
}

impl Classification {
    /// Classification used when the entry type is missing or unrecognized.
    pub const DEFAULT: Self = Self::Word;

    /// Maps a raw `wordType` code, returning `None` for unknown codes.
    #[must_use]
    pub fn from_word_type(code: i64) -> Option<Self> {
        match code {
            WORD_TYPE_WORD => Some(Self::Word),
            WORD_TYPE_SENTENCE => Some(Self::Sentence),
            _ => None,
        }
    }

    /// Human-readable label (`Word` / `Sentence`).
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Word => "Word",
            Self::Sentence => "Sentence",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which pronunciation clip to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioSpeed {
    /// Native-speed recording.
    #[default]
    Normal,
    /// Slowed-down recording.
    Slow,
}

impl AudioSpeed {
    /// Stable lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Slow => "slow",
        }
    }
}

impl fmt::Display for AudioSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudioSpeed {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(Self::Normal),
            "slow" => Ok(Self::Slow),
            other => Err(format!("unknown audio speed '{other}' (expected normal or slow)")),
        }
    }
}

/// A remote audio clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioRef {
    /// Absolute URL of the clip.
    pub url: String,
    /// File name used on disk and in `[sound:...]` references (`<code>.mp3`).
    pub file_name: String,
}

/// Normalized flashcard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    /// Stable per-card identifier from the site.
    pub id: String,
    /// Lesson code, e.g. `L1-U2-03`. Empty when the site omits it.
    pub code: String,
    /// Mastery level reported by the site.
    pub mastery_level: Option<i64>,
    /// Simplified Chinese text.
    pub simplified: String,
    /// Traditional Chinese text, when provided.
    pub traditional: Option<String>,
    /// Pinyin transcription.
    pub pinyin: String,
    /// Primary English gloss.
    pub english: String,
    /// Secondary English gloss, when provided.
    pub english_alt: Option<String>,
    /// Word or sentence.
    pub classification: Classification,
    /// Normal-speed audio.
    pub audio_normal: Option<AudioRef>,
    /// Slow-speed audio.
    pub audio_slow: Option<AudioRef>,
    /// Local copy of the selected audio clip, attached after downloading.
    pub local_audio: Option<PathBuf>,
}

impl Card {
    /// English gloss with the secondary gloss appended as `a | b`.
    #[must_use]
    pub fn gloss(&self) -> String {
        match &self.english_alt {
            Some(alt) => format!("{} | {alt}", self.english),
            None => self.english.clone(),
        }
    }

    /// Audio clip for the requested speed.
    #[must_use]
    pub fn audio(&self, speed: AudioSpeed) -> Option<&AudioRef> {
        match speed {
            AudioSpeed::Normal => self.audio_normal.as_ref(),
            AudioSpeed::Slow => self.audio_slow.as_ref(),
        }
    }

    /// Lesson code, falling back to the card ID.
    #[must_use]
    pub fn index_key(&self) -> &str {
        if self.code.is_empty() { &self.id } else { &self.code }
    }

    /// File name of the attached local audio, if any.
    #[must_use]
    pub fn local_audio_file_name(&self) -> Option<&str> {
        self.local_audio
            .as_deref()
            .and_then(|path| path.file_name())
            .and_then(|name| name.to_str())
    }
}

/// Errors produced while normalizing a raw record.
#[derive(Debug, Error)]
pub enum CardError {
    /// A field every record must carry is absent.
    #[error("card record is missing required field `{field}`")]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
    },

    /// The configured audio base URL cannot be parsed.
    #[error("invalid audio base URL '{url}': {source}")]
    InvalidAudioBase {
        /// The offending URL.
        url: String,
        /// Parser error.
        #[source]
        source: url::ParseError,
    },
}

/// Maps raw API records to [`Card`]s.
#[derive(Debug, Clone)]
pub struct Normalizer {
    audio_base: Url,
}

impl Normalizer {
    /// Creates a normalizer that resolves audio codes against `audio_base`.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::InvalidAudioBase`] when `audio_base` is not an absolute URL.
    pub fn new(audio_base: &str) -> Result<Self, CardError> {
        let mut base = audio_base.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let audio_base = Url::parse(&base).map_err(|source| CardError::InvalidAudioBase {
            url: audio_base.to_string(),
            source,
        })?;
        Ok(Self { audio_base })
    }

    /// Normalizes one raw record.
    ///
    /// Unknown or missing `wordType` values map to [`Classification::DEFAULT`].
    /// Empty optional fields become `None`.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::MissingField`] when neither `id` nor `_id` is present.
    pub fn normalize(&self, raw: &RawCard) -> Result<Card, CardError> {
        let id = text_field(raw.fields(), "id")
            .or_else(|| text_field(raw.fields(), "_id"))
            .ok_or(CardError::MissingField { field: "id" })?;

        let empty = Map::new();
        let content = raw
            .get("content")
            .and_then(Value::as_object)
            .unwrap_or(&empty);

        let classification = classify(&id, raw.get("wordType"));

        Ok(Card {
            code: text_field(raw.fields(), "code").unwrap_or_default(),
            mastery_level: raw.get("masteryLevel").and_then(Value::as_i64),
            simplified: text_field(content, "simplified").unwrap_or_default(),
            traditional: text_field(content, "traditional"),
            pinyin: text_field(content, "pinyin").unwrap_or_default(),
            english: text_field(content, "english1").unwrap_or_default(),
            english_alt: text_field(content, "english2"),
            classification,
            audio_normal: self.audio_ref(&id, text_field(content, "normal")),
            audio_slow: self.audio_ref(&id, text_field(content, "slow")),
            local_audio: None,
            id,
        })
    }

    fn audio_ref(&self, card_id: &str, code: Option<String>) -> Option<AudioRef> {
        let code = code?;
        if !is_safe_audio_code(&code) {
            warn!(card_id, code = %code, "ignoring audio code that is not a plain file stem");
            return None;
        }
        let file_name = format!("{code}.mp3");
        match self.audio_base.join(&file_name) {
            Ok(url) => Some(AudioRef {
                url: url.to_string(),
                file_name,
            }),
            Err(error) => {
                warn!(card_id, code = %code, %error, "cannot build audio URL");
                None
            }
        }
    }
}

fn classify(card_id: &str, word_type: Option<&Value>) -> Classification {
    match word_type.and_then(Value::as_i64) {
        Some(code) => Classification::from_word_type(code).unwrap_or_else(|| {
            warn!(
                card_id,
                word_type = code,
                default = %Classification::DEFAULT,
                "unrecognized wordType, using default classification"
            );
            Classification::DEFAULT
        }),
        None => {
            debug!(card_id, "card has no wordType, using default classification");
            Classification::DEFAULT
        }
    }
}

/// Reads a string (or number) field, trimmed; blank values count as absent.
fn text_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    let text = match fields.get(key)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if text.is_empty() { None } else { Some(text) }
}

/// Audio codes become both a media file name and a path segment under the CDN
/// base: plain file stems only, with no path separators or URL syntax.
fn is_safe_audio_code(code: &str) -> bool {
    !code.is_empty()
        && code != "."
        && code != ".."
        && !code.contains(['/', '\\', ':', '?', '#', '%'])
        && !code.chars().any(char::is_control)
}
