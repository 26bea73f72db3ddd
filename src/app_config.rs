//! Config file defaults for the CLI.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use yoyo_export::AudioSpeed;

const APP_DIR: &str = "yoyo-export";
const CONFIG_FILE: &str = "config.toml";

/// Defaults read from the `key = value` config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Output directory for decks and media.
    pub output_dir: Option<PathBuf>,
    /// Cards requested per page.
    pub per_page: Option<u32>,
    /// Concurrent audio downloads.
    pub audio_workers: Option<u8>,
    /// Audio speed to download.
    pub audio_speed: Option<AudioSpeed>,
    /// Retries after the first attempt.
    pub max_retries: Option<u8>,
    /// Per-request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Delay between page requests in milliseconds.
    pub delay_ms: Option<u64>,
}

impl FileConfig {
    /// Validates values against the same ranges the CLI enforces.
    pub fn validate(&self) -> Result<()> {
        if let Some(per_page) = self.per_page
            && !(1..=1000).contains(&per_page)
        {
            bail!("Invalid config value for `per_page`: {per_page}. Expected range: 1..=1000");
        }
        if let Some(workers) = self.audio_workers
            && !(1..=64).contains(&workers)
        {
            bail!("Invalid config value for `audio_workers`: {workers}. Expected range: 1..=64");
        }
        if let Some(retries) = self.max_retries
            && retries > 10
        {
            bail!("Invalid config value for `max_retries`: {retries}. Expected range: 0..=10");
        }
        if let Some(timeout) = self.timeout_secs
            && !(1..=3600).contains(&timeout)
        {
            bail!("Invalid config value for `timeout_secs`: {timeout}. Expected range: 1..=3600");
        }
        if let Some(delay) = self.delay_ms
            && delay > 60_000
        {
            bail!("Invalid config value for `delay_ms`: {delay}. Expected range: 0..=60000");
        }
        Ok(())
    }
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/yoyo-export/config.toml`
/// 2. `$HOME/.config/yoyo-export/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join(APP_DIR).join(CONFIG_FILE));
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join(CONFIG_FILE),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from the default path if present.
pub fn load_default_file_config() -> Result<LoadedConfig> {
    let path = resolve_default_config_path();
    let config = match path.as_deref() {
        Some(path_ref) if path_ref.exists() => Some(load_file_config(path_ref)?),
        _ => None,
    };
    Ok(LoadedConfig { path, config })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line_no = line_index + 1;
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_no}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let invalid = || format!("Invalid `{key}` value on line {line_no}");

        match key {
            "output_dir" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                cfg.output_dir = Some(PathBuf::from(parsed));
            }
            "per_page" => {
                let parsed = parse_integer_u64(value).with_context(invalid)?;
                cfg.per_page = Some(narrow(parsed).with_context(invalid)?);
            }
            "audio_workers" => {
                let parsed = parse_integer_u64(value).with_context(invalid)?;
                cfg.audio_workers = Some(narrow(parsed).with_context(invalid)?);
            }
            "audio_speed" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                let speed = parsed
                    .parse::<AudioSpeed>()
                    .map_err(anyhow::Error::msg)
                    .with_context(invalid)?;
                cfg.audio_speed = Some(speed);
            }
            "max_retries" => {
                let parsed = parse_integer_u64(value).with_context(invalid)?;
                cfg.max_retries = Some(narrow(parsed).with_context(invalid)?);
            }
            "timeout_secs" => {
                cfg.timeout_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "delay_ms" => {
                cfg.delay_ms = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn narrow<T: TryFrom<u64>>(value: u64) -> Result<T> {
    T::try_from(value).map_err(|_| anyhow::anyhow!("Integer value {value} out of range"))
}
