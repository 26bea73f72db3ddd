//! Merges CLI flags with config-file defaults and resolves run settings.

use std::time::Duration;

use anyhow::Result;
use clap::{ArgMatches, CommandFactory, FromArgMatches, parser::ValueSource};
use yoyo_export::catalog::{self, Course};
use yoyo_export::{FilterSet, RetryPolicy};

use super::exit_handler::UsageError;
use crate::app_config::FileConfig;
use crate::cli::{Args, DEFAULT_DECK_NAME};

/// Which config-backed flags were given explicitly on the command line.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct CliValueSources {
    pub(crate) output: bool,
    pub(crate) per_page: bool,
    pub(crate) audio_workers: bool,
    pub(crate) audio_speed: bool,
    pub(crate) max_retries: bool,
    pub(crate) timeout: bool,
    pub(crate) delay: bool,
    pub(crate) deck_name: bool,
}

pub(crate) fn parse_cli_with_sources() -> (Args, CliValueSources) {
    let matches = Args::command().get_matches();
    let args = Args::from_arg_matches(&matches).unwrap_or_else(|err| err.exit());
    let sources = sources_from_matches(&matches);
    (args, sources)
}

fn sources_from_matches(matches: &ArgMatches) -> CliValueSources {
    CliValueSources {
        output: is_commandline_value(matches, "output"),
        per_page: is_commandline_value(matches, "per_page"),
        audio_workers: is_commandline_value(matches, "audio_workers"),
        audio_speed: is_commandline_value(matches, "audio_speed"),
        max_retries: is_commandline_value(matches, "max_retries"),
        timeout: is_commandline_value(matches, "timeout"),
        delay: is_commandline_value(matches, "delay"),
        deck_name: is_commandline_value(matches, "deck_name"),
    }
}

fn is_commandline_value(matches: &ArgMatches, id: &str) -> bool {
    matches.value_source(id) == Some(ValueSource::CommandLine)
}

/// Fills every flag not given on the command line from `file_config`.
pub(crate) fn apply_config_defaults(
    mut args: Args,
    cli_sources: &CliValueSources,
    file_config: Option<&FileConfig>,
) -> Args {
    let Some(file_config) = file_config else {
        return args;
    };

    if !cli_sources.output
        && let Some(output_dir) = &file_config.output_dir
    {
        args.output = output_dir.clone();
    }
    if !cli_sources.per_page
        && let Some(per_page) = file_config.per_page
    {
        args.per_page = per_page;
    }
    if !cli_sources.audio_workers
        && let Some(workers) = file_config.audio_workers
    {
        args.audio_workers = workers;
    }
    if !cli_sources.audio_speed
        && let Some(speed) = file_config.audio_speed
    {
        args.audio_speed = speed;
    }
    if !cli_sources.max_retries
        && let Some(retries) = file_config.max_retries
    {
        args.max_retries = retries;
    }
    if !cli_sources.timeout
        && let Some(timeout) = file_config.timeout_secs
    {
        args.timeout = timeout;
    }
    if !cli_sources.delay
        && let Some(delay) = file_config.delay_ms
    {
        args.delay = delay;
    }
    args
}

pub(crate) fn resolve_default_log_level(args: &Args) -> &'static str {
    if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Non-empty, normalized cookie or a usage error naming both sources.
pub(crate) fn resolve_cookie(args: &Args) -> Result<String, UsageError> {
    args.cookie
        .as_deref()
        .map(str::trim)
        .filter(|cookie| !cookie.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            UsageError::new(
                "--cookie (or env YOYO_COOKIE) is required to authenticate to yoyochinese.com",
            )
        })
}

/// Course picked with `--course` or a catalog match for `--course-id`.
pub(crate) fn resolve_course(args: &Args) -> Result<Option<&'static Course>, UsageError> {
    if let Some(index) = args.course {
        return catalog::course_by_index(index).map(Some).ok_or_else(|| {
            UsageError::new(format!(
                "--course {index} is out of range; expected 1..={}",
                catalog::COURSES.len()
            ))
        });
    }
    Ok(args.course_id.as_deref().and_then(catalog::find_course))
}

/// The `(level number, level ID)` pairs to fetch when `--levels-subdecks` is set.
pub(crate) fn resolve_levels(
    args: &Args,
    course: Option<&'static Course>,
) -> Result<Option<&'static [&'static str]>, UsageError> {
    if !args.levels_subdecks {
        return Ok(None);
    }
    let has_course_filter = args.course.is_some() || args.course_id.is_some();
    match course {
        Some(course) => Ok(Some(&course.level_ids)),
        None if has_course_filter => Err(UsageError::new(
            "no level list is known for this --course-id; use --course or drop --levels-subdecks",
        )),
        None => Err(UsageError::new(
            "--levels-subdecks requires --course or --course-id",
        )),
    }
}

pub(crate) fn build_filters(args: &Args, course: Option<&Course>) -> FilterSet {
    let course_id = course
        .map(|course| course.id.to_string())
        .or_else(|| args.course_id.clone())
        .unwrap_or_default();
    FilterSet {
        mastery_type: args.mastery_type.trim().to_string(),
        course_id,
        level_id: args.level_id.clone().unwrap_or_default(),
        unit_id: args.unit_id.clone().unwrap_or_default(),
        lesson_id: args.lesson_id.clone().unwrap_or_default(),
        page_size: args.per_page,
        max_records: args.max_records,
        page_delay: Duration::from_millis(args.delay),
    }
}

/// Explicit `--deck-name`, else the course's deck name, else the default.
pub(crate) fn resolve_deck_name(
    args: &Args,
    cli_sources: &CliValueSources,
    course: Option<&Course>,
) -> String {
    if cli_sources.deck_name
        && let Some(name) = args.deck_name.as_deref().map(str::trim)
        && !name.is_empty()
    {
        return name.to_string();
    }
    course.map_or_else(|| DEFAULT_DECK_NAME.to_string(), Course::deck_name)
}

pub(crate) fn retry_policy(args: &Args) -> RetryPolicy {
    RetryPolicy::with_max_attempts(u32::from(args.max_retries) + 1)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use clap::Parser;
    use yoyo_export::AudioSpeed;

    use super::*;

    fn parse(argv: &[&str]) -> (Args, CliValueSources) {
        let matches = Args::command().try_get_matches_from(argv).unwrap();
        let args = Args::from_arg_matches(&matches).unwrap();
        (args, sources_from_matches(&matches))
    }

    fn file_config() -> FileConfig {
        FileConfig {
            output_dir: Some(PathBuf::from("/cfg/out")),
            per_page: Some(100),
            audio_workers: Some(4),
            audio_speed: Some(AudioSpeed::Slow),
            max_retries: Some(1),
            timeout_secs: Some(90),
            delay_ms: Some(0),
        }
    }

    #[test]
    fn test_config_fills_unset_flags() {
        let (args, sources) = parse(&["yoyo-export"]);
        let merged = apply_config_defaults(args, &sources, Some(&file_config()));
        assert_eq!(merged.output, PathBuf::from("/cfg/out"));
        assert_eq!(merged.per_page, 100);
        assert_eq!(merged.audio_workers, 4);
        assert_eq!(merged.audio_speed, AudioSpeed::Slow);
        assert_eq!(merged.max_retries, 1);
        assert_eq!(merged.timeout, 90);
        assert_eq!(merged.delay, 0);
    }

    #[test]
    fn test_explicit_flags_beat_config() {
        let (args, sources) = parse(&[
            "yoyo-export",
            "--output",
            "mine",
            "--audio-workers",
            "12",
            "--audio-speed",
            "normal",
        ]);
        let merged = apply_config_defaults(args, &sources, Some(&file_config()));
        assert_eq!(merged.output, PathBuf::from("mine"));
        assert_eq!(merged.audio_workers, 12);
        assert_eq!(merged.audio_speed, AudioSpeed::Normal);
        assert_eq!(merged.per_page, 100);
    }

    #[test]
    fn test_no_config_keeps_cli_defaults() {
        let (args, sources) = parse(&["yoyo-export"]);
        let merged = apply_config_defaults(args, &sources, None);
        assert_eq!(merged.output, PathBuf::from("export"));
        assert_eq!(merged.per_page, 50);
    }

    #[test]
    fn test_log_level_from_flags() {
        assert_eq!(resolve_default_log_level(&parse(&["x"]).0), "info");
        assert_eq!(resolve_default_log_level(&parse(&["x", "-v"]).0), "debug");
        assert_eq!(resolve_default_log_level(&parse(&["x", "-vvv"]).0), "trace");
        assert_eq!(resolve_default_log_level(&parse(&["x", "-q"]).0), "error");
    }

    #[test]
    fn test_resolve_cookie_rejects_blank() {
        let args = Args::try_parse_from(["x", "--cookie", "   "]).unwrap();
        assert!(resolve_cookie(&args).is_err());

        let args = Args::try_parse_from(["x", "--cookie", " sid=1 "]).unwrap();
        assert_eq!(resolve_cookie(&args).unwrap(), "sid=1");
    }

    #[test]
    fn test_resolve_course_by_index_and_id() {
        let args = Args::try_parse_from(["x", "--course", "2"]).unwrap();
        assert_eq!(resolve_course(&args).unwrap().unwrap().name, "Chinese Characters");

        let args = Args::try_parse_from(["x", "--course", "9"]).unwrap();
        assert!(resolve_course(&args).is_err());

        let args = Args::try_parse_from(["x", "--course-id", "5f9c5382c32d410f1447beea"]).unwrap();
        assert_eq!(
            resolve_course(&args).unwrap().unwrap().name,
            "Intermediate Conversational"
        );

        let args = Args::try_parse_from(["x", "--course-id", "custom"]).unwrap();
        assert!(resolve_course(&args).unwrap().is_none());
    }

    #[test]
    fn test_levels_require_known_course() {
        let args = Args::try_parse_from(["x", "--levels-subdecks"]).unwrap();
        assert!(resolve_levels(&args, None).is_err());

        let args = Args::try_parse_from(["x", "--levels-subdecks", "--course-id", "custom"]).unwrap();
        assert!(resolve_levels(&args, None).is_err());

        let args = Args::try_parse_from(["x", "--levels-subdecks", "--course", "1"]).unwrap();
        let course = resolve_course(&args).unwrap();
        assert_eq!(resolve_levels(&args, course).unwrap().unwrap().len(), 6);

        let args = Args::try_parse_from(["x"]).unwrap();
        assert!(resolve_levels(&args, None).unwrap().is_none());
    }

    #[test]
    fn test_build_filters_uses_course_and_cap() {
        let args = Args::try_parse_from([
            "x", "--course", "1", "--unit-id", "u7", "--max", "30", "--delay", "0",
        ])
        .unwrap();
        let course = resolve_course(&args).unwrap();
        let filters = build_filters(&args, course);
        assert_eq!(filters.course_id, "5f9c5382c32d410f1447bee9");
        assert_eq!(filters.unit_id, "u7");
        assert_eq!(filters.level_id, "");
        assert_eq!(filters.max_records, Some(30));
        assert_eq!(filters.page_delay, Duration::ZERO);
    }

    #[test]
    fn test_deck_name_resolution() {
        let (args, sources) = parse(&["x", "--course", "3"]);
        let course = resolve_course(&args).unwrap();
        assert_eq!(
            resolve_deck_name(&args, &sources, course),
            "YoyoChinese Intermediate Conversational"
        );

        let (args, sources) = parse(&["x", "--course", "3", "--deck-name", "Mine"]);
        assert_eq!(resolve_deck_name(&args, &sources, course), "Mine");

        let (args, sources) = parse(&["x"]);
        assert_eq!(resolve_deck_name(&args, &sources, None), "YoyoChinese");
    }

    #[test]
    fn test_retry_policy_counts_first_attempt() {
        let args = Args::try_parse_from(["x", "-r", "0"]).unwrap();
        assert_eq!(retry_policy(&args).max_attempts(), 1);
        let args = Args::try_parse_from(["x"]).unwrap();
        assert_eq!(retry_policy(&args).max_attempts(), 4);
    }
}
