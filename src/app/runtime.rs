use std::collections::HashSet;
use std::io::{self, IsTerminal};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use yoyo_export::pipeline::{self, MEDIA_DIR};
use yoyo_export::{
    ApiClient, AudioDownloader, Card, DownloadReport, DownloadTask, FetchFailure, FetchResult,
    FilterSet, HttpClient, Normalizer, RetryPolicy, SessionConfig, TsvExporter, fetch_all,
    fetch_levels,
};

use crate::app::exit_handler::{RunShortfall, UsageError};
use crate::app::output::{self, RunSummary};
use crate::app::progress_manager::DownloadProgress;
use crate::app::{config_runtime, exit_handler, terminal};
use crate::cli::Args;
use crate::{ProcessExit, app_config};

/// Cards of one deck group; the level number is 0 outside `--levels-subdecks`.
type CardGroup = (usize, Vec<Card>);

pub(crate) async fn run() -> Result<ProcessExit> {
    let (args, cli_sources) = config_runtime::parse_cli_with_sources();

    if args.list_courses {
        for line in output::course_menu_lines() {
            println!("{line}");
        }
        return Ok(ProcessExit::Success);
    }

    let loaded = app_config::load_default_file_config()
        .context(UsageError::new("Invalid configuration file"))?;
    let args = config_runtime::apply_config_defaults(args, &cli_sources, loaded.config.as_ref());

    let no_color = terminal::no_color_env_requested() || terminal::is_dumb_terminal();
    terminal::init_tracing(config_runtime::resolve_default_log_level(&args), no_color);

    if loaded.config.is_some()
        && let Some(path) = loaded.path.as_deref()
    {
        debug!(path = %path.display(), "Loaded config file");
    }
    info!("yoyo-export starting");

    let cookie = config_runtime::resolve_cookie(&args)?;
    let course = config_runtime::resolve_course(&args)?;
    let levels = config_runtime::resolve_levels(&args, course)?;
    let filters = config_runtime::build_filters(&args, course);
    let deck_name = config_runtime::resolve_deck_name(&args, &cli_sources, course);
    let policy = config_runtime::retry_policy(&args);
    let timeout = Duration::from_secs(args.timeout);

    let normalizer = Normalizer::new(&args.audio_base_url)
        .map_err(|error| UsageError::new(format!("Invalid --audio-base-url: {error}")))?;
    let session = SessionConfig::new(&cookie)
        .with_api_url(args.api_url.clone())
        .with_request_timeout(timeout);
    let client = ApiClient::new(session).context("Failed to create API client")?;

    if let Some(course) = course {
        info!(course = course.name, deck = %deck_name, "Exporting course");
    }
    if levels.is_some() && args.split_by_wordtype {
        info!("--levels-subdecks ignores --split-by-wordtype");
    }

    let mut fetched = fetch_groups(&client, &filters, levels, &policy)
        .await
        .map_err(|failure| anyhow::Error::new(failure).context("Failed to fetch flashcards"))?;

    let fetched_total: usize = fetched.iter().map(|(_, result)| result.records.len()).sum();
    if fetched_total == 0
        && let Some(failure) = fetched
            .iter_mut()
            .find_map(|(_, result)| result.failure.take())
    {
        return Err(anyhow::Error::new(failure).context("Failed to fetch flashcards"));
    }
    if fetched_total == 0 {
        warn!("No flashcards matched the filters");
    }
    let fetch_stopped_at_page = fetched
        .iter()
        .find_map(|(_, result)| result.failure.as_ref().map(|failure| failure.page));
    info!(cards = fetched_total, groups = fetched.len(), "Fetched flashcards");

    let mut rejected = 0;
    let mut groups: Vec<CardGroup> = fetched
        .into_iter()
        .map(|(level, result)| {
            let batch = pipeline::normalize_all(&normalizer, &result.records);
            rejected += batch.rejected;
            (level, batch.cards)
        })
        .collect();

    let report = if args.include_audio {
        Some(download_audio(&args, &mut groups, &policy, timeout).await?)
    } else {
        None
    };

    let exporter = TsvExporter::new(&args.output, deck_name, args.format);
    let files = if levels.is_some() {
        exporter.write_by_level(&groups)
    } else {
        let cards: Vec<Card> = groups.into_iter().flat_map(|(_, cards)| cards).collect();
        if args.split_by_wordtype {
            exporter.write_by_classification(&cards)
        } else {
            exporter.write_single(&cards)
        }
    }
    .context("Failed to write deck files")?;

    let failed_downloads = report.as_ref().map_or(0, DownloadReport::failed);
    let summary = RunSummary {
        fetched: fetched_total,
        exported: fetched_total - rejected,
        rejected,
        fetch_stopped_at_page,
        files,
    };
    if !args.quiet {
        output::print_summary(&summary, report.as_ref());
    }

    Ok(exit_handler::determine_exit_outcome(RunShortfall {
        fetch_incomplete: fetch_stopped_at_page.is_some(),
        rejected_records: rejected,
        failed_downloads,
    }))
}

async fn fetch_groups(
    client: &ApiClient,
    filters: &FilterSet,
    levels: Option<&[&str]>,
    policy: &RetryPolicy,
) -> Result<Vec<(usize, FetchResult)>, FetchFailure> {
    match levels {
        Some(level_ids) => Ok(fetch_levels(client, filters, level_ids, policy)
            .await?
            .into_iter()
            .map(|level| (level.level, level.result))
            .collect()),
        None => Ok(vec![(0, fetch_all(client, filters, policy).await?)]),
    }
}

/// Downloads audio for every group and points cards at the files that exist.
async fn download_audio(
    args: &Args,
    groups: &mut [CardGroup],
    policy: &RetryPolicy,
    timeout: Duration,
) -> Result<DownloadReport> {
    let media_dir = args.output.join(MEDIA_DIR);
    let mut seen = HashSet::new();
    let tasks: Vec<DownloadTask> = groups
        .iter()
        .flat_map(|(_, cards)| pipeline::plan_audio_tasks(cards, args.audio_speed, &media_dir))
        .filter(|task| seen.insert(task.destination.clone()))
        .collect();
    info!(files = tasks.len(), speed = %args.audio_speed, "Downloading audio");

    let fetcher =
        HttpClient::with_request_timeout(timeout).context("Failed to create download client")?;
    let downloader = AudioDownloader::new(fetcher, policy.clone());
    let use_bar = terminal::should_use_progress_bar(
        io::stderr().is_terminal(),
        args.quiet,
        terminal::is_dumb_terminal(),
    );
    let mut progress = DownloadProgress::new(use_bar, tasks.len());
    let report = downloader
        .download_all_with_progress(tasks, usize::from(args.audio_workers), |task, outcome| {
            progress.record(task, outcome);
        })
        .await
        .context("Audio download could not start")?;
    progress.finish();

    info!(
        downloaded = report.succeeded(),
        skipped = report.skipped(),
        failed = report.failed(),
        retried = report.retried(),
        "Audio download complete"
    );

    let mut attached = 0;
    for (_, cards) in groups.iter_mut() {
        attached += pipeline::attach_local_audio(cards, args.audio_speed, &media_dir, &report);
    }
    debug!(attached, "Attached local audio");
    Ok(report)
}
