//! CLI output formatting: run summary, failure listing, course menu.

use std::path::PathBuf;

use yoyo_export::DownloadReport;
use yoyo_export::catalog::COURSES;

/// Failed downloads listed individually before the rest are summarized.
const MAX_LISTED_FAILURES: usize = 10;

/// Returns terminal width from COLUMNS, or 80 if unset/invalid.
pub(crate) fn terminal_width() -> usize {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|width| *width >= 20)
        .unwrap_or(80)
}

/// Truncates text to at most `width` chars, appending ellipsis if truncated.
pub(crate) fn truncate_to_width(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut output: String = text.chars().take(width - 1).collect();
    output.push('…');
    output
}

/// One line per known course, numbered for `--course`.
pub(crate) fn course_menu_lines() -> Vec<String> {
    COURSES
        .iter()
        .enumerate()
        .map(|(index, course)| format!("{:>2}) {} [{}]", index + 1, course.name, course.id))
        .collect()
}

/// Counts shown at the end of a run.
#[derive(Debug, Default)]
pub(crate) struct RunSummary {
    pub(crate) fetched: usize,
    pub(crate) exported: usize,
    pub(crate) rejected: usize,
    pub(crate) fetch_stopped_at_page: Option<u32>,
    pub(crate) files: Vec<PathBuf>,
}

pub(crate) fn render_summary_lines(
    summary: &RunSummary,
    report: Option<&DownloadReport>,
    width: usize,
) -> Vec<String> {
    let mut lines = vec![format!(
        "Exported {} of {} fetched cards.",
        summary.exported, summary.fetched
    )];
    if summary.rejected > 0 {
        lines.push(format!(
            "Skipped {} malformed card records.",
            summary.rejected
        ));
    }
    if let Some(page) = summary.fetch_stopped_at_page {
        lines.push(format!(
            "Fetch stopped at page {page} after retries; the export is incomplete. Run again later."
        ));
    }
    if let Some(report) = report {
        lines.push(format!(
            "Audio: {} downloaded, {} already present, {} failed.",
            report.succeeded(),
            report.skipped(),
            report.failed()
        ));
        lines.extend(render_failure_lines(report, width));
    }
    for file in &summary.files {
        lines.push(truncate_to_width(&format!("Wrote {}", file.display()), width));
    }
    lines
}

fn render_failure_lines(report: &DownloadReport, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for (task, reason) in report.failures().take(MAX_LISTED_FAILURES) {
        lines.push(truncate_to_width(&format!("- {}: {reason}", task.url), width));
    }
    let hidden = report.failed().saturating_sub(MAX_LISTED_FAILURES);
    if hidden > 0 {
        lines.push(format!("- ... and {hidden} more"));
    }
    lines
}

pub(crate) fn print_summary(summary: &RunSummary, report: Option<&DownloadReport>) {
    for line in render_summary_lines(summary, report, terminal_width()) {
        println!("{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_to_width() {
        assert_eq!(truncate_to_width("short", 10), "short");
        assert_eq!(truncate_to_width("abcdef", 4), "abc…");
        assert_eq!(truncate_to_width("abc", 0), "");
    }

    #[test]
    fn test_course_menu_is_numbered_from_one() {
        let lines = course_menu_lines();
        assert_eq!(lines.len(), COURSES.len());
        assert!(lines[0].starts_with(" 1) Beginner Conversational"));
    }

    #[test]
    fn test_summary_mentions_partial_fetch_and_rejects() {
        let summary = RunSummary {
            fetched: 12,
            exported: 11,
            rejected: 1,
            fetch_stopped_at_page: Some(3),
            files: vec![PathBuf::from("export/Deck.simple.tsv")],
        };
        let lines = render_summary_lines(&summary, None, 200);
        assert_eq!(lines[0], "Exported 11 of 12 fetched cards.");
        assert!(lines.iter().any(|line| line.contains("1 malformed")));
        assert!(lines.iter().any(|line| line.contains("page 3")));
        assert_eq!(lines.last().unwrap(), "Wrote export/Deck.simple.tsv");
    }

    #[test]
    fn test_summary_with_empty_report() {
        let summary = RunSummary::default();
        let report = DownloadReport::default();
        let lines = render_summary_lines(&summary, Some(&report), 80);
        assert!(lines.contains(&"Audio: 0 downloaded, 0 already present, 0 failed.".to_string()));
    }
}
