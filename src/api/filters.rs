//! User filters and the JSON request body for the card-listing endpoint.

use std::time::Duration;

use serde::Serialize;

/// Default number of cards requested per page.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Default pause between consecutive page requests.
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_millis(200);

/// Default mastery filter value (every card regardless of progress).
pub const DEFAULT_MASTERY_TYPE: &str = "all";

/// Filters applied to the card listing, plus paging controls.
///
/// Empty IDs mean "no filter" on that dimension, matching what the site's own
/// flashcard manager sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSet {
    /// Mastery filter value, e.g. `all`, `learning`, `mastered`.
    pub mastery_type: String,
    /// Course ID filter.
    pub course_id: String,
    /// Level ID filter.
    pub level_id: String,
    /// Unit ID filter.
    pub unit_id: String,
    /// Lesson ID filter.
    pub lesson_id: String,
    /// Cards requested per page (values below 1 are treated as 1).
    pub page_size: u32,
    /// Stop after this many records.
    pub max_records: Option<usize>,
    /// Pause between page requests.
    pub page_delay: Duration,
}

impl Default for FilterSet {
    fn default() -> Self {
        Self {
            mastery_type: DEFAULT_MASTERY_TYPE.to_string(),
            course_id: String::new(),
            level_id: String::new(),
            unit_id: String::new(),
            lesson_id: String::new(),
            page_size: DEFAULT_PAGE_SIZE,
            max_records: None,
            page_delay: DEFAULT_PAGE_DELAY,
        }
    }
}

impl FilterSet {
    /// Page size actually sent to the API.
    #[must_use]
    pub fn effective_page_size(&self) -> u32 {
        self.page_size.max(1)
    }

    /// Returns a copy narrowed to one level, with unit and lesson filters cleared.
    #[must_use]
    pub fn for_level(&self, level_id: &str) -> Self {
        Self {
            level_id: level_id.to_string(),
            unit_id: String::new(),
            lesson_id: String::new(),
            ..self.clone()
        }
    }

    pub(crate) fn request_body(&self, page: u32) -> PageRequest<'_> {
        PageRequest {
            filters: RequestFilters {
                mastery_type: MasteryType {
                    value: &self.mastery_type,
                    label: capitalize(&self.mastery_type),
                },
                course_id: &self.course_id,
                level_id: &self.level_id,
                unit_id: &self.unit_id,
                lesson_id: &self.lesson_id,
            },
            page,
            cards_per_page: self.effective_page_size(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PageRequest<'a> {
    filters: RequestFilters<'a>,
    page: u32,
    cards_per_page: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestFilters<'a> {
    mastery_type: MasteryType<'a>,
    course_id: &'a str,
    level_id: &'a str,
    unit_id: &'a str,
    lesson_id: &'a str,
}

#[derive(Debug, Serialize)]
struct MasteryType<'a> {
    value: &'a str,
    label: String,
}

/// Uppercases the first character and lowercases the rest (`learning` -> `Learning`).
fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
