//! Shared User-Agent string for API and audio requests.

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/fierce/yoyo-export";

/// Default User-Agent for every request (identifies the tool).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("yoyo-export/{version} (personal-flashcard-export; +{PROJECT_UA_URL})")
}
