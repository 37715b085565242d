// Video platform URL shapes and cache key derivation

use lazy_static::lazy_static;
use regex::Regex;

use super::models::Reference;

lazy_static! {
    /// `https://www.youtube.com/watch?v=ID&...`
    static ref WATCH_URL: Regex =
        Regex::new(r"youtube\.com/watch\?(?:[^#]*&)?v=([A-Za-z0-9_-]+)").expect("valid regex");
    /// `https://youtu.be/ID?...`
    static ref SHORT_URL: Regex =
        Regex::new(r"youtu\.be/([A-Za-z0-9_-]+)").expect("valid regex");
}

/// How cache keys are derived from a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheKeying {
    /// Key on the platform id so short and long links share an entry
    #[default]
    Canonical,
    /// Key on the reference string as given
    Exact,
}

/// Pull the platform video id out of a known URL shape.
pub fn extract_video_id(reference: &str) -> Option<String> {
    WATCH_URL
        .captures(reference)
        .or_else(|| SHORT_URL.captures(reference))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Canonical watch URL for a video id.
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

/// Cache key for a reference under the given keying mode.
pub fn cache_key(reference: &str, video_id: Option<&str>, keying: CacheKeying) -> String {
    match (keying, video_id) {
        (CacheKeying::Canonical, Some(id)) => format!("youtube:{}", id),
        _ => reference.to_string(),
    }
}

/// Stable identity of the audio a reference points at, used to name artifacts.
pub fn artifact_key(reference: &Reference) -> String {
    cache_key(reference.as_str(), reference.video_id(), CacheKeying::Canonical)
}
