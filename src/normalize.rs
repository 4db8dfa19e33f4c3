//! YouTube URL validation and identifier extraction.
//!
//! Validation and extraction are separate passes. Validation is anchored and
//! tolerant about the scheme and `www.` prefix; extraction walks an ordered
//! pattern list from the most specific URL shape to the most generic one and
//! keeps the first 11-character capture.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

const VALIDATION_PATTERNS: [&str; 8] = [
    r"^(https?://)?(www\.)?youtube\.com/watch\?v=[a-zA-Z0-9_-]{11}",
    r"^(https?://)?(www\.)?youtu\.be/[a-zA-Z0-9_-]{11}",
    r"^(https?://)?(www\.)?youtube\.com/shorts/[a-zA-Z0-9_-]{11}",
    r"^(https?://)?(www\.)?youtube\.com/live/[a-zA-Z0-9_-]{11}",
    r"^(https?://)?(www\.)?youtube\.com/embed/[a-zA-Z0-9_-]{11}",
    r"^(https?://)?(www\.)?youtube\.com/v/[a-zA-Z0-9_-]{11}",
    r"^(https?://)?(www\.)?youtube\.com/.*[?&]v=[a-zA-Z0-9_-]{11}",
    r"^(https?://)?m\.youtube\.com/watch\?v=[a-zA-Z0-9_-]{11}",
];

// Order matters: the generic query-string and path fallbacks stay last.
const EXTRACTION_PATTERNS: [&str; 8] = [
    r"(?:youtu\.be/)([a-zA-Z0-9_-]{11})",
    r"(?:youtube\.com/watch\?v=)([a-zA-Z0-9_-]{11})",
    r"(?:youtube\.com/embed/)([a-zA-Z0-9_-]{11})",
    r"(?:youtube\.com/v/)([a-zA-Z0-9_-]{11})",
    r"(?:youtube\.com/shorts/)([a-zA-Z0-9_-]{11})",
    r"(?:youtube\.com/live/)([a-zA-Z0-9_-]{11})",
    r"(?:youtube\.com/.*[?&]v=)([a-zA-Z0-9_-]{11})",
    r"(?:youtube\.com/.*/)([a-zA-Z0-9_-]{11})(?:[?&]|$)",
];

static VALIDATORS: LazyLock<Vec<Regex>> = LazyLock::new(|| compile(&VALIDATION_PATTERNS));
static EXTRACTORS: LazyLock<Vec<Regex>> = LazyLock::new(|| compile(&EXTRACTION_PATTERNS));
static VIDEO_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]{11}$").expect("video id pattern compiles"));
static PLAYLIST_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[?&]list=([a-zA-Z0-9_-]+)").expect("playlist pattern compiles")
});
static PLAYLIST_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("playlist id pattern compiles"));

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|pattern| Regex::new(pattern).expect("url shape pattern compiles"))
        .collect()
}

/// A user-supplied URL together with whatever identifiers could be read out
/// of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoReference {
    pub raw_url: String,
    pub video_id: Option<String>,
    pub playlist_id: Option<String>,
}

impl VideoReference {
    pub fn parse(raw_url: &str) -> Self {
        Self {
            raw_url: raw_url.to_string(),
            video_id: extract_video_id(raw_url),
            playlist_id: extract_playlist_id(raw_url),
        }
    }

    pub fn is_playlist_only(&self) -> bool {
        self.video_id.is_none() && self.playlist_id.is_some()
    }
}

/// Whether the input has one of the eight recognized YouTube URL shapes.
pub fn is_valid_youtube_url(input: &str) -> bool {
    let input = input.trim();
    VALIDATORS.iter().any(|pattern| pattern.is_match(input))
}

pub fn extract_video_id(input: &str) -> Option<String> {
    let input = input.trim();

    for (index, pattern) in EXTRACTORS.iter().enumerate() {
        let candidate = pattern
            .captures(input)
            .and_then(|captures| captures.get(1))
            .map(|capture| capture.as_str())
            .filter(|value| value.len() == 11);

        if let Some(video_id) = candidate {
            debug!("Extracted video id {video_id} with pattern #{index}");
            return Some(video_id.to_string());
        }
    }

    debug!("Could not extract a video id from {input:?}");
    None
}

pub fn extract_playlist_id(input: &str) -> Option<String> {
    let input = input.trim();
    if !input.contains("youtube.com") && !input.contains("youtu.be") {
        return None;
    }

    PLAYLIST_PARAM
        .captures(input)
        .and_then(|captures| captures.get(1))
        .map(|capture| capture.as_str().to_string())
}

pub fn is_video_id(value: &str) -> bool {
    VIDEO_ID.is_match(value)
}

/// Accepts a bare identifier or any recognized URL.
pub fn resolve_video_id(input: &str) -> Option<String> {
    let input = input.trim();
    if is_video_id(input) {
        return Some(input.to_string());
    }
    extract_video_id(input)
}

pub fn resolve_playlist_id(input: &str) -> Option<String> {
    let input = input.trim();
    if PLAYLIST_ID.is_match(input) {
        return Some(input.to_string());
    }
    extract_playlist_id(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "dQw4w9WgXcQ";

    fn shapes(id: &str) -> Vec<String> {
        vec![
            format!("https://www.youtube.com/watch?v={id}"),
            format!("https://youtu.be/{id}"),
            format!("https://www.youtube.com/shorts/{id}"),
            format!("https://www.youtube.com/live/{id}"),
            format!("https://www.youtube.com/embed/{id}"),
            format!("https://www.youtube.com/v/{id}"),
            format!("https://www.youtube.com/attribution_link?feature=share&v={id}"),
            format!("https://m.youtube.com/watch?v={id}"),
        ]
    }

    #[test]
    fn every_shape_validates_and_extracts() {
        for id in [ID, "a_b-c_d-e_f", "___________", "-----------", "Z9z9Z9z9Z9z"] {
            for url in shapes(id) {
                assert!(is_valid_youtube_url(&url), "{url} should validate");
                assert_eq!(extract_video_id(&url).as_deref(), Some(id), "{url}");
            }
        }
    }

    #[test]
    fn scheme_and_www_are_optional_for_validation() {
        assert!(is_valid_youtube_url("youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(is_valid_youtube_url("http://youtu.be/dQw4w9WgXcQ"));
        assert!(is_valid_youtube_url("www.youtube.com/shorts/dQw4w9WgXcQ"));
        assert!(is_valid_youtube_url("  https://youtu.be/dQw4w9WgXcQ  "));
    }

    #[test]
    fn extra_query_parameters_are_ignored() {
        let url = "https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=PLrAXtmRdnEQy4qtr&t=42s";
        assert_eq!(extract_video_id(url).as_deref(), Some(ID));
        assert_eq!(extract_video_id("https://youtu.be/dQw4w9WgXcQ?t=30").as_deref(), Some(ID));
    }

    #[test]
    fn specific_patterns_win_over_generic_query() {
        let url = "https://www.youtube.com/embed/dQw4w9WgXcQ?v=AAAAAAAAAAA";
        assert_eq!(extract_video_id(url).as_deref(), Some(ID));
    }

    #[test]
    fn path_fallback_catches_unlisted_shapes() {
        let url = "https://www.youtube.com/e/dQw4w9WgXcQ";
        assert!(!is_valid_youtube_url(url));
        assert_eq!(extract_video_id(url).as_deref(), Some(ID));
    }

    #[test]
    fn unrecognized_input_is_rejected_without_panicking() {
        for input in [
            "",
            "   ",
            "not a url",
            "https://vimeo.com/123456789",
            "https://www.youtube.com/watch?v=short",
            "https://www.youtube.com/channel/",
            "https://example.com/?v=dQw4w9WgXcQ",
            "https://notyoutube.org/watch?v=dQw4w9WgXcQ",
        ] {
            assert!(!is_valid_youtube_url(input), "{input:?} should not validate");
            assert_eq!(extract_video_id(input), None, "{input:?}");
        }
    }

    #[test]
    fn playlist_ids_come_from_list_parameter() {
        let reference =
            VideoReference::parse("https://www.youtube.com/playlist?list=PLrAXtmRdnEQy4qtr");
        assert_eq!(reference.video_id, None);
        assert_eq!(reference.playlist_id.as_deref(), Some("PLrAXtmRdnEQy4qtr"));
        assert!(reference.is_playlist_only());

        let reference =
            VideoReference::parse("https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=PL123");
        assert_eq!(reference.video_id.as_deref(), Some(ID));
        assert_eq!(reference.playlist_id.as_deref(), Some("PL123"));
        assert!(!reference.is_playlist_only());

        assert_eq!(extract_playlist_id("https://example.com/?list=PL123"), None);
    }

    #[test]
    fn resolve_accepts_ids_and_urls() {
        assert_eq!(resolve_video_id(ID).as_deref(), Some(ID));
        assert_eq!(resolve_video_id("https://youtu.be/dQw4w9WgXcQ").as_deref(), Some(ID));
        assert_eq!(resolve_video_id("dQw4w9WgXc"), None);
        assert_eq!(resolve_playlist_id("PL123").as_deref(), Some("PL123"));
        assert_eq!(
            resolve_playlist_id("https://www.youtube.com/playlist?list=PL123").as_deref(),
            Some("PL123")
        );
        assert_eq!(resolve_playlist_id("PL 123"), None);
    }
}
