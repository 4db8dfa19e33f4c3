use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

const FALLBACK_QUALITIES: [&str; 2] = ["720p", "480p"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    #[serde(rename = "mp4")]
    Video,
    #[serde(rename = "mp3")]
    Audio,
}

impl MediaKind {
    pub fn extension(self) -> &'static str {
        match self {
            MediaKind::Video => "mp4",
            MediaKind::Audio => "mp3",
        }
    }

    pub fn default_quality(self) -> &'static str {
        match self {
            MediaKind::Video => "720p",
            MediaKind::Audio => "128kbps",
        }
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mp4" | "video" => Ok(MediaKind::Video),
            "mp3" | "audio" => Ok(MediaKind::Audio),
            other => Err(format!("unknown format {other:?}, expected mp4 or mp3")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadCandidate {
    pub url: String,
    pub container: Option<String>,
    pub quality_label: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VideoInfo {
    pub title: String,
    pub thumbnail_url: Option<String>,
    pub duration_seconds: Option<u64>,
    pub author: String,
    pub videos: Vec<DownloadCandidate>,
    pub audios: Vec<DownloadCandidate>,
}

// Upstream schema, consumed as-is. Every field is optional in practice.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpstreamVideo {
    title: Option<String>,
    #[serde(default)]
    thumbnails: Vec<UpstreamThumbnail>,
    length_seconds: Option<Value>,
    channel: Option<UpstreamChannel>,
    videos: Option<UpstreamItems>,
    audios: Option<UpstreamItems>,
}

#[derive(Debug, Deserialize)]
struct UpstreamThumbnail {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpstreamChannel {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct UpstreamItems {
    #[serde(default)]
    items: Vec<UpstreamItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpstreamItem {
    url: Option<String>,
    quality_label: Option<String>,
    quality: Option<String>,
    extension: Option<String>,
    mime_type: Option<String>,
}

impl UpstreamItem {
    fn into_candidate(self) -> Option<DownloadCandidate> {
        let url = self.url.filter(|url| !url.trim().is_empty())?;
        Some(DownloadCandidate {
            url,
            container: self.extension.or(self.mime_type),
            quality_label: self.quality_label.or(self.quality),
        })
    }
}

fn candidates(items: Option<UpstreamItems>) -> Vec<DownloadCandidate> {
    items
        .unwrap_or_default()
        .items
        .into_iter()
        .filter_map(UpstreamItem::into_candidate)
        .collect()
}

fn parse_seconds(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| number.as_f64().filter(|v| *v >= 0.0).map(|v| v as u64)),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

impl VideoInfo {
    /// Builds the typed view of an upstream payload. Missing fields fall back
    /// to display defaults instead of failing.
    pub fn from_payload(payload: &Value) -> Result<Self, serde_json::Error> {
        let upstream = UpstreamVideo::deserialize(payload)?;

        Ok(Self {
            title: upstream
                .title
                .filter(|title| !title.trim().is_empty())
                .unwrap_or_else(|| "Video Title".to_string()),
            thumbnail_url: upstream
                .thumbnails
                .into_iter()
                .next()
                .and_then(|thumbnail| thumbnail.url),
            duration_seconds: upstream.length_seconds.as_ref().and_then(parse_seconds),
            author: upstream
                .channel
                .and_then(|channel| channel.name)
                .unwrap_or_else(|| "Unknown".to_string()),
            videos: candidates(upstream.videos),
            audios: candidates(upstream.audios),
        })
    }

    /// `m:ss`, or `N/A` when the length is unknown.
    pub fn duration_label(&self) -> String {
        match self.duration_seconds {
            Some(seconds) => format!("{}:{:02}", seconds / 60, seconds % 60),
            None => "N/A".to_string(),
        }
    }

    /// Picks the download link for a container and quality.
    ///
    /// Video prefers the exact quality label, then 720p, then 480p, then the
    /// first entry. Audio always takes the first entry; the requested quality
    /// is not consulted.
    pub fn select(&self, kind: MediaKind, quality: &str) -> Option<&DownloadCandidate> {
        match kind {
            MediaKind::Video => select_video(&self.videos, quality),
            MediaKind::Audio => self.audios.first(),
        }
    }
}

fn select_video<'a>(items: &'a [DownloadCandidate], quality: &str) -> Option<&'a DownloadCandidate> {
    let by_label = move |label: &str| {
        items
            .iter()
            .find(|item| item.quality_label.as_deref() == Some(label))
    };

    by_label(quality)
        .or_else(|| FALLBACK_QUALITIES.iter().find_map(|label| by_label(*label)))
        .or_else(|| items.first())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(labels: &[&str]) -> Value {
        let items: Vec<Value> = labels
            .iter()
            .map(|label| {
                json!({
                    "url": format!("https://cdn.example.com/{label}.mp4"),
                    "qualityLabel": label,
                    "extension": "mp4"
                })
            })
            .collect();

        json!({
            "title": "Never Gonna Give You Up",
            "thumbnails": [{ "url": "https://i.ytimg.com/vi/x/hq.jpg" }],
            "lengthSeconds": 213,
            "channel": { "name": "Rick Astley" },
            "videos": { "items": items },
            "audios": { "items": [
                { "url": "https://cdn.example.com/a-128.m4a", "extension": "m4a" },
                { "url": "https://cdn.example.com/a-48.m4a", "extension": "m4a" }
            ] }
        })
    }

    fn selected_label(info: &VideoInfo, quality: &str) -> Option<String> {
        info.select(MediaKind::Video, quality)
            .and_then(|candidate| candidate.quality_label.clone())
    }

    #[test]
    fn exact_quality_wins() {
        let info = VideoInfo::from_payload(&payload(&["1080p", "720p", "360p"])).expect("parses");
        assert_eq!(selected_label(&info, "360p").as_deref(), Some("360p"));
    }

    #[test]
    fn missing_quality_falls_back_to_720p() {
        let info = VideoInfo::from_payload(&payload(&["720p", "480p", "360p"])).expect("parses");
        assert_eq!(selected_label(&info, "1080p").as_deref(), Some("720p"));
    }

    #[test]
    fn fallback_order_is_480p_then_first() {
        let info = VideoInfo::from_payload(&payload(&["360p", "480p"])).expect("parses");
        assert_eq!(selected_label(&info, "1080p").as_deref(), Some("480p"));

        let info = VideoInfo::from_payload(&payload(&["240p", "144p"])).expect("parses");
        assert_eq!(selected_label(&info, "1080p").as_deref(), Some("240p"));
    }

    #[test]
    fn audio_takes_first_entry_regardless_of_quality() {
        let info = VideoInfo::from_payload(&payload(&["720p"])).expect("parses");
        let audio = info.select(MediaKind::Audio, "48kbps").expect("audio present");
        assert_eq!(audio.url, "https://cdn.example.com/a-128.m4a");
    }

    #[test]
    fn empty_lists_select_nothing() {
        let info = VideoInfo::from_payload(&json!({})).expect("parses");
        assert_eq!(info.select(MediaKind::Video, "720p"), None);
        assert_eq!(info.select(MediaKind::Audio, "128kbps"), None);
    }

    #[test]
    fn display_fields_and_defaults() {
        let info = VideoInfo::from_payload(&payload(&["720p"])).expect("parses");
        assert_eq!(info.title, "Never Gonna Give You Up");
        assert_eq!(info.author, "Rick Astley");
        assert_eq!(info.duration_label(), "3:33");
        assert_eq!(info.thumbnail_url.as_deref(), Some("https://i.ytimg.com/vi/x/hq.jpg"));

        let info = VideoInfo::from_payload(&json!({ "lengthSeconds": "65", "title": " " }))
            .expect("parses");
        assert_eq!(info.title, "Video Title");
        assert_eq!(info.author, "Unknown");
        assert_eq!(info.duration_label(), "1:05");

        let info = VideoInfo::from_payload(&json!({})).expect("parses");
        assert_eq!(info.duration_label(), "N/A");
    }

    #[test]
    fn items_without_urls_are_skipped() {
        let info = VideoInfo::from_payload(&json!({
            "videos": { "items": [
                { "qualityLabel": "1080p" },
                { "url": "https://cdn.example.com/720.mp4", "qualityLabel": "720p" }
            ] }
        }))
        .expect("parses");
        assert_eq!(info.videos.len(), 1);
        assert_eq!(selected_label(&info, "1080p").as_deref(), Some("720p"));
    }

    #[test]
    fn media_kind_parses_cli_names() {
        assert_eq!("MP4".parse::<MediaKind>(), Ok(MediaKind::Video));
        assert_eq!("audio".parse::<MediaKind>(), Ok(MediaKind::Audio));
        assert!("flac".parse::<MediaKind>().is_err());
    }
}
