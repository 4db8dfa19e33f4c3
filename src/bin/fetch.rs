use std::process::ExitCode;

use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use tubegrab::{
    client::{ClientError, RelayClient},
    download::DownloadOutcome,
    naming::{format_file_size, generate_filename},
    normalize::{self, VideoReference},
    video::MediaKind,
};

const USAGE: &str = "usage: tubegrab-fetch <youtube-url> [mp4|mp3] [quality]";

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "tubegrab=warn".to_string()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(url) = args.next() else {
        eprintln!("{USAGE}");
        return ExitCode::from(2);
    };
    let kind = match args.next().map(|value| value.parse::<MediaKind>()) {
        None => MediaKind::Video,
        Some(Ok(kind)) => kind,
        Some(Err(message)) => {
            eprintln!("{message}\n{USAGE}");
            return ExitCode::from(2);
        }
    };
    let quality = args
        .next()
        .unwrap_or_else(|| kind.default_quality().to_string());

    let reference = VideoReference::parse(&url);
    if !normalize::is_valid_youtube_url(&url) && !reference.is_playlist_only() {
        eprintln!("Invalid YouTube link. Please check the URL.");
        return ExitCode::from(2);
    }

    let client = match RelayClient::from_env() {
        Ok(client) => client,
        Err(error) => {
            eprintln!("{error}");
            return ExitCode::FAILURE;
        }
    };

    let result = match (&reference.video_id, &reference.playlist_id) {
        (Some(video_id), _) => fetch_video(&client, video_id, kind, &quality).await,
        (None, Some(playlist_id)) => show_playlist(&client, playlist_id).await,
        (None, None) => {
            eprintln!("Could not extract the video ID. Please check the YouTube URL.");
            return ExitCode::from(2);
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("Error: {error}");
            ExitCode::FAILURE
        }
    }
}

async fn fetch_video(
    client: &RelayClient,
    video_id: &str,
    kind: MediaKind,
    quality: &str,
) -> Result<(), ClientError> {
    let resolved = client.lookup_video(video_id).await?;
    let info = &resolved.info;

    println!("{}", info.title);
    println!("  by {} · {}", info.author, info.duration_label());

    let Some(candidate) = info.select(kind, quality) else {
        println!("No download link available for {}.", kind.extension());
        return Ok(());
    };
    if let Some(label) = &candidate.quality_label {
        println!("  quality {label}");
    }

    let filename = generate_filename(&info.title, kind.extension());
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-"),
    );

    let outcome = client
        .download_file(&candidate.url, &filename, |progress| {
            if progress.total > 0 {
                bar.set_length(progress.total);
            }
            bar.set_position(progress.loaded);
        })
        .await?;
    bar.finish_and_clear();

    match outcome {
        DownloadOutcome::Saved { path, bytes } => {
            println!("Saved {} ({})", path.display(), format_file_size(bytes));
        }
        DownloadOutcome::OpenedExternally { url } => {
            println!("Relay unreachable; opened the media URL in the browser instead: {url}");
        }
    }

    Ok(())
}

async fn show_playlist(client: &RelayClient, playlist_id: &str) -> Result<(), ClientError> {
    let data = client.lookup_playlist(playlist_id).await?;
    let title = data
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or("Untitled playlist");
    let items = data
        .pointer("/videos/items")
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or_default();

    println!("{title}");
    println!("  {items} video(s)");
    if let Some(videos) = data.pointer("/videos/items").and_then(Value::as_array) {
        for video in videos {
            let id = video.get("id").and_then(Value::as_str).unwrap_or("?");
            let name = video.get("title").and_then(Value::as_str).unwrap_or("");
            println!("  {id}  {name}");
        }
    }

    Ok(())
}
