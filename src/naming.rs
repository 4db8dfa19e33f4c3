//! Filename and size formatting helpers shared by the relay and the client.

const MAX_FILENAME_CHARS: usize = 200;
const SIZE_UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];

/// Drops characters that are invalid in filenames on common platforms,
/// collapses whitespace and caps the length.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|character| !matches!(character, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .collect();

    cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(MAX_FILENAME_CHARS)
        .collect()
}

pub fn generate_filename(title: &str, extension: &str) -> String {
    let stem = sanitize_filename(title);
    let stem = if stem.is_empty() { "download" } else { stem.as_str() };
    format!("{stem}.{}", extension.to_ascii_lowercase())
}

pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut exponent = 0;
    while exponent + 1 < SIZE_UNITS.len() && bytes >= 1u64 << (10 * (exponent + 1)) {
        exponent += 1;
    }
    let scaled = bytes as f64 / 1024f64.powi(exponent as i32);
    let rounded = format!("{scaled:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');

    format!("{trimmed} {}", SIZE_UNITS[exponent])
}

/// Header-safe variant of [`sanitize_filename`]. Anything outside ASCII
/// alphanumerics and `.-_ ()` becomes `_`.
pub fn sanitize_ascii_filename(value: &str) -> String {
    let ascii: String = sanitize_filename(value)
        .chars()
        .map(|character| {
            if character.is_ascii_alphanumeric()
                || matches!(character, '.' | '-' | '_' | ' ' | '(' | ')')
            {
                character
            } else {
                '_'
            }
        })
        .collect();

    if ascii.is_empty() {
        "download.bin".to_string()
    } else {
        ascii
    }
}

/// `attachment` disposition with an ASCII fallback name and the full UTF-8
/// name in `filename*`.
pub fn build_content_disposition(filename: &str) -> String {
    let display_name = sanitize_filename(filename);
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        sanitize_ascii_filename(&display_name),
        urlencoding::encode(&display_name)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_reserved_characters() {
        assert_eq!(
            sanitize_filename("  AC/DC: Back in Black?  <Live>  "),
            "ACDC Back in Black Live"
        );
        assert_eq!(sanitize_filename(&"x".repeat(250)).len(), 200);
    }

    #[test]
    fn generated_names_use_lowercase_extension() {
        assert_eq!(generate_filename("My Clip", "MP4"), "My Clip.mp4");
        assert_eq!(generate_filename("???", "mp3"), "download.mp3");
    }

    #[test]
    fn sizes_are_human_readable() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(512), "512 Bytes");
        assert_eq!(format_file_size(1024), "1 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5 MB");
        assert_eq!(format_file_size(1_288_490_189), "1.2 GB");
    }

    #[test]
    fn content_disposition_keeps_unicode_in_extended_field() {
        let header = build_content_disposition("Café video.mp4");
        assert!(header.starts_with("attachment; filename=\"Caf_ video.mp4\""));
        assert!(header.ends_with("filename*=UTF-8''Caf%C3%A9%20video.mp4"));
    }

    #[test]
    fn header_names_never_carry_path_separators() {
        assert_eq!(sanitize_ascii_filename("../etc/passwd"), "..etcpasswd");
        assert_eq!(sanitize_ascii_filename("???"), "download.bin");
        assert!(!build_content_disposition("a/b\\c.mp4").contains('/'));
    }
}
