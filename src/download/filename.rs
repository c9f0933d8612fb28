//! Filename derivation, sanitization, and collision-safe path reservation.

use std::fs::OpenOptions;
use std::io;
use std::path::{Component, Path, PathBuf};

use url::Url;

use crate::provider::Provider;

/// Extension used when the media URL carries none we recognise.
pub const DEFAULT_MEDIA_EXTENSION: &str = ".mp4";

const MEDIA_EXTENSIONS: &[&str] = &[".mp4", ".mov", ".webm", ".m4v", ".3gp", ".jpg", ".jpeg", ".png", ".webp"];

const MAX_TITLE_CHARS: usize = 60;
const MAX_SUFFIX: usize = 1000;

/// Builds the filename for a resolved media item.
///
/// Uses a sanitized `title` when one survives sanitization, otherwise the
/// generated `{provider}_{timestamp}` pattern. The extension comes from the
/// media URL when it is a known media type and defaults to `.mp4`.
#[must_use]
pub fn media_file_name(provider: Provider, title: Option<&str>, media_url: &Url) -> String {
    let extension = media_extension(media_url);
    let title = title.map(sanitize_filename_component).and_then(|cleaned| {
        let cleaned = strip_media_extension(&cleaned);
        if cleaned.is_empty() {
            return None;
        }
        Some(cleaned.chars().take(MAX_TITLE_CHARS).collect::<String>())
    });

    match title {
        Some(title) => format!("{title}{extension}"),
        None => generated_file_name(provider, &extension),
    }
}

/// `{provider}_{unix_millis}{extension}`.
#[must_use]
pub fn generated_file_name(provider: Provider, extension: &str) -> String {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    format!("{}_{timestamp}{extension}", provider.slug())
}

/// Drops a trailing media extension so `Dance.mp4` does not become `Dance.mp4.mp4`.
fn strip_media_extension(stem: &str) -> &str {
    for ext in MEDIA_EXTENSIONS {
        let Some(cut) = stem.len().checked_sub(ext.len()) else {
            continue;
        };
        if stem.is_char_boundary(cut) && stem[cut..].eq_ignore_ascii_case(ext) {
            return stem[..cut].trim_end_matches(['_', '.']);
        }
    }
    stem
}

fn media_extension(url: &Url) -> String {
    extension_from_url(url)
        .filter(|ext| MEDIA_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or_else(|| DEFAULT_MEDIA_EXTENSION.to_string())
}

pub(crate) fn extension_from_url(url: &Url) -> Option<String> {
    let last_segment = url.path_segments()?.next_back()?;
    let decoded = urlencoding::decode(last_segment).ok()?;
    let dot_index = decoded.rfind('.')?;
    let ext = &decoded[dot_index..];
    if ext.len() <= 1 || ext.len() > 12 {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Collapses a free-text title (captions, hashtags) into a filename stem.
///
/// Combining marks are kept so Indic scripts stay readable.
pub(crate) fn sanitize_filename_component(value: &str) -> String {
    let mut out = String::new();
    let mut prev_sep = false;
    for ch in value.chars() {
        let mapped = match ch {
            c if c.is_alphanumeric() || is_combining_mark(c) || matches!(c, '-' | '.') => c,
            _ => '_',
        };
        if mapped == '_' {
            if !prev_sep {
                out.push('_');
                prev_sep = true;
            }
        } else {
            out.push(mapped);
            prev_sep = false;
        }
    }
    out.trim_matches(|c| c == '_' || c == '.').to_string()
}

/// Combining marks (vowel signs, viramas, nuktas) used by the scripts our
/// providers' captions are written in, plus the generic combining blocks.
fn is_combining_mark(c: char) -> bool {
    matches!(c,
        '\u{0300}'..='\u{036F}'
        | '\u{0900}'..='\u{0903}'
        | '\u{093A}'..='\u{094F}'
        | '\u{0951}'..='\u{0957}'
        | '\u{0962}'..='\u{0963}'
        | '\u{0981}'..='\u{0983}'
        | '\u{09BC}'..='\u{09D7}'
        | '\u{09E2}'..='\u{09E3}'
        | '\u{0A01}'..='\u{0A03}'
        | '\u{0A3C}'..='\u{0A51}'
        | '\u{0A70}'..='\u{0A71}'
        | '\u{0A75}'
        | '\u{0A81}'..='\u{0A83}'
        | '\u{0ABC}'..='\u{0ACD}'
        | '\u{0AE2}'..='\u{0AE3}'
        | '\u{0B01}'..='\u{0B03}'
        | '\u{0B3C}'..='\u{0B57}'
        | '\u{0B62}'..='\u{0B63}'
        | '\u{0B82}'
        | '\u{0BBE}'..='\u{0BD7}'
        | '\u{0C00}'..='\u{0C04}'
        | '\u{0C3C}'..='\u{0C56}'
        | '\u{0C62}'..='\u{0C63}'
        | '\u{0C81}'..='\u{0C83}'
        | '\u{0CBC}'..='\u{0CD6}'
        | '\u{0CE2}'..='\u{0CE3}'
        | '\u{0D00}'..='\u{0D03}'
        | '\u{0D3B}'..='\u{0D57}'
        | '\u{0D62}'..='\u{0D63}'
        | '\u{1AB0}'..='\u{1AFF}'
        | '\u{1DC0}'..='\u{1DFF}'
        | '\u{200C}'..='\u{200D}'
        | '\u{20D0}'..='\u{20FF}'
        | '\u{FE20}'..='\u{FE2F}'
    ) && !c.is_alphanumeric()
}

/// Sanitizes filename for filesystem safety.
///
/// Replaces characters that are invalid on common filesystems:
/// / \ : * ? " < > |
pub(crate) fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }

    if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized
            .chars()
            .map(|c| if c == '.' { '_' } else { c })
            .collect()
    }
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}

/// Claims a unique path in `dir`, adding a numeric suffix if the name is taken.
///
/// The winning path is created empty with `create_new`, so two concurrent
/// downloads of the same name can never claim the same file.
/// Example: `clip.mp4`, then `clip_1.mp4`, `clip_2.mp4`, ...
///
/// # Errors
///
/// Returns the underlying I/O error if a candidate cannot be created for a
/// reason other than already existing, or if every suffix is taken.
pub(crate) fn reserve_unique_path(dir: &Path, filename: &str) -> io::Result<PathBuf> {
    let filename = {
        let sanitized = sanitize_filename(filename);
        if sanitized.contains('/')
            || sanitized.contains('\\')
            || sanitized.trim_matches('_').is_empty()
        {
            format!("download{DEFAULT_MEDIA_EXTENSION}")
        } else {
            sanitized
        }
    };

    let (stem, ext) = match filename.rfind('.') {
        Some(pos) if pos > 0 => (&filename[..pos], &filename[pos..]),
        _ => (filename.as_str(), ""),
    };

    let candidates = std::iter::once(filename.clone())
        .chain((1..MAX_SUFFIX).map(|i| format!("{stem}_{i}{ext}")));

    for candidate in candidates {
        let path = dir.join(candidate);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => return Ok(path),
            Err(error) if error.kind() == io::ErrorKind::AlreadyExists => {}
            Err(error) => return Err(error),
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free name for '{filename}' in {}", dir.display()),
    ))
}
