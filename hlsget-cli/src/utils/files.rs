use std::path::PathBuf;

use crate::error::AppError;

/// Output file for a playlist URL when none was given.
///
/// Playlists are usually served as `<name>/index.m3u8`, so a bare `index`
/// falls back to the parent path segment.
pub fn default_output_path(url_str: &str) -> Result<PathBuf, AppError> {
    let url = url_str
        .parse::<reqwest::Url>()
        .map_err(|e| AppError::InvalidInput(format!("{url_str}: {e}")))?;

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();

    let name = match segments.as_slice() {
        [.., parent, last] if stem(last) == "index" => stem(parent),
        [.., last] => stem(last),
        [] => "output".to_string(),
    };

    Ok(PathBuf::from(format!("{name}.ts")))
}

fn stem(segment: &str) -> String {
    match segment.rfind('.') {
        Some(pos) if pos > 0 => segment[..pos].to_string(),
        _ => segment.to_string(),
    }
}
