//! crates/arunika_core/src/media.rs
//!
//! YouTube helpers for video modules.

use regex::Regex;
use std::sync::OnceLock;

fn youtube_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^.*(youtu\.be/|v/|u/\w/|embed/|shorts/|watch\?v=|&v=)([^#&?]*).*")
            .expect("static regex is valid")
    })
}

/// Extracts the 11-character video id from the usual YouTube URL shapes.
pub fn youtube_video_id(url: &str) -> Option<String> {
    let captures = youtube_pattern().captures(url.trim())?;
    let id = captures.get(2)?.as_str();
    (id.len() == 11).then(|| id.to_string())
}

pub fn youtube_embed_url(url: &str) -> Option<String> {
    youtube_video_id(url).map(|id| format!("https://www.youtube.com/embed/{id}"))
}
