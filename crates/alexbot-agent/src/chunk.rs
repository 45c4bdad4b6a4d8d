//! Reply segmentation for channels with a per-message length cap.

pub use alexbot_core::config::DISCORD_MESSAGE_LIMIT;

/// Split `text` into consecutive segments of at most `max_chars` characters.
///
/// Counts Unicode scalar values, so multi-byte text is never cut inside a
/// character. Empty input yields no segments.
pub fn split_segments(text: &str, max_chars: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    if max_chars == 0 {
        return vec![text.to_string()];
    }

    let mut segments = Vec::with_capacity(text.len() / max_chars + 1);
    let mut start = 0;
    let mut count = 0;
    for (idx, _) in text.char_indices() {
        if count == max_chars {
            segments.push(text[start..idx].to_string());
            start = idx;
            count = 0;
        }
        count += 1;
    }
    segments.push(text[start..].to_string());
    segments
}
