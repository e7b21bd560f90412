//! Splits a narration script into a fixed number of spoken chunks.

pub const SEGMENT_COUNT: usize = 3;
pub const PLACEHOLDER: &str = "...";

/// A chunk is closed once its accumulated text grows past this many chars.
const CHUNK_CLOSE_CHARS: usize = 50;

/// Sentences end where `.`, `!` or `?` is immediately followed by whitespace.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        current.push(ch);
        let boundary = matches!(ch, '.' | '!' | '?')
            && chars.peek().is_some_and(|next| next.is_whitespace());
        if boundary {
            while chars.peek().is_some_and(|next| next.is_whitespace()) {
                chars.next();
            }
            push_sentence(&mut out, &current);
            current.clear();
        }
    }
    push_sentence(&mut out, &current);
    out
}

fn push_sentence(out: &mut Vec<String>, raw: &str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

/// Greedy sentence accumulation into exactly `target_count` chunks.
///
/// Once `target_count - 1` chunks are closed every remaining sentence goes
/// into the last one. Short input is padded with [`PLACEHOLDER`].
pub fn segment(text: &str, target_count: usize) -> Vec<String> {
    let mut chunks: Vec<String> = Vec::with_capacity(target_count);
    let mut current = String::new();

    for sentence in split_sentences(text) {
        current.push_str(&sentence);
        current.push(' ');
        if current.chars().count() > CHUNK_CLOSE_CHARS && chunks.len() + 1 < target_count {
            chunks.push(current.trim().to_string());
            current.clear();
        }
    }

    let tail = current.trim();
    if !tail.is_empty() {
        chunks.push(tail.to_string());
    }

    while chunks.len() < target_count {
        chunks.push(PLACEHOLDER.to_string());
    }
    chunks.truncate(target_count);
    chunks
}
