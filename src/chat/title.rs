//! Thread titles derived from the first user message

/// Title from the leading `max_words` words of `text`
///
/// `?` and `.` are dropped and each word is capitalised. Returns `None`
/// when nothing title-worthy is left.
pub fn derive_title(text: &str, max_words: usize) -> Option<String> {
    let cleaned: String = text.chars().filter(|c| !matches!(c, '?' | '.')).collect();
    let words: Vec<String> = cleaned
        .split_whitespace()
        .take(max_words)
        .map(capitalize)
        .collect();
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

/// Placeholder title for a thread with no messages yet
pub fn fallback_title(thread_id: &str) -> String {
    let prefix: String = thread_id.chars().take(6).collect();
    format!("Chat {}", prefix)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
