//! Topic routing-key pattern matching.
//!
//! AMQP topic semantics over dot-separated words: `*` matches exactly
//! one word, `#` matches zero or more words. Keys published by this
//! system are either `{file_id}.{event}` (notifications) or a fixed
//! single word (commands), but the matcher is general.

/// Does `pattern` match `key`?
pub fn topic_matches(pattern: &str, key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = key.split('.').collect();
    match_segments(&pattern, &key)
}

fn match_segments(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.first() {
        None => key.is_empty(),
        Some(&"#") => {
            if pattern.len() == 1 {
                return true;
            }
            (0..=key.len()).any(|skip| match_segments(&pattern[1..], &key[skip..]))
        }
        Some(&"*") => !key.is_empty() && match_segments(&pattern[1..], &key[1..]),
        Some(word) => key.first() == Some(word) && match_segments(&pattern[1..], &key[1..]),
    }
}
