//! Commit message prefix matching.
//!
//! A message matches when, lower-cased, it starts with the prefix stripped of
//! trailing `:` and spaces. Prefixes longer than [`FUZZY_MIN_CHARS`] also match
//! on their first two tokens, so long requirement descriptions tolerate
//! different trailing wording while `feat:`-style prefixes stay anchored.

/// Prefixes at or below this many characters only ever match exactly.
pub const FUZZY_MIN_CHARS: usize = 10;

const FULL_WIDTH_PUNCTUATION: &[char] = &[
    '：', '（', '）', '【', '】', '《', '》', '，', '。', '、', '；', '！', '？', '“', '”', '‘', '’',
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixMatcher {
    prefix: String,
    normalized: String,
    fallback_key: Option<String>,
}

impl PrefixMatcher {
    pub fn new(prefix: &str) -> Self {
        let normalized = normalize_prefix(prefix);
        let fallback_key = fallback_key(&normalized);
        Self {
            prefix: prefix.to_string(),
            normalized,
            fallback_key,
        }
    }

    /// The prefix as the caller wrote it.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn matches(&self, message: &str) -> bool {
        let message = message.trim().to_lowercase();
        if message.starts_with(&self.normalized) {
            return true;
        }
        self.fallback_key
            .as_deref()
            .is_some_and(|key| message.starts_with(key))
    }
}

pub fn matches(message: &str, prefix: &str) -> bool {
    PrefixMatcher::new(prefix).matches(message)
}

fn normalize_prefix(prefix: &str) -> String {
    prefix.trim_end_matches([':', ' ']).to_lowercase()
}

fn fallback_key(normalized: &str) -> Option<String> {
    if normalized.chars().count() <= FUZZY_MIN_CHARS {
        return None;
    }

    let tokens = normalized.split_whitespace().take(2).collect::<Vec<_>>();
    match tokens.as_slice() {
        [first, second] => Some(format!("{first} {second}")),
        [single] => punctuation_key(single),
        _ => None,
    }
}

/// For a prefix without spaces, the text up to the end of its second
/// full-width-punctuation separated segment.
fn punctuation_key(token: &str) -> Option<String> {
    let mut segments = 0;
    let mut in_segment = false;
    for (idx, ch) in token.char_indices() {
        if FULL_WIDTH_PUNCTUATION.contains(&ch) {
            if in_segment {
                segments += 1;
                in_segment = false;
                if segments == 2 {
                    return Some(token[..idx].to_string());
                }
            }
        } else {
            in_segment = true;
        }
    }
    None
}
