//! Prohibited-word redaction for message bodies and display names.
//!
//! Matching is case-insensitive and works on characters, so a redacted
//! string always has exactly as many characters as its input. Every matched
//! character is replaced by [`MASK_CHAR`]; words containing the mask
//! character are never loaded, which keeps the filter idempotent.

use crate::constants::MASK_CHAR;

/// Words redacted when no deployment list is configured.
pub const DEFAULT_BANNED_WORDS: &[&str] = &[
    "fuck", "shit", "bitch", "asshole", "bastard", "idiot", "stupid", "loser", "retard",
];

#[derive(Debug, Clone)]
pub struct ContentFilter {
    // Each word folded to lowercase, one char per entry.
    words: Vec<Vec<char>>,
    mask: char,
}

impl ContentFilter {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut folded: Vec<Vec<char>> = words
            .into_iter()
            .map(|w| w.as_ref().trim().chars().map(fold).collect::<Vec<char>>())
            .filter(|w| !w.is_empty() && !w.contains(&MASK_CHAR))
            .collect();
        folded.sort();
        folded.dedup();

        Self {
            words: folded,
            mask: MASK_CHAR,
        }
    }

    /// Parse a word list separated by newlines and/or commas. Lines
    /// starting with `#` are comments.
    pub fn from_word_list(list: &str) -> Self {
        let words = list
            .lines()
            .map(str::trim)
            .filter(|line| !line.starts_with('#'))
            .flat_map(|line| line.split(','))
            .map(str::to_string)
            .collect::<Vec<_>>();
        Self::new(words)
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// Redact every case-insensitive occurrence of every banned word.
    pub fn apply(&self, text: &str) -> String {
        let chars: Vec<char> = text.chars().collect();
        let folded: Vec<char> = chars.iter().copied().map(fold).collect();
        let mut masked = vec![false; chars.len()];
        let mut any = false;

        for word in &self.words {
            if word.len() > folded.len() {
                continue;
            }
            for start in 0..=folded.len() - word.len() {
                if folded[start..start + word.len()] == word[..] {
                    masked[start..start + word.len()].fill(true);
                    any = true;
                }
            }
        }

        if !any {
            return text.to_string();
        }

        chars
            .iter()
            .zip(masked)
            .map(|(&c, hit)| if hit { self.mask } else { c })
            .collect()
    }

    /// Whether `text` contains any banned word.
    pub fn is_clean(&self, text: &str) -> bool {
        self.apply(text) == text
    }
}

impl Default for ContentFilter {
    fn default() -> Self {
        Self::new(DEFAULT_BANNED_WORDS)
    }
}

/// Redact `text` against an ad-hoc word list.
pub fn filter<S: AsRef<str>>(text: &str, banned_words: &[S]) -> String {
    ContentFilter::new(banned_words).apply(text)
}

// Single-char lowercase mapping; chars whose lowercase form expands to
// several chars compare as themselves.
fn fold(c: char) -> char {
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(l), None) => l,
        _ => c,
    }
}
