//! Text cleanup before speech synthesis
//!
//! TTS engines read symbols aloud ("asterisk", "hash"), so everything but
//! letters, digits, spaces and basic punctuation is stripped from outbound
//! utterances.

use regex::Regex;
use std::sync::LazyLock;

static UNSPEAKABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9,.?!' ]+").expect("valid regex"));

/// Strip characters a TTS engine would pronounce
pub fn clean_for_speech(text: &str) -> String {
    let stripped = UNSPEAKABLE_RE.replace_all(text, "");
    stripped.replace("  ", " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_unchanged() {
        let text = "Nice to meet you, Alex! What's next?";
        assert_eq!(clean_for_speech(text), text);
    }

    #[test]
    fn test_markdown_and_emoji_removed() {
        assert_eq!(clean_for_speech("**Great** choice 🎉"), "Great choice");
    }

    #[test]
    fn test_newlines_and_colons_dropped() {
        assert_eq!(clean_for_speech("Advice:\nbe kind"), "Advicebe kind");
    }

    #[test]
    fn test_surrounding_space_trimmed() {
        assert_eq!(clean_for_speech("  # hello  "), "hello");
    }
}
