//! Classification of incoming text: image-generation triggers and URL
//! detection.

use regex::Regex;
use std::sync::OnceLock;

/// Phrases that mark a message as an image-generation request. Matched
/// case-insensitively anywhere in the message.
const IMAGE_TRIGGERS: &[&str] = &[
    "сгенерируй",
    "generate image",
    "generate",
    "нарисуй",
    "создай изображение",
    "создай фото",
    "создай картинку",
    "draw",
    "şəkil yarat",
    "şəkil çək",
];

fn url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https?://\S+").expect("url regex"))
}

/// True when the message contains one of the image triggers.
pub fn is_image_request(text: &str) -> bool {
    let lower = text.to_lowercase();
    IMAGE_TRIGGERS.iter().any(|t| lower.contains(t))
}

/// Strip a leading trigger phrase, leaving the image description. When
/// the trigger sits mid-sentence the whole message is the description.
pub fn image_prompt(text: &str) -> &str {
    let trimmed = text.trim_start();
    let lower = trimmed.to_lowercase();
    for t in IMAGE_TRIGGERS {
        if lower.starts_with(t) {
            // Lowercasing preserves byte length for these alphabets, but
            // guard the slice anyway.
            return trimmed.get(t.len()..).map(str::trim_start).unwrap_or("");
        }
    }
    trimmed
}

/// First http(s) URL in the message, if any.
pub fn extract_url(text: &str) -> Option<&str> {
    url_regex().find(text).map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_triggers_anywhere_in_the_text() {
        assert!(is_image_request("Generate a red cat"));
        assert!(is_image_request("  сгенерируй закат над морем"));
        assert!(is_image_request("DRAW a castle"));
        assert!(is_image_request("please generate a cat for me"));
        assert!(is_image_request("можешь нарисуй мне дом"));
        assert!(!is_image_request("what is the capital of France?"));
    }

    #[test]
    fn strips_trigger_from_prompt() {
        assert_eq!(image_prompt("generate a red cat"), "a red cat");
        assert_eq!(image_prompt("сгенерируй закат"), "закат");
        assert_eq!(
            image_prompt("please generate a cat"),
            "please generate a cat"
        );
        assert_eq!(image_prompt("no trigger here"), "no trigger here");
    }

    #[test]
    fn finds_first_url() {
        assert_eq!(
            extract_url("solve this: https://example.com/test?id=1 please"),
            Some("https://example.com/test?id=1")
        );
        assert_eq!(extract_url("no links"), None);
    }
}
