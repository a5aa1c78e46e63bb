//! Output chunker: long generated answers split into transport-sized parts.
//!
//! Splits prefer the last newline at or before the limit so lines stay whole;
//! a single unbroken span longer than the limit gets a hard cut at exactly
//! the limit. Lengths are measured in characters, not bytes.

/// Split `text` into parts of at most `max_len` characters.
pub fn split_text(text: &str, max_len: usize) -> Vec<String> {
    assert!(max_len > 0, "max_len must be positive");

    let mut parts = Vec::new();
    let mut rest = text.trim();

    while rest.chars().count() > max_len {
        // Byte offset of the character just past the limit.
        let cut_bytes = rest
            .char_indices()
            .nth(max_len)
            .map(|(b, _)| b)
            .unwrap_or(rest.len());

        let split_at = match rest[..cut_bytes].rfind('\n') {
            Some(nl) => nl,
            None => cut_bytes, // unbroken span: hard cut at the limit
        };

        let part = rest[..split_at].trim();
        if !part.is_empty() {
            parts.push(part.to_string());
        }
        rest = rest[split_at..].trim_start();
    }

    let tail = rest.trim();
    if !tail.is_empty() {
        parts.push(tail.to_string());
    }

    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_no_parts() {
        assert!(split_text("", 100).is_empty());
        assert!(split_text("  \n ", 100).is_empty());
    }

    #[test]
    fn short_input_is_one_part() {
        assert_eq!(split_text("hello", 100), vec!["hello"]);
    }

    #[test]
    fn splits_on_last_newline_before_limit() {
        let text = "first line\nsecond line\nthird line";
        let parts = split_text(text, 25);
        assert_eq!(parts, vec!["first line\nsecond line", "third line"]);
    }

    #[test]
    fn hard_cuts_unbroken_spans_at_exactly_the_limit() {
        let text = "a".repeat(25);
        let parts = split_text(&text, 10);
        assert_eq!(parts, vec!["a".repeat(10), "a".repeat(10), "a".repeat(5)]);
    }

    #[test]
    fn every_part_respects_the_limit() {
        let mut text = String::new();
        for i in 0..50 {
            text.push_str(&format!("line number {i} with some padding\n"));
        }
        for part in split_text(&text, 120) {
            assert!(part.chars().count() <= 120, "part too long: {part:?}");
        }
    }

    #[test]
    fn round_trips_content_modulo_split_whitespace() {
        let text = "alpha beta\ngamma delta\nepsilon zeta\neta theta";
        let parts = split_text(text, 20);

        let rejoined = parts.join("\n");
        let norm = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ");
        assert_eq!(norm(&rejoined), norm(text));
    }

    #[test]
    fn counts_characters_not_bytes() {
        // Multibyte characters: 12 chars, 24 bytes.
        let text = "абвгдежзиклм";
        let parts = split_text(text, 6);
        assert_eq!(parts.len(), 2);
        assert!(parts.iter().all(|p| p.chars().count() <= 6));
        assert_eq!(parts.concat(), text);
    }
}
