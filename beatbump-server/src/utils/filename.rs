//! Filesystem-safe name sanitization.
//!
//! Unlike a generic filename sanitizer that substitutes invalid characters
//! with an underscore, this one strips them outright — matching the
//! behavior this domain's filenames are expected to have (`<artist> - <title>`
//! with no separator characters introduced by sanitization).

const INVALID_CHARS: &str = "<>:\"/\\|?*";

/// Remove every character in `<>:"/\|?*` from `name`.
pub fn sanitize_filename(name: &str) -> String {
    name.chars().filter(|c| !INVALID_CHARS.contains(*c)).collect()
}

/// Build the `"<artist> - <title>"` stem used for a track's output file,
/// sanitized and with surrounding whitespace trimmed.
pub fn track_stem(artist: &str, title: &str) -> String {
    sanitize_filename(&format!("{artist} - {title}")).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_all_invalid_characters() {
        let input = "<Foo>: \"Bar\"/\\|?*Baz";
        let sanitized = sanitize_filename(input);
        for c in INVALID_CHARS.chars() {
            assert!(!sanitized.contains(c), "{sanitized} still contains {c}");
        }
    }

    #[test]
    fn leaves_unicode_untouched() {
        assert_eq!(sanitize_filename("初音ミク"), "初音ミク");
    }

    #[test]
    fn track_stem_joins_artist_and_title() {
        assert_eq!(track_stem("Artist", "Title"), "Artist - Title");
    }

    #[test]
    fn track_stem_strips_invalid_chars_from_either_side() {
        assert_eq!(track_stem("A/C", "D:E"), "AC - DE");
    }
}
