/// Collapse every run of whitespace (spaces, tabs, newlines) to a single
/// space and trim the ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate a string to at most `max_chars` characters.
/// Returns a borrowed slice ending on a char boundary.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_runs_and_newlines() {
        assert_eq!(collapse_whitespace("a  b\n\nc\t d"), "a b c d");
    }

    #[test]
    fn trims_ends() {
        assert_eq!(collapse_whitespace("  hello  "), "hello");
    }

    #[test]
    fn truncate_multibyte_safe() {
        let text = "héllo 世界";
        assert_eq!(truncate_chars(text, 7), "héllo 世");
        assert_eq!(truncate_chars(text, 100), text);
    }

    #[test]
    fn truncate_exact_length() {
        assert_eq!(truncate_chars("abc", 3), "abc");
    }
}
