//! Clipboard normalization.
//!
//! A multi-line clipboard payload must never be split into multiple
//! auto-submitted commands, so every line-break sequence is folded into a
//! single space before insertion.

/// Collapse `\r\n`, `\r`, and `\n` to single spaces and trim the ends.
/// Returns an empty string for whitespace-only input; the caller then
/// performs no insertion.
pub fn sanitize(raw: &str) -> String {
    raw.replace("\r\n", " ")
        .replace(['\r', '\n'], " ")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newlines_become_spaces() {
        assert_eq!(sanitize("echo a\necho b\n"), "echo a echo b");
    }

    #[test]
    fn test_crlf_counts_as_one_break() {
        assert_eq!(sanitize("echo a\r\necho b"), "echo a echo b");
        assert_eq!(sanitize("echo a\recho b"), "echo a echo b");
    }

    #[test]
    fn test_whitespace_only_yields_empty() {
        assert_eq!(sanitize("\r\n\n  \r"), "");
        assert_eq!(sanitize(""), "");
    }

    #[test]
    fn test_plain_text_only_trimmed() {
        assert_eq!(sanitize("  ls -la  "), "ls -la");
    }
}
