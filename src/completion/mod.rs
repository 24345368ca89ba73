//! Tab completion.
//!
//! Candidates come from two pools: dialect builtin command names (first token
//! only) and entries of the session's working directory. Every candidate is a
//! whole-buffer replacement string, so the caller can apply a single match or
//! a longest-common-prefix extension with one `replace_all`.

use crate::session::Dialect;
use std::path::Path;
use unicode_width::UnicodeWidthStr;

/// Listing width used when the display width is unknown.
pub const DEFAULT_LISTING_WIDTH: usize = 80;

/// Outcome of a tab-completion request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Completion {
    /// Nothing matched; the buffer is left alone.
    None,
    /// Exactly one match; replace the buffer wholesale with this string.
    Single(String),
    /// Several matches.
    Multiple {
        /// Whole-buffer candidate strings, sorted.
        candidates: Vec<String>,
        /// Column-formatted listing of the matched names, to be written
        /// below the current line.
        listing: String,
        /// Longest common prefix, present only when strictly longer than
        /// the current buffer.
        replacement: Option<String>,
    },
}

/// Resolve completions for `buffer` against `cwd` under the given dialect.
/// `width` is the display width in columns for the listing layout.
pub fn resolve(buffer: &str, cwd: &str, dialect: Dialect, width: usize) -> Completion {
    // Complete the token after the last unescaped space; everything before
    // it is kept. POSIX dialects escape spaces with a backslash.
    let escaped = dialect.backslash_escapes();
    let start = token_start(buffer, escaped);
    let head = &buffer[..start];
    let token = if escaped {
        buffer[start..].replace("\\ ", " ")
    } else {
        buffer[start..].to_string()
    };
    let first_token = head.trim().is_empty();

    let mut names: Vec<String> = Vec::new();
    if first_token {
        names.extend(
            dialect
                .builtins()
                .iter()
                .filter(|cmd| matches_prefix(cmd, &token, dialect))
                .map(|cmd| cmd.to_string()),
        );
    }
    names.extend(directory_matches(cwd, &token, dialect));
    names.sort();
    names.dedup();

    match names.len() {
        0 => Completion::None,
        1 => Completion::Single(format!("{head}{}", escape_name(&names[0], escaped))),
        _ => {
            let candidates: Vec<String> = names
                .iter()
                .map(|n| format!("{head}{}", escape_name(n, escaped)))
                .collect();
            let prefix = common_prefix(&candidates);
            let replacement = (prefix.chars().count() > buffer.chars().count())
                .then_some(prefix);
            let listing = format_columns(&names, width.max(1));
            Completion::Multiple {
                candidates,
                listing,
                replacement,
            }
        }
    }
}

/// Byte offset of the token under completion: just past the last space, or
/// the last space not preceded by a backslash when the dialect escapes.
fn token_start(buffer: &str, escaped: bool) -> usize {
    if !escaped {
        return buffer.rfind(' ').map(|i| i + 1).unwrap_or(0);
    }
    let bytes = buffer.as_bytes();
    for pos in (0..bytes.len()).rev() {
        if bytes[pos] == b' ' && (pos == 0 || bytes[pos - 1] != b'\\') {
            return pos + 1;
        }
    }
    0
}

/// Re-escape spaces in a matched name so the replacement buffer stays a
/// single token.
fn escape_name(name: &str, escaped: bool) -> String {
    if escaped {
        name.replace(' ', "\\ ")
    } else {
        name.to_string()
    }
}

fn matches_prefix(name: &str, token: &str, dialect: Dialect) -> bool {
    if dialect.case_insensitive_completion() {
        name.to_lowercase().starts_with(&token.to_lowercase())
    } else {
        name.starts_with(token)
    }
}

/// Entries of `cwd` whose names start with `token`. Directories get a
/// trailing dialect path separator.
fn directory_matches(cwd: &str, token: &str, dialect: Dialect) -> Vec<String> {
    let dir = Path::new(cwd);
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::debug!("completion: cannot read {cwd}: {e}");
            return Vec::new();
        }
    };

    let mut names = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if !matches_prefix(&name, token, dialect) {
            continue;
        }
        let is_dir = entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false);
        if is_dir {
            names.push(format!("{name}{}", dialect.path_separator()));
        } else {
            names.push(name);
        }
    }
    names
}

/// Char-wise longest common prefix across all candidates.
fn common_prefix(candidates: &[String]) -> String {
    let Some(first) = candidates.first() else {
        return String::new();
    };
    let mut prefix_len = first.chars().count();
    for candidate in &candidates[1..] {
        let common = first
            .chars()
            .zip(candidate.chars())
            .take_while(|(a, b)| a == b)
            .count();
        prefix_len = prefix_len.min(common);
    }
    first.chars().take(prefix_len).collect()
}

/// Lay the names out in columns sized to the widest name plus a two-cell
/// gutter, filling rows left to right. Lines are `\r\n`-terminated except
/// the last.
pub fn format_columns(names: &[String], width: usize) -> String {
    if names.is_empty() {
        return String::new();
    }
    let cell = names.iter().map(|n| n.width()).max().unwrap_or(0) + 2;
    let per_row = (width / cell).max(1);

    let mut lines = Vec::new();
    for row in names.chunks(per_row) {
        let mut line = String::new();
        for (i, name) in row.iter().enumerate() {
            line.push_str(name);
            if i + 1 < row.len() {
                for _ in 0..cell - name.width() {
                    line.push(' ');
                }
            }
        }
        lines.push(line);
    }
    lines.join("\r\n")
}
