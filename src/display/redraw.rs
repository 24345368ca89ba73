//! Minimal-diff redraw of the command line.
//!
//! Given a buffer transition, emit the fewest display writes that bring the
//! grid back in sync: a bare echo for appends, echo-plus-tail for mid-line
//! edits, and a full line rewrite only when the text changed wholesale
//! (history navigation, completion, post-submission reset).

use super::DisplayOp;
use crate::editor::Transition;

/// Clear the line and rewrite prompt plus buffer, leaving the grid cursor at
/// `prompt + cursor`.
pub fn full_line(prompt: &str, text: &str, cursor: usize) -> Vec<DisplayOp> {
    let mut ops = vec![
        DisplayOp::ClearLine,
        DisplayOp::Write(format!("{prompt}{text}")),
    ];
    let tail = text.chars().count().saturating_sub(cursor);
    if tail > 0 {
        ops.push(DisplayOp::CursorLeft(tail));
    }
    ops
}

/// Compute the display ops for one buffer transition. Falls back to
/// [`full_line`] when the edit is not a simple insert/delete/move.
pub fn diff(prompt: &str, transition: &Transition) -> Vec<DisplayOp> {
    let before = &transition.before;
    let after = &transition.after;
    let b: Vec<char> = before.text.chars().collect();
    let a: Vec<char> = after.text.chars().collect();

    if b == a {
        return match after.cursor.cmp(&before.cursor) {
            std::cmp::Ordering::Equal => Vec::new(),
            std::cmp::Ordering::Less => {
                vec![DisplayOp::CursorLeft(before.cursor - after.cursor)]
            }
            std::cmp::Ordering::Greater => {
                vec![DisplayOp::CursorRight(after.cursor - before.cursor)]
            }
        };
    }

    // Insertion of one or more chars at the old cursor, cursor advanced past
    // the inserted run, tail untouched.
    if a.len() > b.len()
        && after.cursor == before.cursor + (a.len() - b.len())
        && before.cursor <= b.len()
        && a[..before.cursor] == b[..before.cursor]
        && a[after.cursor..] == b[before.cursor..]
    {
        let inserted: String = a[before.cursor..after.cursor].iter().collect();
        let tail: String = a[after.cursor..].iter().collect();
        if tail.is_empty() {
            return vec![DisplayOp::Write(inserted)];
        }
        let tail_len = tail.chars().count();
        return vec![
            DisplayOp::Write(format!("{inserted}{tail}")),
            DisplayOp::CursorLeft(tail_len),
        ];
    }

    // Single-char deletion; the trailing space erases the now-stale final cell.
    if b.len() == a.len() + 1 {
        let removed_at = after.cursor;
        let matches = removed_at <= a.len()
            && a[..removed_at] == b[..removed_at]
            && a[removed_at..] == b[removed_at + 1..];

        if matches {
            let tail: String = a[removed_at..].iter().collect();
            let tail_len = tail.chars().count();

            // Backspace stepped the cursor back one cell first.
            if after.cursor + 1 == before.cursor {
                return vec![
                    DisplayOp::CursorLeft(1),
                    DisplayOp::Write(format!("{tail} ")),
                    DisplayOp::CursorLeft(tail_len + 1),
                ];
            }
            if after.cursor == before.cursor {
                return vec![
                    DisplayOp::Write(format!("{tail} ")),
                    DisplayOp::CursorLeft(tail_len + 1),
                ];
            }
        }
    }

    full_line(prompt, &after.text, after.cursor)
}
