//! Per-session command history: bounded, newest first, with adjacent
//! duplicate suppression.

/// Maximum number of retained entries per session.
pub const HISTORY_CAPACITY: usize = 100;

/// Result of stepping toward newer entries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HistoryMove {
    /// Landed on an entry at the given index.
    To(usize, String),
    /// Stepped past the newest entry, back to the live (unsaved) line.
    Live,
    /// Navigation was a no-op.
    Unchanged,
}

/// Ordered list of submitted commands, index 0 being the most recent.
///
/// Entries are immutable once appended; only the whole list can be
/// truncated by capacity or cleared.
#[derive(Clone, Debug, Default)]
pub struct History {
    entries: Vec<String>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a persisted snapshot (already newest first).
    pub fn from_entries(entries: Vec<String>) -> Self {
        let mut history = Self { entries };
        history.entries.truncate(HISTORY_CAPACITY);
        history
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record a submitted command. Empty/whitespace-only commands and exact
    /// repeats of the newest entry are ignored; non-adjacent duplicates are
    /// kept. Drops the oldest entry past capacity.
    pub fn push(&mut self, command: &str) {
        let command = command.trim();
        if command.is_empty() {
            return;
        }
        if self.entries.first().is_some_and(|last| last == command) {
            return;
        }
        self.entries.insert(0, command.to_string());
        self.entries.truncate(HISTORY_CAPACITY);
    }

    /// Step toward older entries. `current` is `None` while editing the live
    /// line. Sticks at the oldest entry.
    pub fn up(&self, current: Option<usize>) -> Option<(usize, &str)> {
        if self.entries.is_empty() {
            return None;
        }
        let next = match current {
            None => 0,
            Some(i) => (i + 1).min(self.entries.len() - 1),
        };
        Some((next, self.entries[next].as_str()))
    }

    /// Step toward newer entries. Stepping down from index 0 returns to the
    /// live line (which the caller restores as empty).
    pub fn down(&self, current: Option<usize>) -> HistoryMove {
        match current {
            None => HistoryMove::Unchanged,
            Some(0) => HistoryMove::Live,
            Some(i) => {
                let next = i - 1;
                match self.entries.get(next) {
                    Some(entry) => HistoryMove::To(next, entry.clone()),
                    None => HistoryMove::Live,
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjacent_duplicates_suppressed() {
        let mut history = History::new();
        history.push("ls");
        history.push("ls");
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_non_adjacent_duplicates_kept() {
        let mut history = History::new();
        history.push("ls");
        history.push("pwd");
        history.push("ls");
        assert_eq!(history.entries(), ["ls", "pwd", "ls"]);
    }

    #[test]
    fn test_blank_commands_ignored() {
        let mut history = History::new();
        history.push("");
        history.push("   ");
        history.push("\t");
        assert!(history.is_empty());
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut history = History::new();
        for i in 0..HISTORY_CAPACITY + 5 {
            history.push(&format!("cmd {i}"));
        }
        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert_eq!(history.entries()[0], format!("cmd {}", HISTORY_CAPACITY + 4));
        // oldest five fell off
        assert_eq!(
            history.entries().last().map(String::as_str),
            Some("cmd 5")
        );
    }

    #[test]
    fn test_up_walks_then_sticks_at_oldest() {
        let mut history = History::new();
        history.push("ls");
        history.push("pwd");
        // newest first: ["pwd", "ls"]
        assert_eq!(history.up(None), Some((0, "pwd")));
        assert_eq!(history.up(Some(0)), Some((1, "ls")));
        assert_eq!(history.up(Some(1)), Some((1, "ls")));
    }

    #[test]
    fn test_up_on_empty_history() {
        let history = History::new();
        assert_eq!(history.up(None), None);
    }

    #[test]
    fn test_down_returns_to_live_line() {
        let mut history = History::new();
        history.push("ls");
        history.push("pwd");
        assert_eq!(history.down(None), HistoryMove::Unchanged);
        assert_eq!(history.down(Some(1)), HistoryMove::To(0, "pwd".into()));
        assert_eq!(history.down(Some(0)), HistoryMove::Live);
    }
}
