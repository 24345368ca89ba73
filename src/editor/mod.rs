//! Line editing state for one terminal session.
//!
//! The buffer is pure state: every operation is total, synchronous, and
//! returns the before/after snapshots so the redraw adapter can compute a
//! minimal display diff without re-reading the whole line.

pub mod history;
pub mod paste;

/// A point-in-time view of the line buffer. Cursor is a char offset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineSnapshot {
    pub text: String,
    pub cursor: usize,
}

/// Before/after pair produced by every buffer operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub before: LineSnapshot,
    pub after: LineSnapshot,
}

/// The command line a user is composing, plus the cursor offset within it.
///
/// Invariant: `0 <= cursor <= text.chars().count()` after every operation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LineBuffer {
    text: String,
    cursor: usize,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Cursor position in chars.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Length in chars.
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn snapshot(&self) -> LineSnapshot {
        LineSnapshot {
            text: self.text.clone(),
            cursor: self.cursor,
        }
    }

    /// Byte offset of the given char position.
    fn byte_offset(&self, char_pos: usize) -> usize {
        self.text
            .char_indices()
            .nth(char_pos)
            .map(|(i, _)| i)
            .unwrap_or(self.text.len())
    }

    fn transition_from(&self, before: LineSnapshot) -> Transition {
        Transition {
            before,
            after: self.snapshot(),
        }
    }

    /// Splice one char at the cursor and advance past it.
    pub fn insert(&mut self, ch: char) -> Transition {
        let before = self.snapshot();
        let at = self.byte_offset(self.cursor);
        self.text.insert(at, ch);
        self.cursor += 1;
        self.transition_from(before)
    }

    /// Splice a string at the cursor (used for paste insertion).
    pub fn insert_str(&mut self, s: &str) -> Transition {
        let before = self.snapshot();
        let at = self.byte_offset(self.cursor);
        self.text.insert_str(at, s);
        self.cursor += s.chars().count();
        self.transition_from(before)
    }

    /// Remove the char before the cursor. No-op at the start of the line.
    pub fn backspace(&mut self) -> Transition {
        let before = self.snapshot();
        if self.cursor > 0 {
            let at = self.byte_offset(self.cursor - 1);
            self.text.remove(at);
            self.cursor -= 1;
        }
        self.transition_from(before)
    }

    /// Remove the char under the cursor. No-op at the end of the line.
    pub fn delete(&mut self) -> Transition {
        let before = self.snapshot();
        if self.cursor < self.len() {
            let at = self.byte_offset(self.cursor);
            self.text.remove(at);
        }
        self.transition_from(before)
    }

    pub fn move_left(&mut self) -> Transition {
        let before = self.snapshot();
        self.cursor = self.cursor.saturating_sub(1);
        self.transition_from(before)
    }

    pub fn move_right(&mut self) -> Transition {
        let before = self.snapshot();
        if self.cursor < self.len() {
            self.cursor += 1;
        }
        self.transition_from(before)
    }

    /// Replace the whole line, cursor at the end. Used by history navigation,
    /// completion, and the post-submission reset.
    pub fn replace_all(&mut self, new_text: &str) -> Transition {
        let before = self.snapshot();
        self.text = new_text.to_string();
        self.cursor = self.len();
        self.transition_from(before)
    }

    pub fn clear(&mut self) -> Transition {
        self.replace_all("")
    }
}

/// Discrete input events reported by the display surface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Backspace,
    Delete,
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
    Tab,
    Interrupt,
    FormFeed,
    Paste(String),
}

/// Logical editor actions, decoupled from raw key codes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputAction {
    Insert(char),
    Backspace,
    Delete,
    MoveLeft,
    MoveRight,
    HistoryUp,
    HistoryDown,
    Complete,
    Interrupt,
    ClearScreen,
    Paste(String),
    Submit,
}

impl From<Key> for InputAction {
    fn from(key: Key) -> Self {
        match key {
            Key::Char(ch) => InputAction::Insert(ch),
            Key::Enter => InputAction::Submit,
            Key::Backspace => InputAction::Backspace,
            Key::Delete => InputAction::Delete,
            Key::ArrowLeft => InputAction::MoveLeft,
            Key::ArrowRight => InputAction::MoveRight,
            Key::ArrowUp => InputAction::HistoryUp,
            Key::ArrowDown => InputAction::HistoryDown,
            Key::Tab => InputAction::Complete,
            Key::Interrupt => InputAction::Interrupt,
            Key::FormFeed => InputAction::ClearScreen,
            Key::Paste(text) => InputAction::Paste(text),
        }
    }
}
