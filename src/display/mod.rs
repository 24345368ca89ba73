//! Display surface seam.
//!
//! The engine never draws pixels; it emits ordered [`DisplayOp`] writes that
//! the on-screen text grid applies verbatim. Keeping this seam narrow is
//! what lets every redraw decision be unit-tested without a live grid.

pub mod redraw;

/// Ordered write primitives accepted by the rendering surface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DisplayOp {
    /// Plain text, echoed at the current cursor position.
    Write(String),
    /// Move the cursor left by `n` cells.
    CursorLeft(usize),
    /// Move the cursor right by `n` cells.
    CursorRight(usize),
    /// Clear the current line and return the cursor to column 0.
    ClearLine,
    /// Clear the whole grid (local `clear`/`cls` and form feed).
    ClearScreen,
}

/// One terminal's rendering surface.
///
/// Implementations apply ops in order. `refit` is called (debounced) after a
/// geometry change and only touches the grid, never buffer state.
pub trait DisplaySurface: Send {
    fn apply(&mut self, ops: &[DisplayOp]);

    fn refit(&mut self) {}

    /// Grid width in columns, used to lay out completion listings.
    fn columns(&self) -> usize {
        80
    }
}
