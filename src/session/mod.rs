//! Terminal sessions.
//!
//! A [`Session`] is the persistent record of one terminal window; a
//! [`Terminal`] binds that record to the transient line editor, history
//! cursor, display surface, and submission queue. There is no remote
//! process: the working directory string threaded through each dispatch is
//! the only session state the server ever sees.

pub mod controller;
pub mod store;

use crate::completion::{self, Completion};
use crate::dispatch::{DispatchState, ExecRequest, ExecResponse, Executor};
use crate::display::{redraw, DisplayOp, DisplaySurface};
use crate::editor::history::{History, HistoryMove};
use crate::editor::{paste, InputAction, Key, LineBuffer, Transition};
use crate::error::DispatchError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

pub type SessionId = Uuid;

/// Shell flavor of a session. Affects prompt formatting and completion
/// rules only, never execution semantics.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dialect {
    #[default]
    PosixBash,
    PosixZsh,
    WindowsCmd,
    WindowsPowershell,
}

impl Dialect {
    pub fn prompt(&self, cwd: &str) -> String {
        match self {
            Dialect::PosixBash => format!("{cwd}$ "),
            Dialect::PosixZsh => format!("{cwd}% "),
            Dialect::WindowsCmd => format!("{cwd}>"),
            Dialect::WindowsPowershell => format!("PS {cwd}> "),
        }
    }

    pub fn path_separator(&self) -> char {
        match self {
            Dialect::PosixBash | Dialect::PosixZsh => '/',
            Dialect::WindowsCmd | Dialect::WindowsPowershell => '\\',
        }
    }

    pub fn case_insensitive_completion(&self) -> bool {
        matches!(self, Dialect::WindowsCmd | Dialect::WindowsPowershell)
    }

    /// Whether a backslash escapes a following space in a token.
    pub fn backslash_escapes(&self) -> bool {
        matches!(self, Dialect::PosixBash | Dialect::PosixZsh)
    }

    /// Command names offered for first-token completion.
    pub fn builtins(&self) -> &'static [&'static str] {
        match self {
            Dialect::PosixBash | Dialect::PosixZsh => &[
                "cat", "cd", "clear", "cp", "echo", "env", "exit", "export", "find", "grep",
                "head", "history", "ls", "mkdir", "mv", "pwd", "rm", "tail", "touch",
            ],
            Dialect::WindowsCmd => &[
                "cd", "cls", "copy", "del", "dir", "echo", "exit", "mkdir", "more", "move",
                "ren", "set", "type", "ver",
            ],
            Dialect::WindowsPowershell => &[
                "Clear-Host", "Copy-Item", "Get-ChildItem", "Get-Content", "Get-Location",
                "Move-Item", "New-Item", "Remove-Item", "Set-Location", "Write-Output",
            ],
        }
    }
}

/// Window placement of a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            x: 80,
            y: 60,
            width: 640,
            height: 400,
        }
    }
}

/// Persistent record of one terminal window. The in-progress command line is
/// deliberately not part of this record and is never persisted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub title: String,
    pub geometry: Geometry,
    pub z_order: u64,
    pub minimized: bool,
    pub focused: bool,
    pub dialect: Dialect,
    pub working_directory: String,
    /// History snapshot, newest first.
    pub history: Vec<String>,
    pub attached: bool,
    pub visible: bool,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl Session {
    pub fn new(title: &str, dialect: Dialect, working_directory: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.to_string(),
            geometry: Geometry::default(),
            z_order: 0,
            minimized: false,
            focused: false,
            dialect,
            working_directory: working_directory.to_string(),
            history: Vec::new(),
            attached: false,
            visible: true,
            active: true,
            created_at: now,
            last_active: now,
        }
    }
}

/// Line terminators normalized to the grid's convention, always ending with
/// a terminator so the prompt starts on a fresh line.
fn normalize_output(raw: &str) -> String {
    let mut out = raw.replace("\r\n", "\n").replace('\n', "\r\n");
    if !out.ends_with("\r\n") {
        out.push_str("\r\n");
    }
    out
}

/// One live terminal: session record plus the transient editing state.
///
/// All keystroke handling is synchronous; only command dispatch is async,
/// via [`drain_queue`], which serializes submissions per session.
pub struct Terminal {
    session: Session,
    buffer: LineBuffer,
    history: History,
    history_cursor: Option<usize>,
    dispatch_state: DispatchState,
    pending: VecDeque<String>,
    in_flight: bool,
    surface: Option<Box<dyn DisplaySurface>>,
    columns: usize,
    resize_generation: u64,
    executor: Arc<dyn Executor>,
}

impl Terminal {
    pub fn new(session: Session, executor: Arc<dyn Executor>) -> Self {
        let history = History::from_entries(session.history.clone());
        Self {
            session,
            buffer: LineBuffer::new(),
            history,
            history_cursor: None,
            dispatch_state: DispatchState::Idle,
            pending: VecDeque::new(),
            in_flight: false,
            surface: None,
            columns: completion::DEFAULT_LISTING_WIDTH,
            resize_generation: 0,
            executor,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub(crate) fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn buffer_text(&self) -> &str {
        self.buffer.text()
    }

    pub fn dispatch_state(&self) -> DispatchState {
        self.dispatch_state
    }

    pub fn prompt(&self) -> String {
        self.session.dialect.prompt(&self.session.working_directory)
    }

    /// Bind a display surface and print the banner, the connectivity-probe
    /// result, and the first prompt.
    pub fn attach(&mut self, surface: Box<dyn DisplaySurface>, probe: Result<(), DispatchError>) {
        self.columns = surface.columns();
        self.surface = Some(surface);
        self.session.attached = true;
        self.session.visible = true;

        let probe_line = match probe {
            Ok(()) => "endpoint: reachable\r\n".to_string(),
            Err(e) => format!("endpoint: unreachable ({e})\r\n"),
        };
        let ops = [
            DisplayOp::Write(format!("{} ({})\r\n", self.session.title, self.session.working_directory)),
            DisplayOp::Write(probe_line),
            DisplayOp::Write(self.prompt()),
        ];
        self.apply(&ops);
    }

    pub fn detach(&mut self) {
        self.surface = None;
        self.session.attached = false;
    }

    pub fn is_attached(&self) -> bool {
        self.surface.is_some()
    }

    /// Switch dialect and reset the line editor; the next prompt reflects
    /// the new dialect.
    pub fn set_dialect(&mut self, dialect: Dialect) {
        if self.session.dialect == dialect {
            return;
        }
        self.session.dialect = dialect;
        self.reset_line();
        let mut ops = vec![DisplayOp::ClearLine];
        ops.push(DisplayOp::Write(self.prompt()));
        self.apply(&ops);
    }

    /// Debounce bookkeeping for resize; returns the generation the caller
    /// must present to [`Terminal::refit`].
    pub fn begin_resize(&mut self) -> u64 {
        self.resize_generation += 1;
        self.resize_generation
    }

    /// Re-fit the grid if no newer resize superseded this one. Buffer state
    /// is never touched.
    pub fn refit(&mut self, generation: u64) {
        if generation != self.resize_generation {
            return;
        }
        if let Some(surface) = self.surface.as_mut() {
            surface.refit();
            self.columns = surface.columns();
        }
    }

    /// Route one keystroke. Returns true when a command was queued and the
    /// caller should run [`drain_queue`].
    pub fn handle_key(&mut self, key: Key) -> bool {
        self.handle_action(InputAction::from(key))
    }

    /// Route one logical action. Returns true when a command was queued.
    pub fn handle_action(&mut self, action: InputAction) -> bool {
        match action {
            InputAction::Insert(ch) => {
                let t = self.buffer.insert(ch);
                self.apply_diff(&t);
            }
            InputAction::Backspace => {
                let t = self.buffer.backspace();
                self.apply_diff(&t);
            }
            InputAction::Delete => {
                let t = self.buffer.delete();
                self.apply_diff(&t);
            }
            InputAction::MoveLeft => {
                let t = self.buffer.move_left();
                self.apply_diff(&t);
            }
            InputAction::MoveRight => {
                let t = self.buffer.move_right();
                self.apply_diff(&t);
            }
            InputAction::HistoryUp => {
                if let Some((index, entry)) = self.history.up(self.history_cursor) {
                    let entry = entry.to_string();
                    self.history_cursor = Some(index);
                    let t = self.buffer.replace_all(&entry);
                    self.apply_diff(&t);
                }
            }
            InputAction::HistoryDown => match self.history.down(self.history_cursor) {
                HistoryMove::To(index, entry) => {
                    self.history_cursor = Some(index);
                    let t = self.buffer.replace_all(&entry);
                    self.apply_diff(&t);
                }
                HistoryMove::Live => {
                    // Observed behavior: the live line comes back empty, not
                    // with the user's pre-navigation edit.
                    self.history_cursor = None;
                    let t = self.buffer.clear();
                    self.apply_diff(&t);
                }
                HistoryMove::Unchanged => {}
            },
            InputAction::Complete => self.complete(),
            InputAction::Interrupt => {
                self.reset_line();
                let ops = [
                    DisplayOp::Write("^C\r\n".into()),
                    DisplayOp::Write(self.prompt()),
                ];
                self.apply(&ops);
            }
            InputAction::ClearScreen => {
                self.reset_line();
                let ops = [DisplayOp::ClearScreen, DisplayOp::Write(self.prompt())];
                self.apply(&ops);
            }
            InputAction::Paste(text) => {
                let clean = paste::sanitize(&text);
                if !clean.is_empty() {
                    let t = self.buffer.insert_str(&clean);
                    self.apply_diff(&t);
                }
            }
            InputAction::Submit => return self.submit(),
        }
        false
    }

    fn complete(&mut self) {
        let result = completion::resolve(
            self.buffer.text(),
            &self.session.working_directory,
            self.session.dialect,
            self.columns,
        );
        match result {
            Completion::None => {}
            Completion::Single(full) => {
                let t = self.buffer.replace_all(&full);
                self.apply_diff(&t);
            }
            Completion::Multiple {
                listing,
                replacement,
                ..
            } => {
                if let Some(full) = replacement {
                    self.buffer.replace_all(&full);
                }
                let mut ops = vec![DisplayOp::Write(format!("\r\n{listing}\r\n"))];
                ops.extend(redraw::full_line(
                    &self.prompt(),
                    self.buffer.text(),
                    self.buffer.cursor(),
                ));
                self.apply(&ops);
            }
        }
    }

    /// Handle Enter. The buffer and history cursor reset immediately, before
    /// the response is known, so the session stays typable while the request
    /// is outstanding.
    fn submit(&mut self) -> bool {
        let line = self.buffer.text().to_string();
        self.reset_line();

        let mut ops = vec![DisplayOp::Write("\r\n".into())];
        let command = line.trim();

        if command.is_empty() {
            ops.push(DisplayOp::Write(self.prompt()));
            self.apply(&ops);
            return false;
        }

        // Local commands never leave the client.
        if command == "clear" || command == "cls" {
            ops.push(DisplayOp::ClearScreen);
            ops.push(DisplayOp::Write(self.prompt()));
            self.apply(&ops);
            return false;
        }

        self.history.push(command);
        self.session.history = self.history.entries().to_vec();
        self.session.last_active = Utc::now();
        self.pending.push_back(command.to_string());
        self.apply(&ops);
        true
    }

    /// Write the response (or error line) and a fresh prompt. Failure never
    /// mutates the working directory or history.
    fn finish_dispatch(&mut self, result: Result<ExecResponse, DispatchError>) {
        let mut ops = Vec::new();
        match result {
            Ok(response) if response.success => {
                self.dispatch_state = DispatchState::Succeeded;
                if let Some(output) = response.output.as_deref().filter(|o| !o.is_empty()) {
                    ops.push(DisplayOp::Write(normalize_output(output)));
                }
                if let Some(dir) = response.new_directory {
                    log::debug!("session {}: cwd {} -> {dir}", self.session.id, self.session.working_directory);
                    self.session.working_directory = dir;
                }
            }
            Ok(response) => {
                self.dispatch_state = DispatchState::Failed;
                let text = response
                    .output
                    .as_deref()
                    .filter(|o| !o.is_empty())
                    .unwrap_or("command failed");
                ops.push(DisplayOp::Write(normalize_output(text)));
            }
            Err(e) => {
                self.dispatch_state = DispatchState::Failed;
                log::warn!("session {}: dispatch failed: {e}", self.session.id);
                ops.push(DisplayOp::Write(format!("error: {e}\r\n")));
            }
        }
        ops.push(DisplayOp::Write(self.prompt()));
        // Re-echo anything typed while the request was in flight.
        if !self.buffer.is_empty() {
            ops.push(DisplayOp::Write(self.buffer.text().to_string()));
            let tail = self.buffer.len() - self.buffer.cursor();
            if tail > 0 {
                ops.push(DisplayOp::CursorLeft(tail));
            }
        }
        self.apply(&ops);
    }

    fn reset_line(&mut self) {
        self.buffer.clear();
        self.history_cursor = None;
    }

    fn apply_diff(&mut self, transition: &Transition) {
        let ops = redraw::diff(&self.prompt(), transition);
        if !ops.is_empty() {
            self.apply(&ops);
        }
    }

    fn apply(&mut self, ops: &[DisplayOp]) {
        if let Some(surface) = self.surface.as_mut() {
            surface.apply(ops);
        }
    }
}

/// Process a session's queued submissions in FIFO order, one request in
/// flight at a time. The state lock is never held across the await, so the
/// session stays editable while a request is outstanding. Concurrent calls
/// for the same terminal are safe: whichever drain is active keeps the
/// queue, the rest bail out.
pub async fn drain_queue(terminal: Arc<Mutex<Terminal>>) {
    loop {
        let (request, executor) = {
            let mut t = terminal.lock().await;
            if t.in_flight {
                return;
            }
            let Some(command) = t.pending.pop_front() else {
                return;
            };
            t.in_flight = true;
            t.dispatch_state = DispatchState::Sent;
            let request = ExecRequest {
                command,
                cwd: t.session.working_directory.clone(),
            };
            (request, t.executor.clone())
        };

        let result = executor.execute(&request).await;

        let mut t = terminal.lock().await;
        t.in_flight = false;
        t.finish_dispatch(result);
    }
}
