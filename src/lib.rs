//! Wharf Core - terminal session engine for the Wharf DevTools dashboard.
//!
//! Emulates an interactive shell line editor entirely on the client, in
//! front of a stateless remote execution endpoint: there is no server-side
//! process or PTY, only independent `{command, cwd}` request/response
//! exchanges. The engine owns line editing, history, tab completion, paste
//! folding, minimal-diff redraws, per-session FIFO dispatch, and the
//! registry of concurrently open sessions.

pub mod completion;
pub mod dispatch;
pub mod display;
pub mod editor;
pub mod error;
pub mod session;

use std::sync::OnceLock;

/// Initialize logging once, for embedders without a logger of their own.
pub fn init_logging() {
    static INIT: OnceLock<()> = OnceLock::new();
    INIT.get_or_init(|| {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .init();
    });
}
