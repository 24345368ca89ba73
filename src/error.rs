use thiserror::Error;
use uuid::Uuid;

/// Failure of a single dispatch to the execution endpoint.
///
/// Any transport error, non-2xx status, or timeout is collapsed into this
/// type; callers treat all variants uniformly (error line, unchanged state).
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("endpoint returned status {status}")]
    Endpoint { status: u16 },

    #[error("request timed out")]
    Timeout,
}

/// Errors surfaced by the session engine itself. Dispatch failures are not
/// here: they are rendered inline in the owning session, never propagated.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown session {0}")]
    UnknownSession(Uuid),

    #[error("session {0} has no display surface attached")]
    Detached(Uuid),

    #[error("session store i/o: {0}")]
    StoreIo(#[from] std::io::Error),

    #[error("session store format: {0}")]
    StoreFormat(#[from] serde_json::Error),
}
