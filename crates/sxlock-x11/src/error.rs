//! Error types for the X11 backend

use sxlock_core::LockError;
use thiserror::Error;
use x11rb::errors::{ConnectError, ConnectionError, ReplyError, ReplyOrIdError};

/// Result type alias for X11 backend operations
pub type Result<T> = std::result::Result<T, X11Error>;

/// Errors raised while talking to the X server
#[derive(Debug, Error)]
pub enum X11Error {
    /// The display could not be opened
    #[error("cannot open display: {0}")]
    Connect(#[from] ConnectError),

    /// The connection broke
    #[error("X11 connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// The server answered a request with an error
    #[error("X11 request failed: {0}")]
    Reply(#[from] ReplyError),

    /// A request or id allocation failed
    #[error("X11 request failed: {0}")]
    ReplyOrId(#[from] ReplyOrIdError),

    /// The configured font is not available
    #[error("cannot load font {0}")]
    Font(String),

    /// The screen announced by the connection does not exist
    #[error("screen {0} does not exist")]
    NoScreen(usize),

    /// No output can show the prompt
    #[error("no connected output detected")]
    NoOutput,

    /// A required extension is missing
    #[error("{0} extension not available")]
    MissingExtension(&'static str),
}

impl From<X11Error> for LockError {
    fn from(err: X11Error) -> Self {
        LockError::display(err)
    }
}
