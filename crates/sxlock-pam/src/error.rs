//! Error types for the PAM backend

use thiserror::Error;

/// Result type alias for PAM operations
pub type Result<T> = std::result::Result<T, PamError>;

/// Errors raised while loading or calling libpam
#[derive(Debug, Error)]
pub enum PamError {
    /// The shared library could not be loaded
    #[error("cannot load {library}: {reason}")]
    Load {
        library: &'static str,
        reason: String,
    },

    /// A required symbol is missing
    #[error("symbol {0} missing from libpam")]
    Symbol(&'static str),

    /// An argument cannot be passed as a C string
    #[error("{0} contains a NUL byte")]
    Nul(&'static str),

    /// A PAM call returned an error status
    #[error("{call}: {message}")]
    Call {
        call: &'static str,
        status: i32,
        message: String,
    },
}
