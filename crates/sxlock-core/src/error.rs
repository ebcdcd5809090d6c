//! Error types for the lock session core

use thiserror::Error;

use crate::grab::ResourceKind;

/// Result type alias for lock session operations
pub type Result<T> = std::result::Result<T, LockError>;

/// Boxed error raised by a collaborator (display server, authentication provider)
pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// How an error is handled by the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Setup could not complete; nothing exclusive is held yet
    FatalSetup,
    /// Exclusive input was not obtained within the attempt budget
    GrabFailure,
    /// The provider failed while evaluating a credential; the attempt counts as rejected
    AuthFailure,
    /// A termination signal interrupted the session
    SignalInterrupt,
    /// A single-shot operation was invoked twice
    Invariant,
}

/// Errors that can occur while setting up or running a lock session
#[derive(Debug, Error)]
pub enum LockError {
    /// The identity to authenticate is unknown
    #[error("{0} environment variable not set, please set it")]
    MissingIdentity(&'static str),

    /// The credential buffer could not be pinned in RAM
    #[error("could not lock page in memory, check RLIMIT_MEMLOCK: {0}")]
    MemoryLock(#[source] std::io::Error),

    /// Exclusive input could not be acquired
    #[error("cannot grab {kind} after {attempts} attempts")]
    GrabTimedOut { kind: ResourceKind, attempts: u32 },

    /// The display collaborator failed
    #[error("display error: {0}")]
    Display(#[source] BoxedError),

    /// The authentication provider could not be initialised
    #[error("authentication provider: {0}")]
    AuthSetup(#[source] BoxedError),

    /// The authentication provider failed during an attempt
    #[error("authentication provider failed: {0}")]
    AuthProvider(#[source] BoxedError),

    /// Power settings were already written back
    #[error("power settings already restored")]
    AlreadyRestored,

    /// Signal handlers were installed or armed twice
    #[error("signal handlers already {0}")]
    SignalsAlreadySet(&'static str),

    /// sigaction failed
    #[error("cannot install signal handler: {0}")]
    SignalSetup(#[source] std::io::Error),

    /// Configuration could not be loaded or is invalid
    #[error("configuration error: {0}")]
    Config(String),

    /// The process received a termination signal
    #[error("caught signal {0}")]
    Signal(i32),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LockError {
    /// Wraps a display collaborator error
    pub fn display<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Display(Box::new(err))
    }

    /// Wraps an authentication provider setup error
    pub fn auth_setup<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::AuthSetup(Box::new(err))
    }

    /// Wraps an authentication provider runtime error
    pub fn auth_provider<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::AuthProvider(Box::new(err))
    }

    /// Classifies the error according to how the session must react to it
    pub fn class(&self) -> ErrorClass {
        match self {
            LockError::GrabTimedOut { .. } => ErrorClass::GrabFailure,
            LockError::AuthProvider(_) => ErrorClass::AuthFailure,
            LockError::Signal(_) => ErrorClass::SignalInterrupt,
            LockError::AlreadyRestored | LockError::SignalsAlreadySet(_) => ErrorClass::Invariant,
            LockError::MissingIdentity(_)
            | LockError::MemoryLock(_)
            | LockError::Display(_)
            | LockError::AuthSetup(_)
            | LockError::SignalSetup(_)
            | LockError::Config(_)
            | LockError::Io(_) => ErrorClass::FatalSetup,
        }
    }

    /// Whether the session may continue after this error
    pub fn is_recoverable(&self) -> bool {
        self.class() == ErrorClass::AuthFailure
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        let grab = LockError::GrabTimedOut {
            kind: ResourceKind::Keyboard,
            attempts: 1000,
        };
        assert_eq!(grab.class(), ErrorClass::GrabFailure);
        assert!(!grab.is_recoverable());

        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        assert_eq!(LockError::auth_provider(io).class(), ErrorClass::AuthFailure);
        assert!(LockError::auth_provider(std::fmt::Error).is_recoverable());

        assert_eq!(
            LockError::MissingIdentity("USER").class(),
            ErrorClass::FatalSetup
        );
        assert_eq!(LockError::AlreadyRestored.class(), ErrorClass::Invariant);
        assert_eq!(LockError::Signal(15).class(), ErrorClass::SignalInterrupt);
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            LockError::MissingIdentity("USER").to_string(),
            "USER environment variable not set, please set it"
        );
        let grab = LockError::GrabTimedOut {
            kind: ResourceKind::Pointer,
            attempts: 3,
        };
        assert_eq!(grab.to_string(), "cannot grab pointer after 3 attempts");
    }
}
