//! sxlock core - the lock session controller
//!
//! This crate holds everything that decides whether a screen stays locked:
//! the pinned credential buffer, bounded acquisition of exclusive input,
//! power-management save/restore, signal-driven emergency teardown, the
//! conversation with the authentication provider, and the lock state machine.
//!
//! Display servers and authentication providers plug in through the traits in
//! [`display`] and [`auth`]; `sxlock-x11` and `sxlock-pam` are the production
//! implementations.

pub mod auth;
pub mod config;
pub mod credential;
pub mod display;
pub mod error;
pub mod grab;
pub mod lock_loop;
pub mod mask;
pub mod power;
pub mod retry;
pub mod session;
pub mod signal;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use auth::{AuthOutcome, AuthProvider, AuthSession, Conversation, PromptStyle};
pub use config::LockConfig;
pub use credential::{BufferFull, CredentialBuffer, CREDENTIAL_CAPACITY};
pub use display::{EventSource, Frame, GrabTarget, Indicator, InputEvent, Key, LockDisplay, Renderer};
pub use error::{ErrorClass, LockError, Result};
pub use grab::{ExclusiveInput, GrabController, GrabState, ResourceKind};
pub use lock_loop::{transition, Action, InputKind, LockLoop, LockState};
pub use mask::PasswordMask;
pub use power::{PowerControl, PowerSnapshot, PowerStateGuard, PowerTimings, RestoreLatch};
pub use retry::{retry_bounded, RetryOutcome, RetryPolicy};
pub use session::{Session, SessionOutcome};
pub use signal::{ArmSignals, EmergencyRestore, SignalGuard};

/// Program name used as the prefix of every fatal diagnostic
pub const PROGNAME: &str = "sxlock";

/// Failure banner shown after a rejected attempt
pub const AUTH_FAILED_BANNER: &str = "authentication failed";
