//! sxlock PAM backend
//!
//! `libpam` is loaded with `dlopen` when the authenticator starts, so
//! building the workspace needs no PAM development files. The conversation
//! callback forwards prompts to the lock session's
//! [`Conversation`](sxlock_core::Conversation).

pub mod authenticator;
pub mod conversation;
pub mod error;
pub mod ffi;

pub use authenticator::PamAuthenticator;
pub use error::{PamError, Result};
