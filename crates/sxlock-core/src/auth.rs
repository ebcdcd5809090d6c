//! Conversation-style authentication
//!
//! The provider drives the exchange: it emits prompts and the session answers
//! secret prompts with the buffered credential. The provider never sees the
//! buffer itself, only the NUL-terminated response for the duration of one
//! prompt.

use std::ffi::CStr;

use tracing::{debug, info, warn};

use crate::credential::CredentialBuffer;
use crate::error::Result;

/// Kind of message emitted by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptStyle {
    /// Secret prompt, input must not be echoed
    EchoOff,
    /// Visible prompt
    EchoOn,
    /// Error message for the user
    ErrorMsg,
    /// Informational message for the user
    TextInfo,
}

impl PromptStyle {
    /// Whether the provider expects an answer
    pub fn expects_response(self) -> bool {
        matches!(self, PromptStyle::EchoOff | PromptStyle::EchoOn)
    }
}

/// Answers provider prompts
pub trait Conversation {
    /// Returns the response for one prompt, `None` when no text is due
    fn respond(&mut self, style: PromptStyle, message: &CStr) -> Option<&CStr>;
}

/// External authentication provider, started for one identity
pub trait AuthProvider {
    /// Runs one authentication exchange; `Ok(false)` means rejected
    fn authenticate(&mut self, conversation: &mut dyn Conversation) -> Result<bool>;
}

/// Result of evaluating one completed entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated,
    Rejected,
}

/// Answers every prompt that expects input with the buffered credential
struct CredentialResponder<'a> {
    credential: &'a CStr,
}

impl Conversation for CredentialResponder<'_> {
    fn respond(&mut self, style: PromptStyle, message: &CStr) -> Option<&CStr> {
        match style {
            PromptStyle::EchoOff | PromptStyle::EchoOn => Some(self.credential),
            PromptStyle::ErrorMsg | PromptStyle::TextInfo => {
                debug!(?style, message = %message.to_string_lossy(), "provider message");
                None
            }
        }
    }
}

/// Evaluates credentials against a provider
#[derive(Debug)]
pub struct AuthSession<P> {
    provider: P,
    attempts: u64,
}

impl<P: AuthProvider> AuthSession<P> {
    /// Wraps a started provider
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            attempts: 0,
        }
    }

    /// The underlying provider
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Number of evaluated entries
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    /// Offers the buffered credential to the provider.
    ///
    /// On success the buffer is wiped before returning; otherwise it is
    /// cleared so the next attempt starts empty. A provider error never
    /// unlocks: it is logged and counts as a rejection.
    pub fn evaluate(&mut self, credential: &mut CredentialBuffer) -> AuthOutcome {
        self.attempts += 1;

        let verdict = {
            let mut responder = CredentialResponder {
                credential: credential.as_response(),
            };
            self.provider.authenticate(&mut responder)
        };

        match verdict {
            Ok(true) => {
                credential.wipe();
                info!(attempt = self.attempts, "authentication succeeded");
                AuthOutcome::Authenticated
            }
            Ok(false) => {
                credential.clear();
                warn!(attempt = self.attempts, "authentication failed");
                AuthOutcome::Rejected
            }
            Err(e) => {
                credential.clear();
                warn!(attempt = self.attempts, error = %e, "authentication provider error");
                AuthOutcome::Rejected
            }
        }
    }
}
