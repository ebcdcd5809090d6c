//! Exclusive pointer and keyboard acquisition
//!
//! Without a keyboard grab, keystrokes typed into the lock screen leak to
//! whatever application has focus underneath. [`ExclusiveInput`] can only be
//! obtained once both grabs succeeded, and the lock loop requires it.

use std::fmt;

use tracing::{debug, error};

use crate::display::GrabTarget;
use crate::error::{LockError, Result};
use crate::retry::{retry_bounded, RetryOutcome, RetryPolicy};

/// Class of input device to grab
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Mouse, touchpad and other pointing devices
    Pointer,
    /// Keyboard
    Keyboard,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Pointer => f.write_str("pointer"),
            ResourceKind::Keyboard => f.write_str("keyboard"),
        }
    }
}

/// Grab state of one device class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GrabState {
    /// Not held by this session
    #[default]
    Unacquired,
    /// Exclusively held by this session
    Acquired,
}

/// Proof that both pointer and keyboard are grabbed
#[derive(Debug)]
pub struct ExclusiveInput {
    pointer: GrabState,
    keyboard: GrabState,
}

impl ExclusiveInput {
    /// Grab state of one device class
    pub fn state(&self, kind: ResourceKind) -> GrabState {
        match kind {
            ResourceKind::Pointer => self.pointer,
            ResourceKind::Keyboard => self.keyboard,
        }
    }
}

/// Acquires grabs with a bounded retry budget
#[derive(Debug, Clone, Copy, Default)]
pub struct GrabController {
    policy: RetryPolicy,
}

impl GrabController {
    /// Creates a controller with the given attempt budget and pacing
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Attempt budget and pacing
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Tries to grab one device class, returning the number of attempts used
    pub fn acquire(&self, target: &mut dyn GrabTarget, kind: ResourceKind) -> Result<u32> {
        match retry_bounded(self.policy, || target.try_grab(kind))? {
            RetryOutcome::Succeeded { attempts } => {
                debug!(%kind, attempts, "grab acquired");
                Ok(attempts)
            }
            RetryOutcome::Exhausted { attempts } => {
                error!(%kind, attempts, "grab budget exhausted");
                Err(LockError::GrabTimedOut { kind, attempts })
            }
        }
    }

    /// Grabs pointer and keyboard, each with the full budget
    pub fn acquire_exclusive(&self, target: &mut dyn GrabTarget) -> Result<ExclusiveInput> {
        self.acquire(target, ResourceKind::Pointer)?;
        self.acquire(target, ResourceKind::Keyboard)?;

        Ok(ExclusiveInput {
            pointer: GrabState::Acquired,
            keyboard: GrabState::Acquired,
        })
    }
}
