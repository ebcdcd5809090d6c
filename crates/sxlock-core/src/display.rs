//! Display collaborator contract
//!
//! The lock session talks to the display server through these traits. One
//! backend object usually implements all of them and [`LockDisplay`] bundles
//! them together with the teardown hooks.

use crate::error::Result;
use crate::grab::ResourceKind;
use crate::power::{PowerControl, PowerSnapshot};
use crate::signal::EmergencyRestore;

/// A key press after keysym translation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// A printable ASCII character
    Char(u8),
    /// BackSpace
    Backspace,
    /// Return or keypad Enter
    Enter,
    /// Escape
    Escape,
    /// Any other key (modifiers, function keys, non-ASCII symbols)
    Other,
}

/// An input event delivered while the session holds the grabs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// Key press
    Key(Key),
    /// Pointer moved
    PointerMotion,
    /// Anything else (button presses, exposure, key releases)
    Other,
}

/// What the indicator line shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator<'a> {
    /// Obfuscation characters standing in for the typed credential
    Masked(&'a str),
    /// The failure banner
    AuthFailed,
}

/// One redraw request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    /// Name shown above the indicator
    pub username: &'a str,
    /// Masked credential or failure banner
    pub indicator: Indicator<'a>,
}

/// Blocking source of input events
pub trait EventSource {
    /// Blocks until the next event arrives
    fn next_event(&mut self) -> Result<InputEvent>;

    /// Whether more events are already queued
    fn has_pending(&mut self) -> Result<bool>;
}

/// Draws the lock surface
pub trait Renderer {
    /// Redraws username and indicator
    fn render(&mut self, frame: &Frame<'_>) -> Result<()>;
}

/// Exclusive input acquisition
pub trait GrabTarget {
    /// Makes one attempt to grab `kind`; `Ok(false)` means someone else holds it
    fn try_grab(&mut self, kind: ResourceKind) -> Result<bool>;
}

/// Everything a lock session needs from the display server
pub trait LockDisplay: EventSource + Renderer + GrabTarget + PowerControl {
    /// Builds the async-signal-safe restore used by the signal path
    fn emergency_restore(&mut self, snapshot: &PowerSnapshot) -> Result<Box<dyn EmergencyRestore>>;

    /// Releases grabs and display resources after a successful session
    fn release(&mut self) -> Result<()>;
}
