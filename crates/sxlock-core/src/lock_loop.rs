//! The lock state machine
//!
//! Every input event is classified into an [`InputKind`], looked up in the
//! [`transition`] table together with the current [`LockState`], and the
//! resulting [`Action`] is applied to the credential buffer. A single redraw
//! is requested each time the input queue drains.

use tracing::{debug, warn};

use crate::auth::{AuthOutcome, AuthProvider, AuthSession};
use crate::credential::CredentialBuffer;
use crate::display::{EventSource, Frame, Indicator, InputEvent, Key, Renderer};
use crate::error::Result;
use crate::grab::ExclusiveInput;
use crate::mask::PasswordMask;
use crate::power::PowerControl;
use crate::session::SessionOutcome;

/// State of the lock loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LockState {
    /// Nothing typed
    #[default]
    Idle,
    /// A credential is being typed
    Composing,
    /// The provider is evaluating the credential
    Authenticating,
    /// The last attempt was rejected; the banner is shown
    Failed,
    /// The user asked for the display to be turned off
    SleepArmed,
}

/// Classification of an input event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputKind {
    Printable,
    Backspace,
    Enter,
    Escape,
    /// A key with no editing meaning
    OtherKey,
    PointerMotion,
    /// Anything that is not a key press or pointer motion
    Unrelated,
}

impl InputKind {
    /// Classifies a translated event
    pub fn of(event: &InputEvent) -> Self {
        match event {
            InputEvent::Key(Key::Char(b)) if is_printable(*b) => InputKind::Printable,
            InputEvent::Key(Key::Char(_)) | InputEvent::Key(Key::Other) => InputKind::OtherKey,
            InputEvent::Key(Key::Backspace) => InputKind::Backspace,
            InputEvent::Key(Key::Enter) => InputKind::Enter,
            InputEvent::Key(Key::Escape) => InputKind::Escape,
            InputEvent::PointerMotion => InputKind::PointerMotion,
            InputEvent::Other => InputKind::Unrelated,
        }
    }
}

fn is_printable(byte: u8) -> bool {
    (0x20..0x7f).contains(&byte)
}

/// What to do with an input in a given state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Append the character to the buffer
    Append,
    /// Remove the last character
    Erase,
    /// Hand the buffer to the provider
    Submit,
    /// Clear the buffer and turn the display off
    Sleep,
    /// Drop the failure/sleep flags
    Wake,
    /// Nothing
    Ignore,
}

/// The key dispatch table
pub const fn transition(state: LockState, input: InputKind) -> Action {
    match (state, input) {
        (_, InputKind::Printable) => Action::Append,
        (_, InputKind::Backspace) => Action::Erase,
        (_, InputKind::Enter) => Action::Submit,
        (_, InputKind::Escape) => Action::Sleep,
        (_, InputKind::PointerMotion) => Action::Wake,
        (LockState::Failed | LockState::SleepArmed, InputKind::OtherKey) => Action::Wake,
        (_, InputKind::OtherKey) => Action::Ignore,
        (_, InputKind::Unrelated) => Action::Ignore,
    }
}

/// Owns the credential and drives one lock session's input handling
pub struct LockLoop {
    state: LockState,
    credential: CredentialBuffer,
    mask: PasswordMask,
    username: String,
    power_managed: bool,
}

impl LockLoop {
    /// Creates an idle loop over an empty credential buffer
    pub fn new(
        credential: CredentialBuffer,
        mask: PasswordMask,
        username: impl Into<String>,
        power_managed: bool,
    ) -> Self {
        Self {
            state: LockState::Idle,
            credential,
            mask,
            username: username.into(),
            power_managed,
        }
    }

    pub fn state(&self) -> LockState {
        self.state
    }

    pub fn credential(&self) -> &CredentialBuffer {
        &self.credential
    }

    /// Whether Escape turns the display off
    pub fn power_managed(&self) -> bool {
        self.power_managed
    }

    pub(crate) fn set_power_managed(&mut self, power_managed: bool) {
        self.power_managed = power_managed;
    }

    /// What the next redraw shows
    pub fn frame(&self) -> Frame<'_> {
        let indicator = match self.state {
            LockState::Failed => Indicator::AuthFailed,
            _ => Indicator::Masked(self.mask.display(self.credential.len())),
        };
        Frame {
            username: &self.username,
            indicator,
        }
    }

    fn idle_or_composing(&self) -> LockState {
        if self.credential.is_empty() {
            LockState::Idle
        } else {
            LockState::Composing
        }
    }

    fn enter(&mut self, next: LockState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "lock state change");
            self.state = next;
        }
    }

    /// Applies one event. Returns the session outcome once the provider
    /// accepted the credential.
    pub fn handle<P: AuthProvider>(
        &mut self,
        event: InputEvent,
        power: &mut dyn PowerControl,
        auth: &mut AuthSession<P>,
    ) -> Option<SessionOutcome> {
        let input = InputKind::of(&event);
        match transition(self.state, input) {
            Action::Append => {
                if let InputEvent::Key(Key::Char(byte)) = event {
                    if self.credential.append(byte).is_err() {
                        debug!("credential buffer full, key dropped");
                    }
                }
                self.enter(self.idle_or_composing());
            }
            Action::Erase => {
                self.credential.backspace();
                self.enter(self.idle_or_composing());
            }
            Action::Submit => {
                self.enter(LockState::Authenticating);
                match auth.evaluate(&mut self.credential) {
                    AuthOutcome::Authenticated => return Some(SessionOutcome::Authenticated),
                    AuthOutcome::Rejected => self.enter(LockState::Failed),
                }
            }
            Action::Sleep => {
                self.credential.clear();
                self.enter(LockState::SleepArmed);
                if self.power_managed {
                    if let Err(e) = power.force_power_off() {
                        warn!(error = %e, "could not turn the display off");
                    }
                }
            }
            Action::Wake => self.enter(self.idle_or_composing()),
            Action::Ignore => {}
        }
        None
    }

    /// Runs until the provider accepts a credential.
    ///
    /// Requires proof of exclusive input: keys are never read without both grabs.
    pub fn run<D, P>(
        &mut self,
        display: &mut D,
        auth: &mut AuthSession<P>,
        _input: &ExclusiveInput,
    ) -> Result<SessionOutcome>
    where
        D: EventSource + Renderer + PowerControl,
        P: AuthProvider,
    {
        display.render(&self.frame())?;

        loop {
            let event = display.next_event()?;
            if let Some(outcome) = self.handle(event, display, auth) {
                return Ok(outcome);
            }
            if !display.has_pending()? {
                display.render(&self.frame())?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::grab::GrabController;
    use crate::testing::{RenderedIndicator, ScriptedDisplay, ScriptedProvider};
    use crate::AUTH_FAILED_BANNER;

    use LockState::*;

    fn lock_loop(power_managed: bool) -> LockLoop {
        LockLoop::new(
            CredentialBuffer::new().unwrap(),
            PasswordMask::new("*", false),
            "alice",
            power_managed,
        )
    }

    fn feed(lock: &mut LockLoop, display: &mut ScriptedDisplay, events: &[InputEvent]) {
        let mut auth = AuthSession::new(ScriptedProvider::accepting("secret"));
        for event in events {
            assert_eq!(lock.handle(*event, display, &mut auth), None);
        }
    }

    fn chars(text: &str) -> Vec<InputEvent> {
        text.bytes().map(|b| InputEvent::Key(Key::Char(b))).collect()
    }

    #[rstest]
    fn test_editing_keys_ignore_state(
        #[values(Idle, Composing, Authenticating, Failed, SleepArmed)] state: LockState,
    ) {
        assert_eq!(transition(state, InputKind::Printable), Action::Append);
        assert_eq!(transition(state, InputKind::Backspace), Action::Erase);
        assert_eq!(transition(state, InputKind::Enter), Action::Submit);
        assert_eq!(transition(state, InputKind::Escape), Action::Sleep);
        assert_eq!(transition(state, InputKind::PointerMotion), Action::Wake);
        assert_eq!(transition(state, InputKind::Unrelated), Action::Ignore);
    }

    #[rstest]
    #[case(Idle, Action::Ignore)]
    #[case(Composing, Action::Ignore)]
    #[case(Authenticating, Action::Ignore)]
    #[case(Failed, Action::Wake)]
    #[case(SleepArmed, Action::Wake)]
    fn test_other_key(#[case] state: LockState, #[case] expected: Action) {
        assert_eq!(transition(state, InputKind::OtherKey), expected);
    }

    #[rstest]
    #[case(InputEvent::Key(Key::Char(b'a')), InputKind::Printable)]
    #[case(InputEvent::Key(Key::Char(b' ')), InputKind::Printable)]
    #[case(InputEvent::Key(Key::Char(b'~')), InputKind::Printable)]
    #[case(InputEvent::Key(Key::Char(0x7f)), InputKind::OtherKey)]
    #[case(InputEvent::Key(Key::Char(b'\t')), InputKind::OtherKey)]
    #[case(InputEvent::Key(Key::Other), InputKind::OtherKey)]
    #[case(InputEvent::Key(Key::Backspace), InputKind::Backspace)]
    #[case(InputEvent::Key(Key::Enter), InputKind::Enter)]
    #[case(InputEvent::Key(Key::Escape), InputKind::Escape)]
    #[case(InputEvent::PointerMotion, InputKind::PointerMotion)]
    #[case(InputEvent::Other, InputKind::Unrelated)]
    fn test_input_classification(#[case] event: InputEvent, #[case] expected: InputKind) {
        assert_eq!(InputKind::of(&event), expected);
    }

    #[test]
    fn test_typing_and_erasing() {
        let mut display = ScriptedDisplay::new();
        let mut lock = lock_loop(true);

        feed(&mut lock, &mut display, &chars("ab"));
        assert_eq!(lock.state(), Composing);
        assert_eq!(lock.credential().as_bytes(), b"ab");

        let backspace = InputEvent::Key(Key::Backspace);
        feed(&mut lock, &mut display, &[backspace]);
        assert_eq!(lock.state(), Composing);
        feed(&mut lock, &mut display, &[backspace, backspace]);
        assert_eq!(lock.state(), Idle);
        assert!(lock.credential().is_empty());
    }

    #[test]
    fn test_full_buffer_drops_keys() {
        let mut display = ScriptedDisplay::new();
        let mut lock = lock_loop(true);

        feed(&mut lock, &mut display, &chars(&"x".repeat(300)));
        assert_eq!(lock.credential().len(), crate::CREDENTIAL_CAPACITY - 1);
        assert_eq!(lock.state(), Composing);
    }

    #[test]
    fn test_rejection_shows_banner() {
        let mut display = ScriptedDisplay::new();
        let mut lock = lock_loop(true);
        let mut auth = AuthSession::new(ScriptedProvider::accepting("secret"));

        for event in chars("wrong") {
            lock.handle(event, &mut display, &mut auth);
        }
        assert_eq!(lock.handle(InputEvent::Key(Key::Enter), &mut display, &mut auth), None);
        assert_eq!(lock.state(), Failed);
        assert!(lock.credential().is_empty());
        assert_eq!(lock.frame().indicator, Indicator::AuthFailed);

        // Any key leaves the failed state
        lock.handle(InputEvent::Key(Key::Other), &mut display, &mut auth);
        assert_eq!(lock.state(), Idle);
        assert_eq!(lock.frame().indicator, Indicator::Masked(""));
    }

    #[test]
    fn test_escape_turns_display_off_once() {
        let mut display = ScriptedDisplay::new();
        let mut lock = lock_loop(true);

        feed(&mut lock, &mut display, &chars("abc"));
        feed(&mut lock, &mut display, &[InputEvent::Key(Key::Escape)]);

        assert_eq!(lock.state(), SleepArmed);
        assert!(lock.credential().is_empty());
        assert_eq!(display.power().force_off_calls, 1);

        feed(&mut lock, &mut display, &[InputEvent::PointerMotion]);
        assert_eq!(lock.state(), Idle);
        assert_eq!(display.power().force_off_calls, 1);
    }

    #[test]
    fn test_escape_without_power_management() {
        let mut display = ScriptedDisplay::new();
        let mut lock = lock_loop(false);

        feed(&mut lock, &mut display, &chars("abc"));
        feed(&mut lock, &mut display, &[InputEvent::Key(Key::Escape)]);

        assert_eq!(lock.state(), SleepArmed);
        assert_eq!(display.power().force_off_calls, 0);
    }

    #[test]
    fn test_run_redraws_once_per_batch() {
        let mut display = ScriptedDisplay::new();
        display
            .push_batch(chars("sec"))
            .push_batch(chars("ret"))
            .press(Key::Enter);
        let exclusive = GrabController::default()
            .acquire_exclusive(&mut display)
            .unwrap();

        let mut lock = lock_loop(true);
        let mut auth = AuthSession::new(ScriptedProvider::accepting("secret"));
        let outcome = lock.run(&mut display, &mut auth, &exclusive).unwrap();

        assert_eq!(outcome, SessionOutcome::Authenticated);
        // Initial frame plus one per drained batch before Enter
        let frames = display.frames();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].indicator, RenderedIndicator::Masked(String::new()));
        assert_eq!(frames[1].indicator, RenderedIndicator::Masked("***".into()));
        assert_eq!(frames[2].indicator, RenderedIndicator::Masked("******".into()));
        assert!(frames.iter().all(|f| f.username == "alice"));
        assert!(lock.credential().is_empty());
    }

    #[test]
    fn test_run_keeps_going_after_failure() {
        let mut display = ScriptedDisplay::new();
        display.type_text("nope").press(Key::Enter);
        display.type_text("secret").press(Key::Enter);
        let exclusive = GrabController::default()
            .acquire_exclusive(&mut display)
            .unwrap();

        let mut lock = lock_loop(true);
        let mut auth = AuthSession::new(ScriptedProvider::accepting("secret"));
        let outcome = lock.run(&mut display, &mut auth, &exclusive).unwrap();

        assert_eq!(outcome, SessionOutcome::Authenticated);
        assert_eq!(auth.attempts(), 2);
        assert!(display
            .frames()
            .iter()
            .any(|f| f.indicator == RenderedIndicator::AuthFailed));
        assert_eq!(AUTH_FAILED_BANNER, "authentication failed");
    }

    #[test]
    fn test_run_propagates_display_errors() {
        let mut display = ScriptedDisplay::new();
        display.type_text("abc");
        let exclusive = GrabController::default()
            .acquire_exclusive(&mut display)
            .unwrap();

        let mut lock = lock_loop(true);
        let mut auth = AuthSession::new(ScriptedProvider::accepting("secret"));
        assert!(lock.run(&mut display, &mut auth, &exclusive).is_err());
    }
}
