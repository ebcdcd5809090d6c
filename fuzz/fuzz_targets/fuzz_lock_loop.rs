#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sxlock_core::testing::{ScriptedDisplay, ScriptedProvider};
use sxlock_core::{
    AuthSession, CredentialBuffer, InputEvent, Key, LockLoop, LockState, PasswordMask,
    SessionOutcome, CREDENTIAL_CAPACITY,
};

#[derive(Debug, Arbitrary)]
enum FuzzEvent {
    Char(u8),
    Backspace,
    Enter,
    Escape,
    OtherKey,
    Motion,
    Other,
}

impl From<&FuzzEvent> for InputEvent {
    fn from(event: &FuzzEvent) -> Self {
        match event {
            FuzzEvent::Char(b) => InputEvent::Key(Key::Char(*b)),
            FuzzEvent::Backspace => InputEvent::Key(Key::Backspace),
            FuzzEvent::Enter => InputEvent::Key(Key::Enter),
            FuzzEvent::Escape => InputEvent::Key(Key::Escape),
            FuzzEvent::OtherKey => InputEvent::Key(Key::Other),
            FuzzEvent::Motion => InputEvent::PointerMotion,
            FuzzEvent::Other => InputEvent::Other,
        }
    }
}

#[derive(Debug, Arbitrary)]
struct Input {
    hide_length: bool,
    power_managed: bool,
    events: Vec<FuzzEvent>,
}

fuzz_target!(|input: Input| {
    let Ok(credential) = CredentialBuffer::new() else {
        return;
    };
    let mut lock = LockLoop::new(
        credential,
        PasswordMask::new("*", input.hide_length),
        "fuzz",
        input.power_managed,
    );
    let mut display = ScriptedDisplay::new();
    let mut auth = AuthSession::new(ScriptedProvider::accepting("fuzz"));
    let mut escapes = 0;

    for event in &input.events {
        if matches!(event, FuzzEvent::Escape) {
            escapes += 1;
        }
        match lock.handle(event.into(), &mut display, &mut auth) {
            Some(outcome) => {
                assert_eq!(outcome, SessionOutcome::Authenticated);
                assert!(lock.credential().is_empty());
                break;
            }
            None => {
                assert!(lock.credential().len() < CREDENTIAL_CAPACITY);
                assert_ne!(lock.state(), LockState::Authenticating);
                if lock.state() == LockState::Idle {
                    assert!(lock.credential().is_empty());
                }
                let _ = lock.frame();
            }
        }
    }

    let expected_off = if input.power_managed { escapes } else { 0 };
    assert!(display.power().force_off_calls <= expected_off);
});
