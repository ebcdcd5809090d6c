//! Scenario tests for complete lock sessions
//!
//! Each test scripts the display and the authentication provider, runs a
//! session from grab to teardown and checks what the user and the display
//! server would have observed.

use std::io::Write;
use std::sync::Arc;

use sxlock_core::{
    testing::{RecordingArm, RenderedIndicator, ScriptedDisplay, ScriptedProvider, LEVEL_OFF},
    CredentialBuffer, ErrorClass, InputEvent, Key, LockConfig, LockLoop, LockState, PasswordMask,
    PowerTimings, ResourceKind, Session, SessionOutcome,
};

fn config() -> LockConfig {
    LockConfig {
        grab_attempts: 20,
        grab_interval_us: 0,
        ..LockConfig::default()
    }
}

fn session_with(
    display: ScriptedDisplay,
    provider: ScriptedProvider,
    config: &LockConfig,
) -> Session<ScriptedDisplay, ScriptedProvider> {
    let lock = LockLoop::new(
        CredentialBuffer::new().unwrap(),
        PasswordMask::new(&config.passchars, config.hide_length),
        config.username.clone().unwrap_or_else(|| "alice".to_string()),
        false,
    );
    Session::new(display, provider, lock, config)
}

/// Correct password: the session ends authenticated with exit status 0
#[test]
fn test_correct_password_unlocks() {
    let original = PowerTimings {
        standby: 300,
        suspend: 600,
        off: 900,
    };
    let mut display = ScriptedDisplay::new();
    display.set_power(original, true, 0);
    display.type_text("secret").press(Key::Enter);

    let arm = RecordingArm::new();
    let mut session = session_with(display, ScriptedProvider::accepting("secret"), &config());
    let outcome = session.run(&arm).unwrap();

    assert_eq!(outcome, SessionOutcome::Authenticated);
    assert_eq!(outcome.exit_code(), 0);

    let display = session.display();
    assert!(display.released());
    assert_eq!(display.power().timings, original);
    assert!(display.power().enabled);
    assert_eq!(display.remaining_events(), 0);
    assert!(session.lock().credential().is_empty());
}

/// Wrong password: banner shown, buffer emptied, the loop keeps running
#[test]
fn test_wrong_password_keeps_locked() {
    let mut display = ScriptedDisplay::new();
    display.type_text("wrong").press(Key::Enter);

    let arm = RecordingArm::new();
    let mut session = session_with(display, ScriptedProvider::accepting("secret"), &config());
    // The script ends after the failed attempt, so the loop stops on the
    // exhausted display instead of unlocking
    let err = session.run(&arm).unwrap_err();
    assert_eq!(err.class(), ErrorClass::FatalSetup);

    assert_eq!(session.lock().state(), LockState::Failed);
    assert!(session.lock().credential().is_empty());
    assert_eq!(session.auth().attempts(), 1);
    assert!(!session.display().released());
    assert_eq!(
        session.display().frames().last().map(|f| &f.indicator),
        Some(&RenderedIndicator::AuthFailed)
    );
}

/// Several failures followed by the right password
#[test]
fn test_unlimited_retries() {
    let mut display = ScriptedDisplay::new();
    for attempt in ["one", "two", "three"] {
        display.type_text(attempt).press(Key::Enter);
    }
    display.type_text("secret").press(Key::Enter);

    let arm = RecordingArm::new();
    let mut session = session_with(display, ScriptedProvider::accepting("secret"), &config());

    assert_eq!(session.run(&arm).unwrap(), SessionOutcome::Authenticated);
    assert_eq!(session.auth().attempts(), 4);
    assert_eq!(session.auth().provider().calls(), 4);
}

/// Escape with a half-typed password: buffer cleared, display forced off once
#[test]
fn test_escape_sleeps_display() {
    let mut display = ScriptedDisplay::new();
    display.type_text("sec").press(Key::Escape);
    display.push_batch([InputEvent::PointerMotion]);
    display.type_text("secret").press(Key::Enter);

    let arm = RecordingArm::new();
    let mut session = session_with(display, ScriptedProvider::accepting("secret"), &config());
    assert_eq!(session.run(&arm).unwrap(), SessionOutcome::Authenticated);

    let display = session.display();
    assert_eq!(display.power().force_off_calls, 1);
    assert_eq!(display.power().level, LEVEL_OFF);

    // Escape cleared the partial entry: the first frame after it is empty
    let frames = display.frames();
    assert!(frames
        .iter()
        .any(|f| f.indicator == RenderedIndicator::Masked(String::new())));
    assert!(frames
        .iter()
        .any(|f| f.indicator == RenderedIndicator::Masked("***".into())));
}

/// Keyboard held by another client for the whole budget: fatal, nothing changed
#[test]
fn test_keyboard_grab_timeout() {
    let mut display = ScriptedDisplay::new();
    display.hold_device(ResourceKind::Keyboard, u32::MAX);
    display.type_text("secret").press(Key::Enter);

    let arm = RecordingArm::new();
    let mut session = session_with(display, ScriptedProvider::accepting("secret"), &config());
    let err = session.run(&arm).unwrap_err();

    assert_eq!(err.class(), ErrorClass::GrabFailure);
    assert_eq!(err.to_string(), "cannot grab keyboard after 20 attempts");

    let display = session.display();
    let keyboard_attempts = display
        .grab_attempts()
        .iter()
        .filter(|k| **k == ResourceKind::Keyboard)
        .count();
    assert_eq!(keyboard_attempts, 20);
    assert!(display.frames().is_empty());
    assert_eq!(display.power().timing_writes, 0);
}

/// A busy pointer that frees up within the budget does not prevent locking
#[test]
fn test_contended_pointer_eventually_grabbed() {
    let mut display = ScriptedDisplay::new();
    display.hold_device(ResourceKind::Pointer, 19);
    display.type_text("secret").press(Key::Enter);

    let arm = RecordingArm::new();
    let mut session = session_with(display, ScriptedProvider::accepting("secret"), &config());
    assert_eq!(session.run(&arm).unwrap(), SessionOutcome::Authenticated);
}

/// Exactly one redraw per drained batch, every event still applied
#[test]
fn test_one_redraw_per_batch() {
    let mut display = ScriptedDisplay::new();
    display.push_batch("secret".bytes().map(|b| InputEvent::Key(Key::Char(b))));
    display.push_batch([
        InputEvent::Key(Key::Backspace),
        InputEvent::Key(Key::Char(b't')),
    ]);
    display.press(Key::Enter);

    let arm = RecordingArm::new();
    let mut session = session_with(display, ScriptedProvider::accepting("secret"), &config());
    assert_eq!(session.run(&arm).unwrap(), SessionOutcome::Authenticated);

    let indicators: Vec<_> = session
        .display()
        .frames()
        .iter()
        .map(|f| f.indicator.clone())
        .collect();
    assert_eq!(
        indicators,
        vec![
            RenderedIndicator::Masked(String::new()),
            RenderedIndicator::Masked("******".into()),
            RenderedIndicator::Masked("******".into()),
        ]
    );
}

/// A signal during the loop restores power once; teardown does not repeat it
#[test]
fn test_signal_during_loop_restores_once() {
    let mut display = ScriptedDisplay::new();
    display.type_text("sec");
    let arm = Arc::new(RecordingArm::new());
    display.signal_when_exhausted(Arc::clone(&arm));

    let mut session = session_with(display, ScriptedProvider::accepting("secret"), &config());
    assert!(session.run(arm.as_ref()).is_err());

    let display = session.display();
    assert_eq!(display.emergency_restores(), 1);
    // Only the session override was written through the normal connection
    assert_eq!(display.power().timing_writes, 1);
    assert!(!display.released());
    assert!(!arm.fire());
}

/// After a normal teardown a late signal finds nothing to restore
#[test]
fn test_late_signal_after_teardown() {
    let mut display = ScriptedDisplay::new();
    display.type_text("secret").press(Key::Enter);

    let arm = RecordingArm::new();
    let mut session = session_with(display, ScriptedProvider::accepting("secret"), &config());
    assert_eq!(session.run(&arm).unwrap(), SessionOutcome::Authenticated);

    assert!(arm.is_armed());
    assert!(!arm.fire());
    assert_eq!(session.display().emergency_restores(), 0);
    assert_eq!(session.display().power().timing_writes, 2);
}

/// Custom obfuscation characters and username from a configuration file
#[test]
fn test_configured_mask_and_username() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "passchars = \"#-\"\nusername = \"Guest\"\ngrab_interval_us = 0").unwrap();
    let config = LockConfig::load(file.path()).unwrap();

    let mut display = ScriptedDisplay::new();
    display.push_batch("abc".bytes().map(|b| InputEvent::Key(Key::Char(b))));
    display.press(Key::Escape);
    display.type_text("secret").press(Key::Enter);

    let arm = RecordingArm::new();
    let mut session = session_with(display, ScriptedProvider::accepting("secret"), &config);
    assert_eq!(session.run(&arm).unwrap(), SessionOutcome::Authenticated);

    let frames = session.display().frames();
    assert!(frames.iter().all(|f| f.username == "Guest"));
    assert_eq!(frames[1].indicator, RenderedIndicator::Masked("#-#".into()));
}

/// Power management disabled by flag: Escape does not touch the display
#[test]
fn test_nodpms_escape() {
    let mut display = ScriptedDisplay::new();
    display.press(Key::Escape).type_text("secret").press(Key::Enter);

    let config = LockConfig {
        use_dpms: false,
        ..config()
    };
    let arm = RecordingArm::new();
    let mut session = session_with(display, ScriptedProvider::accepting("secret"), &config);
    assert_eq!(session.run(&arm).unwrap(), SessionOutcome::Authenticated);

    assert_eq!(session.display().power().force_off_calls, 0);
    assert_eq!(session.display().power().timing_writes, 0);
    assert!(!arm.is_armed());
}
