//! Scripted collaborators for tests and fuzzing
//!
//! [`ScriptedDisplay`] replays batches of input events and records every
//! request the session makes; [`ScriptedProvider`] accepts exactly one
//! credential through a configurable prompt sequence.

use std::collections::VecDeque;
use std::ffi::CString;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::auth::{AuthProvider, Conversation, PromptStyle};
use crate::display::{
    EventSource, Frame, GrabTarget, Indicator, InputEvent, Key, LockDisplay, Renderer,
};
use crate::error::{LockError, Result};
use crate::grab::ResourceKind;
use crate::power::{PowerControl, PowerSnapshot, PowerTimings, RestoreLatch};
use crate::signal::{ArmSignals, EmergencyRestore};

/// Error raised when the script runs out of events
#[derive(Debug, thiserror::Error)]
#[error("input script exhausted")]
pub struct ScriptExhausted;

/// Error raised when power management may not be enabled
#[derive(Debug, thiserror::Error)]
#[error("power management request refused")]
pub struct PowerRefused;

/// Owned copy of a redraw request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedIndicator {
    Masked(String),
    AuthFailed,
}

/// Owned copy of a [`Frame`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFrame {
    pub username: String,
    pub indicator: RenderedIndicator,
}

/// Simulated power-management state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowerModel {
    pub capable: bool,
    pub timings: PowerTimings,
    pub enabled: bool,
    pub level: u16,
    pub timing_writes: usize,
    pub disable_calls: usize,
    pub force_off_calls: usize,
}

impl Default for PowerModel {
    fn default() -> Self {
        Self {
            capable: true,
            timings: PowerTimings::uniform(600),
            enabled: true,
            level: 0,
            timing_writes: 0,
            disable_calls: 0,
            force_off_calls: 0,
        }
    }
}

/// Power level reported after a forced off
pub const LEVEL_OFF: u16 = 3;

/// Display collaborator that replays scripted input
#[derive(Debug, Default)]
pub struct ScriptedDisplay {
    batches: VecDeque<VecDeque<InputEvent>>,
    frames: Vec<RenderedFrame>,
    power: PowerModel,
    pointer_busy_for: u32,
    keyboard_busy_for: u32,
    grab_attempts: Vec<ResourceKind>,
    emergency_restores: Arc<AtomicUsize>,
    signal_on_exhaustion: Option<Arc<RecordingArm>>,
    refuse_enable: bool,
    released: bool,
}

impl ScriptedDisplay {
    /// Empty script, free devices, power management enabled
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues one batch of events that arrive together
    pub fn push_batch(&mut self, events: impl IntoIterator<Item = InputEvent>) -> &mut Self {
        self.batches.push_back(events.into_iter().collect());
        self
    }

    /// Queues each byte of `text` as a separate key press batch
    pub fn type_text(&mut self, text: &str) -> &mut Self {
        for b in text.bytes() {
            self.push_batch([InputEvent::Key(Key::Char(b))]);
        }
        self
    }

    /// Queues a single key press batch
    pub fn press(&mut self, key: Key) -> &mut Self {
        self.push_batch([InputEvent::Key(key)])
    }

    /// Sets the initial power state
    pub fn set_power(&mut self, timings: PowerTimings, enabled: bool, level: u16) {
        self.power.timings = timings;
        self.power.enabled = enabled;
        self.power.level = level;
    }

    /// Marks the server as lacking power management
    pub fn set_power_capable(&mut self, capable: bool) {
        self.power.capable = capable;
    }

    /// Makes every request to enable power management fail
    pub fn refuse_power_enable(&mut self) {
        self.refuse_enable = true;
    }

    /// Keeps a device grabbed by another client for `attempts` tries
    pub fn hold_device(&mut self, kind: ResourceKind, attempts: u32) {
        match kind {
            ResourceKind::Pointer => self.pointer_busy_for = attempts,
            ResourceKind::Keyboard => self.keyboard_busy_for = attempts,
        }
    }

    /// Simulates a termination signal arriving when the script runs dry
    pub fn signal_when_exhausted(&mut self, arm: Arc<RecordingArm>) {
        self.signal_on_exhaustion = Some(arm);
    }

    /// Redraw requests received so far
    pub fn frames(&self) -> &[RenderedFrame] {
        &self.frames
    }

    /// Power-management state
    pub fn power(&self) -> &PowerModel {
        &self.power
    }

    /// Every grab attempt in order
    pub fn grab_attempts(&self) -> &[ResourceKind] {
        &self.grab_attempts
    }

    /// Number of emergency restores fired
    pub fn emergency_restores(&self) -> usize {
        self.emergency_restores.load(Ordering::SeqCst)
    }

    /// Whether teardown ran
    pub fn released(&self) -> bool {
        self.released
    }

    /// Events still queued
    pub fn remaining_events(&self) -> usize {
        self.batches.iter().map(VecDeque::len).sum()
    }
}

impl EventSource for ScriptedDisplay {
    fn next_event(&mut self) -> Result<InputEvent> {
        while let Some(batch) = self.batches.front_mut() {
            if let Some(event) = batch.pop_front() {
                return Ok(event);
            }
            self.batches.pop_front();
        }
        if let Some(arm) = &self.signal_on_exhaustion {
            arm.fire();
        }
        Err(LockError::display(ScriptExhausted))
    }

    fn has_pending(&mut self) -> Result<bool> {
        Ok(self.batches.front().is_some_and(|batch| !batch.is_empty()))
    }
}

impl Renderer for ScriptedDisplay {
    fn render(&mut self, frame: &Frame<'_>) -> Result<()> {
        let indicator = match frame.indicator {
            Indicator::Masked(mask) => RenderedIndicator::Masked(mask.to_string()),
            Indicator::AuthFailed => RenderedIndicator::AuthFailed,
        };
        self.frames.push(RenderedFrame {
            username: frame.username.to_string(),
            indicator,
        });
        Ok(())
    }
}

impl GrabTarget for ScriptedDisplay {
    fn try_grab(&mut self, kind: ResourceKind) -> Result<bool> {
        self.grab_attempts.push(kind);
        let busy = match kind {
            ResourceKind::Pointer => &mut self.pointer_busy_for,
            ResourceKind::Keyboard => &mut self.keyboard_busy_for,
        };
        if *busy == 0 {
            return Ok(true);
        }
        *busy -= 1;
        Ok(false)
    }
}

impl PowerControl for ScriptedDisplay {
    fn power_capable(&mut self) -> Result<bool> {
        Ok(self.power.capable)
    }

    fn power_timings(&mut self) -> Result<PowerTimings> {
        Ok(self.power.timings)
    }

    fn power_state(&mut self) -> Result<(u16, bool)> {
        Ok((self.power.level, self.power.enabled))
    }

    fn set_power_timings(&mut self, timings: PowerTimings) -> Result<()> {
        self.power.timings = timings;
        self.power.timing_writes += 1;
        Ok(())
    }

    fn set_power_enabled(&mut self, enabled: bool) -> Result<()> {
        if enabled && self.refuse_enable {
            return Err(LockError::display(PowerRefused));
        }
        if !enabled {
            self.power.disable_calls += 1;
        }
        self.power.enabled = enabled;
        Ok(())
    }

    fn force_power_off(&mut self) -> Result<()> {
        self.power.force_off_calls += 1;
        self.power.level = LEVEL_OFF;
        Ok(())
    }
}

/// Emergency restore that only counts invocations
#[derive(Debug, Clone, Default)]
pub struct CountingRestore {
    fired: Arc<AtomicUsize>,
}

impl CountingRestore {
    /// Number of times the restore ran
    pub fn fired(&self) -> usize {
        self.fired.load(Ordering::SeqCst)
    }
}

impl EmergencyRestore for CountingRestore {
    fn restore_now(&self) {
        self.fired.fetch_add(1, Ordering::SeqCst);
    }
}

impl LockDisplay for ScriptedDisplay {
    fn emergency_restore(&mut self, _snapshot: &PowerSnapshot) -> Result<Box<dyn EmergencyRestore>> {
        Ok(Box::new(CountingRestore {
            fired: Arc::clone(&self.emergency_restores),
        }))
    }

    fn release(&mut self) -> Result<()> {
        self.released = true;
        Ok(())
    }
}

/// Signal arming that keeps the latch and restore for inspection
#[derive(Default)]
pub struct RecordingArm {
    armed: std::sync::Mutex<Option<(Arc<RestoreLatch>, Box<dyn EmergencyRestore>)>>,
}

impl RecordingArm {
    /// Creates an unarmed recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the session armed the signal path
    pub fn is_armed(&self) -> bool {
        self.armed.lock().map(|armed| armed.is_some()).unwrap_or(false)
    }

    /// Simulates a signal: consumes the latch and fires the restore if it was first
    pub fn fire(&self) -> bool {
        let Ok(armed) = self.armed.lock() else {
            return false;
        };
        match armed.as_ref() {
            Some((latch, restore)) if latch.consume() => {
                restore.restore_now();
                true
            }
            _ => false,
        }
    }
}

impl std::fmt::Debug for RecordingArm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingArm")
            .field("armed", &self.is_armed())
            .finish()
    }
}

impl ArmSignals for RecordingArm {
    fn arm(&self, latch: Arc<RestoreLatch>, restore: Box<dyn EmergencyRestore>) -> Result<()> {
        if let Ok(mut armed) = self.armed.lock() {
            *armed = Some((latch, restore));
        }
        Ok(())
    }
}

/// Authentication provider accepting a single credential
#[derive(Debug)]
pub struct ScriptedProvider {
    expected: Vec<u8>,
    prompts: Vec<(PromptStyle, CString)>,
    responses: Vec<Option<Vec<u8>>>,
    calls: usize,
    fail: bool,
}

impl ScriptedProvider {
    /// Accepts `expected` after a single silent password prompt
    pub fn accepting(expected: &str) -> Self {
        Self {
            expected: expected.as_bytes().to_vec(),
            prompts: vec![(PromptStyle::EchoOff, c"Password: ".to_owned())],
            responses: Vec::new(),
            calls: 0,
            fail: false,
        }
    }

    /// Replaces the prompt sequence
    pub fn with_prompts(mut self, prompts: &[(PromptStyle, &str)]) -> Self {
        self.prompts = prompts
            .iter()
            .filter_map(|(style, text)| CString::new(*text).ok().map(|text| (*style, text)))
            .collect();
        self
    }

    /// Makes every attempt fail with a provider error
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Responses given to each prompt, in order, across all attempts
    pub fn responses(&self) -> &[Option<Vec<u8>>] {
        &self.responses
    }

    /// Number of authentication attempts
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl AuthProvider for ScriptedProvider {
    fn authenticate(&mut self, conversation: &mut dyn Conversation) -> Result<bool> {
        self.calls += 1;
        if self.fail {
            return Err(LockError::auth_provider(std::fmt::Error));
        }

        let mut accepted = false;
        for (style, text) in &self.prompts {
            let response = conversation
                .respond(*style, text)
                .map(|answer| answer.to_bytes().to_vec());
            if style.expects_response() {
                accepted |= response.as_deref() == Some(self.expected.as_slice());
            }
            self.responses.push(response);
        }
        Ok(accepted)
    }
}
