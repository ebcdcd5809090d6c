//! Display power-management save, override and restore
//!
//! While the screen is locked the display blanks after a short idle period.
//! The original timings are captured once and written back exactly once,
//! either at the end of the session or from the signal handler. Both paths
//! share a [`RestoreLatch`]; whichever consumes it first performs the restore.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{LockError, Result};

/// Default idle timeout applied while locked (seconds)
pub const DEFAULT_SESSION_TIMEOUT: u16 = 10;

/// Standby, suspend and off timeouts in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerTimings {
    pub standby: u16,
    pub suspend: u16,
    pub off: u16,
}

impl PowerTimings {
    /// Same timeout for all three stages
    pub fn uniform(seconds: u16) -> Self {
        Self {
            standby: seconds,
            suspend: seconds,
            off: seconds,
        }
    }
}

/// Power state captured before the session changed anything
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerSnapshot {
    /// Original timeouts
    pub timings: PowerTimings,
    /// Whether power management was enabled
    pub was_enabled: bool,
    /// Power level at capture time
    pub level: u16,
}

/// Power-management capabilities of the display server
pub trait PowerControl {
    /// Whether the server supports power management at all
    fn power_capable(&mut self) -> Result<bool>;

    /// Current timeouts
    fn power_timings(&mut self) -> Result<PowerTimings>;

    /// Current power level and enabled flag
    fn power_state(&mut self) -> Result<(u16, bool)>;

    /// Writes new timeouts
    fn set_power_timings(&mut self, timings: PowerTimings) -> Result<()>;

    /// Enables or disables power management
    fn set_power_enabled(&mut self, enabled: bool) -> Result<()>;

    /// Turns the display off immediately
    fn force_power_off(&mut self) -> Result<()>;
}

/// Consumed-once flag shared by the normal and the signal restore paths
#[derive(Debug, Default)]
pub struct RestoreLatch {
    consumed: AtomicBool,
}

impl RestoreLatch {
    /// Creates an unconsumed latch
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Consumes the latch; returns `true` only for the first caller.
    /// A single atomic swap, safe to call from a signal handler.
    pub fn consume(&self) -> bool {
        !self.consumed.swap(true, Ordering::AcqRel)
    }

    /// Whether the restore already happened
    pub fn is_consumed(&self) -> bool {
        self.consumed.load(Ordering::Acquire)
    }
}

/// Holds the snapshot for the lifetime of the session
#[derive(Debug)]
pub struct PowerStateGuard {
    snapshot: PowerSnapshot,
    latch: Arc<RestoreLatch>,
}

impl PowerStateGuard {
    /// Captures the current power state without changing anything
    pub fn capture(control: &mut dyn PowerControl) -> Result<Self> {
        let timings = control.power_timings()?;
        let (level, was_enabled) = control.power_state()?;
        let snapshot = PowerSnapshot {
            timings,
            was_enabled,
            level,
        };
        debug!(?snapshot, "captured power state");

        Ok(Self {
            snapshot,
            latch: RestoreLatch::new(),
        })
    }

    /// Applies `session_timeout` to all stages and force-enables power
    /// management. If the server rejects part of the override, the snapshot
    /// is written back before the error is returned.
    pub fn apply(self, control: &mut dyn PowerControl, session_timeout: u16) -> Result<Self> {
        let applied = control
            .set_power_timings(PowerTimings::uniform(session_timeout))
            .and_then(|()| control.set_power_enabled(true));

        match applied {
            Ok(()) => {
                info!(session_timeout, "power management overridden for the session");
                Ok(self)
            }
            Err(e) => {
                if let Err(restore_err) = self.restore(control) {
                    warn!(error = %restore_err, "power settings not restored");
                }
                Err(e)
            }
        }
    }

    /// Captures the current power state, then applies the session override
    pub fn init(control: &mut dyn PowerControl, session_timeout: u16) -> Result<Self> {
        Self::capture(control)?.apply(control, session_timeout)
    }

    /// The captured state
    pub fn snapshot(&self) -> &PowerSnapshot {
        &self.snapshot
    }

    /// The latch to hand to the signal path
    pub fn latch(&self) -> Arc<RestoreLatch> {
        Arc::clone(&self.latch)
    }

    /// Writes the captured timings and enabled flag back. The power level is
    /// left alone. Fails with [`LockError::AlreadyRestored`] when the
    /// signal path already did it.
    pub fn restore(self, control: &mut dyn PowerControl) -> Result<()> {
        if !self.latch.consume() {
            return Err(LockError::AlreadyRestored);
        }

        control.set_power_timings(self.snapshot.timings)?;
        control.set_power_enabled(self.snapshot.was_enabled)?;
        info!("power management restored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedDisplay;

    #[test]
    fn test_init_overrides_settings() {
        let mut display = ScriptedDisplay::new();
        display.set_power(PowerTimings::uniform(600), false, 0);

        let guard = PowerStateGuard::init(&mut display, 10).unwrap();

        assert_eq!(guard.snapshot().timings, PowerTimings::uniform(600));
        assert!(!guard.snapshot().was_enabled);
        assert_eq!(display.power().timings, PowerTimings::uniform(10));
        assert!(display.power().enabled);
    }

    #[test]
    fn test_restore_writes_snapshot_back() {
        let mut display = ScriptedDisplay::new();
        let original = PowerTimings {
            standby: 120,
            suspend: 300,
            off: 900,
        };
        display.set_power(original, false, 0);

        let guard = PowerStateGuard::init(&mut display, 10).unwrap();
        display.force_power_off().unwrap();
        display.set_power_timings(PowerTimings::uniform(1)).unwrap();
        guard.restore(&mut display).unwrap();

        assert_eq!(display.power().timings, original);
        assert!(!display.power().enabled);
    }

    #[test]
    fn test_restore_keeps_enabled_feature() {
        let mut display = ScriptedDisplay::new();
        display.set_power(PowerTimings::uniform(300), true, 0);

        let guard = PowerStateGuard::init(&mut display, 10).unwrap();
        guard.restore(&mut display).unwrap();

        assert!(display.power().enabled);
        assert_eq!(display.power().disable_calls, 0);
    }

    #[test]
    fn test_restore_after_signal_path_is_an_error() {
        let mut display = ScriptedDisplay::new();
        let guard = PowerStateGuard::init(&mut display, 10).unwrap();

        // The signal path got there first
        assert!(guard.latch().consume());

        let writes_before = display.power().timing_writes;
        let err = guard.restore(&mut display).unwrap_err();
        assert!(matches!(err, LockError::AlreadyRestored));
        assert_eq!(display.power().timing_writes, writes_before);
    }

    #[test]
    fn test_capture_changes_nothing() {
        let mut display = ScriptedDisplay::new();
        display.set_power(PowerTimings::uniform(600), false, 0);

        let guard = PowerStateGuard::capture(&mut display).unwrap();

        assert_eq!(guard.snapshot().timings, PowerTimings::uniform(600));
        assert_eq!(display.power().timing_writes, 0);
        assert!(!display.power().enabled);
    }

    #[test]
    fn test_partial_override_is_rolled_back() {
        let mut display = ScriptedDisplay::new();
        display.set_power(PowerTimings::uniform(600), false, 0);
        display.refuse_power_enable();

        let guard = PowerStateGuard::capture(&mut display).unwrap();
        let latch = guard.latch();
        assert!(guard.apply(&mut display, 10).is_err());

        assert_eq!(display.power().timings, PowerTimings::uniform(600));
        assert!(!display.power().enabled);
        assert!(latch.is_consumed());
    }

    #[test]
    fn test_latch_single_shot() {
        let latch = RestoreLatch::new();
        assert!(!latch.is_consumed());
        assert!(latch.consume());
        assert!(!latch.consume());
        assert!(latch.is_consumed());
    }
}
