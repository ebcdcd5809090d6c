//! One lock session from grab to teardown

use tracing::{info, warn};

use crate::auth::{AuthProvider, AuthSession};
use crate::config::LockConfig;
use crate::display::LockDisplay;
use crate::error::Result;
use crate::grab::GrabController;
use crate::lock_loop::LockLoop;
use crate::power::PowerStateGuard;
use crate::signal::ArmSignals;

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The provider accepted the credential
    Authenticated,
    /// The session ended without an accepted credential
    Rejected,
    /// A termination signal ended the process
    TerminatedBySignal,
}

impl SessionOutcome {
    /// Process exit status for this outcome
    pub const fn exit_code(self) -> i32 {
        match self {
            SessionOutcome::Authenticated => 0,
            SessionOutcome::Rejected | SessionOutcome::TerminatedBySignal => 1,
        }
    }
}

/// The session context: display, provider, lock loop and settings
pub struct Session<D, P> {
    display: D,
    auth: AuthSession<P>,
    lock: LockLoop,
    grabs: GrabController,
    use_dpms: bool,
    dpms_timeout: u16,
}

impl<D: LockDisplay, P: AuthProvider> Session<D, P> {
    pub fn new(display: D, provider: P, lock: LockLoop, config: &LockConfig) -> Self {
        Self {
            display,
            auth: AuthSession::new(provider),
            lock,
            grabs: GrabController::new(config.retry_policy()),
            use_dpms: config.use_dpms,
            dpms_timeout: config.dpms_timeout_secs,
        }
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn auth(&self) -> &AuthSession<P> {
        &self.auth
    }

    pub fn lock(&self) -> &LockLoop {
        &self.lock
    }

    /// Grabs input, overrides power management, runs the lock loop and tears
    /// everything down once a credential is accepted.
    ///
    /// Power settings are written back even when the loop fails, unless the
    /// signal path already did it.
    pub fn run(&mut self, signals: &dyn ArmSignals) -> Result<SessionOutcome> {
        let exclusive = self.grabs.acquire_exclusive(&mut self.display)?;
        info!("pointer and keyboard grabbed");

        let guard = self.guard_power(signals)?;
        self.lock.set_power_managed(guard.is_some());

        let outcome = self.lock.run(&mut self.display, &mut self.auth, &exclusive);

        if let Some(guard) = guard {
            if let Err(e) = guard.restore(&mut self.display) {
                warn!(error = %e, "power settings not restored");
            }
        }

        let outcome = outcome?;
        self.display.release()?;
        info!(?outcome, "session finished");
        Ok(outcome)
    }

    fn guard_power(&mut self, signals: &dyn ArmSignals) -> Result<Option<PowerStateGuard>> {
        if !self.use_dpms {
            return Ok(None);
        }
        if !self.display.power_capable()? {
            warn!("display server has no power management, continuing without it");
            return Ok(None);
        }

        // The signal path must be armed before the server sees any change
        let guard = PowerStateGuard::capture(&mut self.display)?;
        let restore = self.display.emergency_restore(guard.snapshot())?;
        signals.arm(guard.latch(), restore)?;

        guard.apply(&mut self.display, self.dpms_timeout).map(Some)
    }
}
