//! Termination-signal handling
//!
//! SIGINT, SIGHUP and SIGTERM end the process. Before dying, the handler
//! writes the captured power settings back through a pre-built
//! [`EmergencyRestore`], guarded by the same [`RestoreLatch`] as the normal
//! teardown path so the restore happens at most once.
//!
//! Everything reachable from the handler is async-signal-safe: an atomic load
//! of the armed state, the latch swap, the restore itself (raw `write(2)`
//! calls), the diagnostic and `_exit`. Nothing allocates and no lock is taken.

use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use tracing::debug;

use crate::error::{LockError, Result};
use crate::power::RestoreLatch;
use crate::session::SessionOutcome;
use crate::PROGNAME;

/// Signals that terminate the lock session
pub const TERMINATION_SIGNALS: [libc::c_int; 3] = [libc::SIGINT, libc::SIGHUP, libc::SIGTERM];

/// Restore operation that can run inside a signal handler.
///
/// Implementations must not allocate, lock or call anything that is not
/// async-signal-safe.
pub trait EmergencyRestore: Send + Sync {
    /// Writes the saved power settings back immediately
    fn restore_now(&self);
}

/// Hands the emergency restore to the signal path once the snapshot exists
pub trait ArmSignals {
    /// Arms the handlers with the latch and restore; only once per process
    fn arm(&self, latch: Arc<RestoreLatch>, restore: Box<dyn EmergencyRestore>) -> Result<()>;
}

struct Armed {
    latch: Arc<RestoreLatch>,
    restore: Box<dyn EmergencyRestore>,
}

static INSTALLED: AtomicBool = AtomicBool::new(false);
static ARMED: OnceLock<Armed> = OnceLock::new();

/// Installed termination handlers
#[derive(Debug)]
pub struct SignalGuard {
    handled: Vec<libc::c_int>,
}

impl SignalGuard {
    /// Installs the handlers. Signals ignored at startup stay ignored.
    /// Only one guard can exist per process.
    pub fn install() -> Result<Self> {
        if INSTALLED.swap(true, Ordering::SeqCst) {
            return Err(LockError::SignalsAlreadySet("installed"));
        }

        let mut handled = Vec::with_capacity(TERMINATION_SIGNALS.len());
        for signal in TERMINATION_SIGNALS {
            if install_one(signal)? {
                handled.push(signal);
            } else {
                debug!(signal, "signal ignored at startup, leaving it ignored");
            }
        }

        debug!(?handled, "termination handlers installed");
        Ok(Self { handled })
    }

    /// Signals that got a handler
    pub fn handled(&self) -> &[libc::c_int] {
        &self.handled
    }
}

impl ArmSignals for SignalGuard {
    fn arm(&self, latch: Arc<RestoreLatch>, restore: Box<dyn EmergencyRestore>) -> Result<()> {
        ARMED
            .set(Armed { latch, restore })
            .map_err(|_| LockError::SignalsAlreadySet("armed"))?;
        debug!("emergency restore armed");
        Ok(())
    }
}

/// Installs the handler for `signal` unless it is ignored.
/// Returns whether a handler was installed.
fn install_one(signal: libc::c_int) -> Result<bool> {
    // SAFETY: sigaction structs are plain data, zero is a valid initial state;
    // the handler only performs async-signal-safe work.
    unsafe {
        let mut previous: libc::sigaction = std::mem::zeroed();
        if libc::sigaction(signal, ptr::null(), &mut previous) != 0 {
            return Err(LockError::SignalSetup(std::io::Error::last_os_error()));
        }
        if previous.sa_sigaction == libc::SIG_IGN {
            return Ok(false);
        }

        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = handle_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
        libc::sigemptyset(&mut action.sa_mask);
        for blocked in TERMINATION_SIGNALS {
            libc::sigaddset(&mut action.sa_mask, blocked);
        }
        action.sa_flags = 0;

        if libc::sigaction(signal, &action, ptr::null_mut()) != 0 {
            return Err(LockError::SignalSetup(std::io::Error::last_os_error()));
        }
    }
    Ok(true)
}

/// Consumes the latch and runs the armed restore.
/// Returns `true` when this call performed the restore.
fn run_emergency_restore() -> bool {
    match ARMED.get() {
        Some(armed) if armed.latch.consume() => {
            armed.restore.restore_now();
            true
        }
        _ => false,
    }
}

const DIAGNOSTIC_LEN: usize = 64;

/// Formats `sxlock: Caught signal N; dying\n` into `buf` without allocating
fn format_diagnostic(signal: libc::c_int, buf: &mut [u8; DIAGNOSTIC_LEN]) -> usize {
    fn push(buf: &mut [u8; DIAGNOSTIC_LEN], at: &mut usize, bytes: &[u8]) {
        for &b in bytes {
            if *at < buf.len() {
                buf[*at] = b;
                *at += 1;
            }
        }
    }

    let mut at = 0;
    push(buf, &mut at, PROGNAME.as_bytes());
    push(buf, &mut at, b": Caught signal ");

    let mut digits = [0u8; 10];
    let mut n = signal.unsigned_abs();
    let mut count = 0;
    loop {
        digits[count] = b'0' + (n % 10) as u8;
        count += 1;
        n /= 10;
        if n == 0 || count == digits.len() {
            break;
        }
    }
    if signal < 0 {
        push(buf, &mut at, b"-");
    }
    for i in (0..count).rev() {
        push(buf, &mut at, &digits[i..=i]);
    }

    push(buf, &mut at, b"; dying\n");
    at
}

extern "C" fn handle_signal(signal: libc::c_int) {
    run_emergency_restore();

    let mut buf = [0u8; DIAGNOSTIC_LEN];
    let len = format_diagnostic(signal, &mut buf);
    // SAFETY: write(2) and _exit(2) are async-signal-safe; buf outlives the call.
    unsafe {
        libc::write(libc::STDERR_FILENO, buf.as_ptr().cast(), len);
        libc::_exit(SessionOutcome::TerminatedBySignal.exit_code());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CountingRestore;

    fn diagnostic(signal: libc::c_int) -> String {
        let mut buf = [0u8; DIAGNOSTIC_LEN];
        let len = format_diagnostic(signal, &mut buf);
        String::from_utf8(buf[..len].to_vec()).unwrap()
    }

    #[test]
    fn test_diagnostic_text() {
        assert_eq!(diagnostic(libc::SIGTERM), "sxlock: Caught signal 15; dying\n");
        assert_eq!(diagnostic(libc::SIGINT), "sxlock: Caught signal 2; dying\n");
        assert_eq!(diagnostic(0), "sxlock: Caught signal 0; dying\n");
        assert_eq!(diagnostic(123), "sxlock: Caught signal 123; dying\n");
    }

    // Installation and arming are process-global, so the whole lifecycle is
    // exercised in a single test.
    #[test]
    fn test_install_arm_and_restore_once() {
        let guard = SignalGuard::install().unwrap();
        assert!(guard.handled().len() <= TERMINATION_SIGNALS.len());
        assert!(matches!(
            SignalGuard::install(),
            Err(LockError::SignalsAlreadySet("installed"))
        ));

        let restore = CountingRestore::default();
        let latch = RestoreLatch::new();
        guard
            .arm(Arc::clone(&latch), Box::new(restore.clone()))
            .unwrap();
        assert!(matches!(
            guard.arm(RestoreLatch::new(), Box::new(CountingRestore::default())),
            Err(LockError::SignalsAlreadySet("armed"))
        ));

        assert!(run_emergency_restore());
        assert!(!run_emergency_restore());
        assert_eq!(restore.fired(), 1);
        assert!(latch.is_consumed());
    }
}
