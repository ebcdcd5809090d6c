//! DPMS restore from inside a signal handler
//!
//! Nothing in `x11rb` may be called from a signal handler: requests allocate
//! and take locks. Instead the restore requests are encoded up front and
//! written with a single `write(2)` to a second connection that is reserved
//! for this purpose and never used otherwise.

use std::os::unix::io::{AsRawFd, RawFd};

use sxlock_core::{EmergencyRestore, PowerSnapshot};
use tracing::debug;
use x11rb::connection::{Connection, RequestConnection};
use x11rb::protocol::dpms;
use x11rb::rust_connection::RustConnection;

use crate::error::{Result, X11Error};

const DPMS_SET_TIMEOUTS: u8 = 3;
const DPMS_DISABLE: u8 = 5;

const SET_TIMEOUTS_LEN: usize = 12;
const DISABLE_LEN: usize = 4;
const MAX_PACKET: usize = SET_TIMEOUTS_LEN + DISABLE_LEN;

/// Encodes the requests that write `snapshot` back.
///
/// Byte order is native, matching the order `x11rb` announces when it
/// connects.
pub fn encode_restore(major_opcode: u8, snapshot: &PowerSnapshot) -> ([u8; MAX_PACKET], usize) {
    let mut packet = [0u8; MAX_PACKET];

    packet[0] = major_opcode;
    packet[1] = DPMS_SET_TIMEOUTS;
    packet[2..4].copy_from_slice(&((SET_TIMEOUTS_LEN / 4) as u16).to_ne_bytes());
    packet[4..6].copy_from_slice(&snapshot.timings.standby.to_ne_bytes());
    packet[6..8].copy_from_slice(&snapshot.timings.suspend.to_ne_bytes());
    packet[8..10].copy_from_slice(&snapshot.timings.off.to_ne_bytes());
    let mut len = SET_TIMEOUTS_LEN;

    if !snapshot.was_enabled {
        packet[len] = major_opcode;
        packet[len + 1] = DPMS_DISABLE;
        packet[len + 2..len + 4].copy_from_slice(&((DISABLE_LEN / 4) as u16).to_ne_bytes());
        len += DISABLE_LEN;
    }

    (packet, len)
}

/// Pre-encoded DPMS restore on a dedicated connection
pub struct DpmsRescue {
    _conn: RustConnection,
    fd: RawFd,
    packet: [u8; MAX_PACKET],
    len: usize,
}

impl DpmsRescue {
    /// Opens the reserved connection and encodes the restore for `snapshot`
    pub fn connect(snapshot: &PowerSnapshot) -> Result<Self> {
        let (conn, _) = x11rb::connect(None)?;
        let major_opcode = conn
            .extension_information(dpms::X11_EXTENSION_NAME)?
            .ok_or(X11Error::MissingExtension(dpms::X11_EXTENSION_NAME))?
            .major_opcode;
        conn.flush()?;

        let fd = conn.stream().as_raw_fd();
        let (packet, len) = encode_restore(major_opcode, snapshot);
        debug!(fd, "emergency DPMS restore prepared");

        Ok(Self {
            _conn: conn,
            fd,
            packet,
            len,
        })
    }
}

impl EmergencyRestore for DpmsRescue {
    fn restore_now(&self) {
        // SAFETY: write(2) is async-signal-safe; the buffer lives in self and
        // the descriptor stays open as long as the connection is held.
        unsafe {
            libc::write(self.fd, self.packet.as_ptr().cast(), self.len);
        }
    }
}
