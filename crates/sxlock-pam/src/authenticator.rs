//! PAM-backed authentication provider

use std::ffi::{c_int, CString};
use std::ptr;

use sxlock_core::{AuthProvider, Conversation, LockError};
use tracing::{debug, info};

use crate::conversation::{converse, ConversationSlot};
use crate::error::{PamError, Result};
use crate::ffi::{
    PamConv, PamHandle, PamLibrary, PAM_AUTH_ERR, PAM_CRED_INSUFFICIENT, PAM_MAXTRIES,
    PAM_SUCCESS, PAM_USER_UNKNOWN,
};

/// Splits a `pam_authenticate` status into a verdict or an infrastructure error
pub fn verdict(status: c_int) -> std::result::Result<bool, c_int> {
    match status {
        PAM_SUCCESS => Ok(true),
        PAM_AUTH_ERR | PAM_CRED_INSUFFICIENT | PAM_USER_UNKNOWN | PAM_MAXTRIES => Ok(false),
        other => Err(other),
    }
}

/// A started PAM transaction for one user
pub struct PamAuthenticator {
    handle: *mut PamHandle,
    last_status: c_int,
    // Referenced by PAM through the conversation's appdata pointer
    slot: Box<ConversationSlot>,
    library: PamLibrary,
}

impl PamAuthenticator {
    /// Loads libpam and starts a transaction for `user` under `service`
    pub fn start(service: &str, user: &str) -> Result<Self> {
        let library = PamLibrary::open()?;
        let service_c = CString::new(service).map_err(|_| PamError::Nul("service"))?;
        let user_c = CString::new(user).map_err(|_| PamError::Nul("user"))?;

        let slot = Box::<ConversationSlot>::default();
        let conv = PamConv {
            conv: Some(converse),
            appdata_ptr: slot.as_appdata(),
        };

        let mut handle: *mut PamHandle = ptr::null_mut();
        // SAFETY: pam_start copies `conv`; the slot it points to is boxed and
        // lives as long as the handle.
        let status =
            unsafe { (library.start)(service_c.as_ptr(), user_c.as_ptr(), &conv, &mut handle) };
        if status != PAM_SUCCESS {
            return Err(PamError::Call {
                call: "pam_start",
                status,
                message: library.describe(handle, status),
            });
        }

        info!(service, "PAM transaction started");
        Ok(Self {
            handle,
            last_status: status,
            slot,
            library,
        })
    }
}

impl AuthProvider for PamAuthenticator {
    fn authenticate(&mut self, conversation: &mut dyn Conversation) -> sxlock_core::Result<bool> {
        let (handle, authenticate) = (self.handle, self.library.authenticate);
        // SAFETY: the handle is live until drop; converse only runs inside this call.
        let status = self
            .slot
            .with_active(conversation, || unsafe { authenticate(handle, 0) });
        self.last_status = status;

        match verdict(status) {
            Ok(accepted) => {
                debug!(status, accepted, "pam_authenticate finished");
                Ok(accepted)
            }
            Err(status) => Err(LockError::auth_provider(PamError::Call {
                call: "pam_authenticate",
                status,
                message: self.library.describe(self.handle, status),
            })),
        }
    }
}

impl Drop for PamAuthenticator {
    fn drop(&mut self) {
        // SAFETY: the handle came from a successful pam_start and is ended once.
        unsafe {
            (self.library.end)(self.handle, self.last_status);
        }
    }
}

impl std::fmt::Debug for PamAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PamAuthenticator")
            .field("last_status", &self.last_status)
            .finish_non_exhaustive()
    }
}
