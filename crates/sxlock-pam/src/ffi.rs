//! Minimal libpam ABI and runtime loading

use std::ffi::{c_char, c_int, c_void, CStr};

use crate::error::{PamError, Result};

pub const PAM_SUCCESS: c_int = 0;
pub const PAM_BUF_ERR: c_int = 5;
pub const PAM_AUTH_ERR: c_int = 7;
pub const PAM_CRED_INSUFFICIENT: c_int = 8;
pub const PAM_USER_UNKNOWN: c_int = 10;
pub const PAM_MAXTRIES: c_int = 11;
pub const PAM_CONV_ERR: c_int = 19;

pub const PAM_PROMPT_ECHO_OFF: c_int = 1;
pub const PAM_PROMPT_ECHO_ON: c_int = 2;
pub const PAM_ERROR_MSG: c_int = 3;
pub const PAM_TEXT_INFO: c_int = 4;

/// Soname loaded at runtime
pub const LIBPAM: &CStr = c"libpam.so.0";

#[repr(C)]
pub struct PamMessage {
    pub msg_style: c_int,
    pub msg: *const c_char,
}

#[repr(C)]
pub struct PamResponse {
    pub resp: *mut c_char,
    pub resp_retcode: c_int,
}

pub type ConvFn = unsafe extern "C" fn(
    num_msg: c_int,
    msg: *mut *const PamMessage,
    resp: *mut *mut PamResponse,
    appdata_ptr: *mut c_void,
) -> c_int;

#[repr(C)]
pub struct PamConv {
    pub conv: Option<ConvFn>,
    pub appdata_ptr: *mut c_void,
}

/// Opaque `pam_handle_t`
#[repr(C)]
pub struct PamHandle {
    _private: [u8; 0],
}

type StartFn = unsafe extern "C" fn(
    service: *const c_char,
    user: *const c_char,
    conv: *const PamConv,
    pamh: *mut *mut PamHandle,
) -> c_int;
type AuthenticateFn = unsafe extern "C" fn(pamh: *mut PamHandle, flags: c_int) -> c_int;
type EndFn = unsafe extern "C" fn(pamh: *mut PamHandle, status: c_int) -> c_int;
type StrerrorFn = unsafe extern "C" fn(pamh: *mut PamHandle, errnum: c_int) -> *const c_char;

/// The resolved libpam entry points
pub struct PamLibrary {
    handle: *mut c_void,
    pub start: StartFn,
    pub authenticate: AuthenticateFn,
    pub end: EndFn,
    strerror: StrerrorFn,
}

impl PamLibrary {
    /// Loads libpam and resolves the entry points
    pub fn open() -> Result<Self> {
        // SAFETY: dlopen/dlsym are called with NUL-terminated names; every
        // symbol is cast to the signature documented in pam_appl.h.
        unsafe {
            let handle = libc::dlopen(LIBPAM.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL);
            if handle.is_null() {
                return Err(PamError::Load {
                    library: "libpam.so.0",
                    reason: last_dl_error(),
                });
            }

            let library = Self {
                handle,
                start: std::mem::transmute::<*mut c_void, StartFn>(symbol(handle, c"pam_start")?),
                authenticate: std::mem::transmute::<*mut c_void, AuthenticateFn>(symbol(
                    handle,
                    c"pam_authenticate",
                )?),
                end: std::mem::transmute::<*mut c_void, EndFn>(symbol(handle, c"pam_end")?),
                strerror: std::mem::transmute::<*mut c_void, StrerrorFn>(symbol(
                    handle,
                    c"pam_strerror",
                )?),
            };
            Ok(library)
        }
    }

    /// Human readable text for a PAM status
    pub fn describe(&self, pamh: *mut PamHandle, status: c_int) -> String {
        // SAFETY: pam_strerror returns a static string or NULL.
        let text = unsafe { (self.strerror)(pamh, status) };
        if text.is_null() {
            return format!("PAM error {status}");
        }
        unsafe { CStr::from_ptr(text) }.to_string_lossy().into_owned()
    }
}

impl Drop for PamLibrary {
    fn drop(&mut self) {
        unsafe {
            libc::dlclose(self.handle);
        }
    }
}

unsafe fn symbol(handle: *mut c_void, name: &'static CStr) -> Result<*mut c_void> {
    let ptr = libc::dlsym(handle, name.as_ptr());
    if ptr.is_null() {
        libc::dlclose(handle);
        return Err(PamError::Symbol(match name.to_str() {
            Ok(name) => name,
            Err(_) => "?",
        }));
    }
    Ok(ptr)
}

unsafe fn last_dl_error() -> String {
    let err = libc::dlerror();
    if err.is_null() {
        return "unknown error".to_string();
    }
    CStr::from_ptr(err).to_string_lossy().into_owned()
}
