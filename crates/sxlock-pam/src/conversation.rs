//! The PAM conversation callback
//!
//! PAM calls [`converse`] from inside `pam_authenticate`. The application data
//! pointer refers to a [`ConversationSlot`] that holds the session's
//! [`Conversation`] for exactly the duration of that call.

use std::cell::Cell;
use std::ffi::{c_int, c_void, CStr};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

use sxlock_core::{Conversation, PromptStyle};
use zeroize::Zeroize;

use crate::ffi::{
    PamMessage, PamResponse, PAM_BUF_ERR, PAM_CONV_ERR, PAM_ERROR_MSG, PAM_PROMPT_ECHO_OFF,
    PAM_PROMPT_ECHO_ON, PAM_SUCCESS, PAM_TEXT_INFO,
};

/// Maps a PAM message style
pub fn prompt_style(style: c_int) -> Option<PromptStyle> {
    match style {
        PAM_PROMPT_ECHO_OFF => Some(PromptStyle::EchoOff),
        PAM_PROMPT_ECHO_ON => Some(PromptStyle::EchoOn),
        PAM_ERROR_MSG => Some(PromptStyle::ErrorMsg),
        PAM_TEXT_INFO => Some(PromptStyle::TextInfo),
        _ => None,
    }
}

/// Stable home of the active conversation, passed to PAM as application data
#[derive(Debug, Default)]
pub struct ConversationSlot {
    active: Cell<*mut c_void>,
}

impl ConversationSlot {
    /// Runs `f` with `conversation` reachable from [`converse`]
    pub fn with_active<R>(&self, conversation: &mut dyn Conversation, f: impl FnOnce() -> R) -> R {
        let mut target: &mut dyn Conversation = conversation;
        self.active
            .set(&mut target as *mut &mut dyn Conversation as *mut c_void);
        let result = f();
        self.active.set(ptr::null_mut());
        result
    }

    pub fn as_appdata(&self) -> *mut c_void {
        self as *const Self as *mut c_void
    }
}

/// Zeroes and frees the first `count` responses and the array itself
unsafe fn free_responses(responses: *mut PamResponse, count: usize) {
    for i in 0..count {
        let answer = (*responses.add(i)).resp;
        if !answer.is_null() {
            let len = libc::strlen(answer);
            std::slice::from_raw_parts_mut(answer.cast::<u8>(), len).zeroize();
            libc::free(answer.cast());
        }
    }
    libc::free(responses.cast());
}

/// `pam_conv` callback answering input prompts with the active conversation
///
/// # Safety
///
/// Must only be called by PAM with `appdata` pointing to a live
/// [`ConversationSlot`] and `msg` holding `num_msg` message pointers.
pub unsafe extern "C" fn converse(
    num_msg: c_int,
    msg: *mut *const PamMessage,
    resp: *mut *mut PamResponse,
    appdata: *mut c_void,
) -> c_int {
    if num_msg <= 0 {
        return PAM_BUF_ERR;
    }
    if msg.is_null() || resp.is_null() || appdata.is_null() {
        return PAM_CONV_ERR;
    }

    let slot = &*(appdata as *const ConversationSlot);
    let active = slot.active.get();
    if active.is_null() {
        return PAM_CONV_ERR;
    }
    let conversation = &mut **(active as *mut &mut dyn Conversation);

    let count = num_msg as usize;
    let responses = libc::calloc(count, std::mem::size_of::<PamResponse>()).cast::<PamResponse>();
    if responses.is_null() {
        return PAM_BUF_ERR;
    }

    for i in 0..count {
        let message = *msg.add(i);
        if message.is_null() {
            free_responses(responses, i);
            return PAM_CONV_ERR;
        }
        // Binary and radio prompts get no textual answer
        let Some(style) = prompt_style((*message).msg_style) else {
            continue;
        };
        let text = if (*message).msg.is_null() {
            c""
        } else {
            CStr::from_ptr((*message).msg)
        };

        let answered = panic::catch_unwind(AssertUnwindSafe(|| {
            conversation
                .respond(style, text)
                .map_or(ptr::null_mut(), |answer| libc::strdup(answer.as_ptr()))
        }));
        let answer = match answered {
            Ok(answer) => answer,
            Err(_) => {
                free_responses(responses, i);
                return PAM_CONV_ERR;
            }
        };
        if style.expects_response() && answer.is_null() {
            free_responses(responses, i);
            return PAM_BUF_ERR;
        }
        (*responses.add(i)).resp = answer;
    }

    *resp = responses;
    PAM_SUCCESS
}
