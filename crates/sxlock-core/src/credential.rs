//! Pinned, fixed-capacity storage for the typed credential
//!
//! The buffer lives on the heap at a stable address that is locked into RAM
//! with `mlock` for the whole lifetime of the value, so the secret is never
//! written to swap. It is overwritten with random data before the lock is
//! released.

use std::ffi::CStr;
use std::fmt;
use std::sync::atomic::{compiler_fence, Ordering};

use rand::RngCore;
use thiserror::Error;
use zeroize::Zeroize;

use crate::error::{LockError, Result};

/// Capacity of the credential region in bytes (one byte is reserved for the terminator)
pub const CREDENTIAL_CAPACITY: usize = 256;

/// Returned by [`CredentialBuffer::append`] when no room is left
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("credential buffer is full")]
pub struct BufferFull;

/// Memory-locked buffer holding the in-progress secret
pub struct CredentialBuffer {
    bytes: Box<[u8; CREDENTIAL_CAPACITY]>,
    len: usize,
}

impl CredentialBuffer {
    /// Allocates the buffer and pins it into physical memory.
    ///
    /// Fails with [`LockError::MemoryLock`] when the page cannot be locked,
    /// typically because `RLIMIT_MEMLOCK` is exhausted.
    pub fn new() -> Result<Self> {
        let bytes = Box::new([0u8; CREDENTIAL_CAPACITY]);

        let rc = unsafe { libc::mlock(bytes.as_ptr().cast(), CREDENTIAL_CAPACITY) };
        if rc != 0 {
            return Err(LockError::MemoryLock(std::io::Error::last_os_error()));
        }

        Ok(Self { bytes, len: 0 })
    }

    /// Appends one byte; the last slot is kept free for the terminator
    pub fn append(&mut self, byte: u8) -> std::result::Result<(), BufferFull> {
        if self.len + 1 >= CREDENTIAL_CAPACITY {
            return Err(BufferFull);
        }
        self.bytes[self.len] = byte;
        self.len += 1;
        Ok(())
    }

    /// Removes the last byte, no-op when empty
    pub fn backspace(&mut self) {
        if self.len > 0 {
            self.len -= 1;
        }
    }

    /// Number of buffered bytes
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total capacity including the terminator slot
    pub fn capacity(&self) -> usize {
        CREDENTIAL_CAPACITY
    }

    /// Borrowed view of the current content, valid until the next mutation
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// NUL-terminated view of the current content, as handed to the provider
    pub fn as_response(&mut self) -> &CStr {
        self.bytes[self.len] = 0;
        CStr::from_bytes_until_nul(&self.bytes[..=self.len]).unwrap_or_default()
    }

    /// Zeroes the used prefix and resets the length
    pub fn clear(&mut self) {
        self.bytes[..=self.len.min(CREDENTIAL_CAPACITY - 1)].zeroize();
        self.len = 0;
    }

    /// Overwrites the whole region, unused capacity included, with random data
    /// and resets the length. Calling it again is harmless.
    pub fn wipe(&mut self) {
        rand::thread_rng().fill_bytes(&mut self.bytes[..]);
        compiler_fence(Ordering::SeqCst);
        self.len = 0;
    }

    /// The whole backing region, unused capacity included
    #[cfg(test)]
    pub(crate) fn region(&self) -> &[u8] {
        &self.bytes[..]
    }
}

impl Drop for CredentialBuffer {
    fn drop(&mut self) {
        self.wipe();
        unsafe {
            libc::munlock(self.bytes.as_ptr().cast(), CREDENTIAL_CAPACITY);
        }
    }
}

impl fmt::Debug for CredentialBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialBuffer")
            .field("capacity", &CREDENTIAL_CAPACITY)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(text: &[u8]) -> CredentialBuffer {
        let mut buffer = CredentialBuffer::new().unwrap();
        for &b in text {
            buffer.append(b).unwrap();
        }
        buffer
    }

    #[test]
    fn test_append_and_view() {
        let buffer = filled(b"secret");
        assert_eq!(buffer.len(), 6);
        assert_eq!(buffer.as_bytes(), b"secret");
        assert_eq!(buffer.capacity(), CREDENTIAL_CAPACITY);
    }

    #[test]
    fn test_full_buffer_rejects_input() {
        let mut buffer = CredentialBuffer::new().unwrap();
        for _ in 0..CREDENTIAL_CAPACITY - 1 {
            buffer.append(b'x').unwrap();
        }
        assert_eq!(buffer.append(b'y'), Err(BufferFull));
        assert_eq!(buffer.len(), CREDENTIAL_CAPACITY - 1);
        assert_eq!(buffer.as_response().to_bytes().len(), CREDENTIAL_CAPACITY - 1);
    }

    #[test]
    fn test_backspace_on_empty() {
        let mut buffer = CredentialBuffer::new().unwrap();
        buffer.backspace();
        assert_eq!(buffer.len(), 0);

        buffer.append(b'a').unwrap();
        buffer.backspace();
        buffer.backspace();
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_response_is_terminated() {
        let mut buffer = filled(b"hunter2");
        buffer.backspace();
        assert_eq!(buffer.as_response().to_bytes(), b"hunter");
    }

    #[test]
    fn test_clear_zeroes_prefix() {
        let mut buffer = filled(b"wrong");
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(&buffer.bytes[..5], &[0u8; 5]);
    }

    #[test]
    fn test_wipe_overwrites_credential() {
        let mut buffer = filled(b"correct horse battery staple");
        let before = buffer.bytes[..28].to_vec();

        buffer.wipe();
        assert_eq!(buffer.len(), 0);
        assert_ne!(&buffer.bytes[..28], before.as_slice());

        buffer.wipe();
        assert_eq!(buffer.len(), 0);
    }

    #[test]
    fn test_debug_redacts_content() {
        let buffer = filled(b"secret");
        let rendered = format!("{:?}", buffer);
        assert!(!rendered.contains("secret"));
    }
}
