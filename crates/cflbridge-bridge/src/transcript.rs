// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Bounded text report buffer
//!
//! Holds at most `capacity - 1` data bytes followed by a NUL, whether the
//! report is written by a C engine through [`Transcript::as_mut_ptr`] or by a
//! Rust engine through [`Transcript::push_str`].

use std::os::raw::{c_char, c_int};

use crate::{BridgeError, Result};

pub struct Transcript {
    buf: Vec<u8>,
    len: usize,
    truncated: bool,
}

impl Transcript {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(BridgeError::InvalidCapacity);
        }
        Ok(Self {
            buf: vec![0; capacity],
            len: 0,
            truncated: false,
        })
    }

    /// Total buffer size including the terminator
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Capacity as passed to a C engine (saturating)
    pub fn c_capacity(&self) -> c_int {
        c_int::try_from(self.buf.len()).unwrap_or(c_int::MAX)
    }

    pub fn as_mut_ptr(&mut self) -> *mut c_char {
        self.buf.as_mut_ptr() as *mut c_char
    }

    /// Append as much of `text` as fits; returns the number of bytes kept
    pub fn push_str(&mut self, text: &str) -> usize {
        let room = self.capacity() - 1 - self.len;
        let kept = text.len().min(room);
        if kept < text.len() {
            self.truncated = true;
        }
        self.buf[self.len..self.len + kept].copy_from_slice(&text.as_bytes()[..kept]);
        self.len += kept;
        self.buf[self.len] = 0;
        kept
    }

    /// Re-establish the terminator after foreign code wrote into the buffer
    pub fn seal(&mut self) {
        let last = self.capacity() - 1;
        self.len = self.buf[..last].iter().position(|&b| b == 0).unwrap_or(last);
        if self.len == last && self.buf[last] != 0 {
            self.truncated = true;
        }
        self.buf[last] = 0;
    }

    /// Report bytes up to the first NUL
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True when the writer produced more than fits
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn clear(&mut self) {
        self.buf.fill(0);
        self.len = 0;
        self.truncated = false;
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(self.as_bytes()).into_owned()
    }
}

impl std::fmt::Write for Transcript {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        self.push_str(s);
        Ok(())
    }
}

impl std::fmt::Debug for Transcript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transcript")
            .field("capacity", &self.capacity())
            .field("text", &self.to_string_lossy())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Write;

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(Transcript::new(0), Err(BridgeError::InvalidCapacity)));
    }

    #[test]
    fn test_truncates_at_capacity_minus_one() {
        let mut transcript = Transcript::new(16).unwrap();
        let kept = transcript.push_str(&"x".repeat(100));
        assert_eq!(kept, 15);
        assert_eq!(transcript.len(), 15);
        assert!(transcript.is_truncated());
        assert_eq!(transcript.buf[15], 0);
    }

    #[test]
    fn test_capacity_one_holds_only_terminator() {
        let mut transcript = Transcript::new(1).unwrap();
        write!(transcript, "anything").unwrap();
        assert!(transcript.is_empty());
        assert_eq!(transcript.to_string_lossy(), "");
    }

    #[test]
    fn test_seal_after_foreign_write() {
        let mut transcript = Transcript::new(8).unwrap();
        let ptr = transcript.as_mut_ptr();
        unsafe { std::ptr::write_bytes(ptr, b'a', 8) };

        transcript.seal();

        assert_eq!(transcript.as_bytes(), b"aaaaaaa");
        assert!(transcript.is_truncated());
    }

    #[test]
    fn test_seal_stops_at_first_nul() {
        let mut transcript = Transcript::new(8).unwrap();
        let ptr = transcript.as_mut_ptr() as *mut u8;
        unsafe { std::ptr::copy_nonoverlapping(b"ok\0zz".as_ptr(), ptr, 5) };

        transcript.seal();

        assert_eq!(transcript.to_string_lossy(), "ok");
        assert!(!transcript.is_truncated());
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let mut transcript = Transcript::new(8).unwrap();
        let ptr = transcript.as_mut_ptr() as *mut u8;
        unsafe { std::ptr::copy_nonoverlapping([b'a', 0xff, b'b'].as_ptr(), ptr, 3) };
        transcript.seal();
        assert_eq!(transcript.to_string_lossy(), "a\u{fffd}b");
    }
}
