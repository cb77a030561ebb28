//! String marshalling between Rust and the engine's C strings.
//!
//! The Windows driver exports wide-character (`W`) entry points taking
//! UTF-16 `wchar_t` strings; the Linux driver takes UTF-8 `char` strings.
//! [`EcChar`] is the code unit for the current platform.

use std::iter;

use tracing::trace;

use crate::error::EcError;

#[cfg(windows)]
pub type EcChar = u16;
#[cfg(not(windows))]
pub type EcChar = u8;

/// Capacity of the buffer `SelectConverter` writes the chosen name into.
pub const NAME_CAPACITY: usize = 1000;

/// Default capacity of the conversion output buffer, in code units.
pub const DEFAULT_OUTPUT_CAPACITY: usize = 10_000;

/// Number of engine code units `s` occupies, without the terminator.
pub fn code_units(s: &str) -> usize {
    #[cfg(windows)]
    {
        s.encode_utf16().count()
    }
    #[cfg(not(windows))]
    {
        s.len()
    }
}

/// Encode `s` as a NUL-terminated engine string.
///
/// `what` names the argument in the error when `s` has an interior NUL,
/// which the engine would silently cut the string at.
pub fn to_engine(what: &'static str, s: &str) -> Result<Vec<EcChar>, EcError> {
    if let Some(pos) = s.find('\0') {
        return Err(EcError::InvalidText {
            what,
            detail: format!("contains a NUL character at byte {pos}"),
        });
    }
    #[cfg(windows)]
    let units: Vec<EcChar> = s.encode_utf16().chain(iter::once(0)).collect();
    #[cfg(not(windows))]
    let units: Vec<EcChar> = s.bytes().chain(iter::once(0)).collect();
    Ok(units)
}

/// Decode engine code units (no terminator) into a `String`.
pub fn from_engine(units: &[EcChar]) -> String {
    #[cfg(windows)]
    {
        String::from_utf16_lossy(units)
    }
    #[cfg(not(windows))]
    {
        String::from_utf8_lossy(units).into_owned()
    }
}

/// A zeroed buffer the engine writes a bounded, NUL-terminated string into.
///
/// The buffer holds one guard unit beyond `capacity`. The engine is told the
/// full length, so any result that reaches `capacity` units is one that may
/// have been cut short, and [`OutputBuffer::read`] rejects it rather than
/// returning a silently truncated string.
#[derive(Debug)]
pub struct OutputBuffer {
    units: Vec<EcChar>,
    capacity: usize,
}

impl OutputBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            units: vec![0; capacity + 1],
            capacity,
        }
    }

    /// Longest result (in code units, excluding the terminator) accepted.
    pub fn max_len(&self) -> usize {
        self.capacity.saturating_sub(1)
    }

    pub fn as_mut_ptr(&mut self) -> *mut EcChar {
        self.units.as_mut_ptr()
    }

    /// Length to report to the engine.
    pub fn engine_len(&self) -> i32 {
        i32::try_from(self.units.len()).unwrap_or(i32::MAX)
    }

    /// The string the engine wrote, or `OutputTruncated` if it may not fit.
    pub fn read(&self) -> Result<String, EcError> {
        let truncated = EcError::OutputTruncated {
            capacity: self.capacity,
        };
        let Some(end) = self.units.iter().position(|&u| u == 0) else {
            trace!(capacity = self.capacity, "no terminator in output buffer");
            return Err(truncated);
        };
        if end >= self.capacity {
            trace!(end, capacity = self.capacity, "output reached capacity");
            return Err(truncated);
        }
        Ok(from_engine(&self.units[..end]))
    }

    /// Mutable view for in-process engines (tests, embedders).
    pub fn as_mut_slice(&mut self) -> &mut [EcChar] {
        &mut self.units
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(buf: &mut OutputBuffer, s: &str) {
        let encoded = to_engine("test", s).unwrap();
        let slice = buf.as_mut_slice();
        let n = encoded.len().min(slice.len());
        slice[..n].copy_from_slice(&encoded[..n]);
    }

    #[test]
    fn encodes_with_terminator() {
        let units = to_engine("input", "abc").unwrap();
        assert_eq!(units.len(), 4);
        assert_eq!(*units.last().unwrap(), 0);
        assert_eq!(from_engine(&units[..3]), "abc");
    }

    #[test]
    fn rejects_interior_nul() {
        let err = to_engine("input", "a\0b").unwrap_err();
        assert_eq!(err.kind(), "invalid_text");
        assert!(err.to_string().contains("input"));
    }

    #[test]
    fn reads_up_to_terminator() {
        let mut buf = OutputBuffer::new(16);
        fill(&mut buf, "output");
        assert_eq!(buf.read().unwrap(), "output");
    }

    #[test]
    fn empty_output_is_empty_string() {
        let buf = OutputBuffer::new(16);
        assert_eq!(buf.read().unwrap(), "");
    }

    #[test]
    fn result_reaching_capacity_is_truncated() {
        let mut buf = OutputBuffer::new(4);
        fill(&mut buf, "abcd");
        assert_eq!(
            buf.read().unwrap_err(),
            EcError::OutputTruncated { capacity: 4 }
        );

        let mut buf = OutputBuffer::new(4);
        fill(&mut buf, "abc");
        assert_eq!(buf.read().unwrap(), "abc");
    }

    #[test]
    fn missing_terminator_is_truncated() {
        let mut buf = OutputBuffer::new(2);
        for u in buf.as_mut_slice() {
            *u = b'x' as EcChar;
        }
        assert!(matches!(
            buf.read(),
            Err(EcError::OutputTruncated { capacity: 2 })
        ));
    }

    #[test]
    fn engine_len_includes_guard_unit() {
        let buf = OutputBuffer::new(10_000);
        assert_eq!(buf.engine_len(), 10_001);
        assert_eq!(buf.max_len(), 9_999);
    }

    #[test]
    fn code_units_matches_encoding() {
        let s = "héllo";
        assert_eq!(code_units(s) + 1, to_engine("x", s).unwrap().len());
    }
}
