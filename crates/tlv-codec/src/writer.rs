//! TLV Writer

use crate::control::{context_octet, ElementType, IntWidth, END_OF_CONTAINER};
use crate::error::TlvError;
use crate::{MAX_DEPTH, MAX_STRING_LEN};
use heapless::Vec;
use tracing::trace;

/// Encoder over a caller-supplied buffer.
///
/// Each call either writes a whole element or nothing: on any error the
/// buffer and [`len`](Self::len) are exactly as before the call.
pub struct TlvWriter<'a> {
    buf: &'a mut [u8],
    len: usize,
    open: Vec<ElementType, MAX_DEPTH>,
}

impl<'a> TlvWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self {
            buf,
            len: 0,
            open: Vec::new(),
        }
    }

    /// Bytes written by successful calls
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Free space left in the buffer
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.len
    }

    /// Containers currently open
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    pub fn encode_uint8(&mut self, tag: u8, value: u8) -> Result<(), TlvError> {
        self.encode_uint32(tag, u32::from(value))
    }

    pub fn encode_uint16(&mut self, tag: u8, value: u16) -> Result<(), TlvError> {
        self.encode_uint32(tag, u32::from(value))
    }

    pub fn encode_uint32(&mut self, tag: u8, value: u32) -> Result<(), TlvError> {
        let width = IntWidth::for_unsigned(value);
        let bytes = value.to_le_bytes();
        self.put(
            tag,
            context_octet(ElementType::UnsignedInt, width as u8),
            &[&bytes[..width.bytes()]],
        )
    }

    pub fn encode_int8(&mut self, tag: u8, value: i8) -> Result<(), TlvError> {
        self.encode_int32(tag, i32::from(value))
    }

    pub fn encode_int16(&mut self, tag: u8, value: i16) -> Result<(), TlvError> {
        self.encode_int32(tag, i32::from(value))
    }

    pub fn encode_int32(&mut self, tag: u8, value: i32) -> Result<(), TlvError> {
        let width = IntWidth::for_signed(value);
        // Low bytes of the two's complement form are the narrow encoding
        let bytes = value.to_le_bytes();
        self.put(
            tag,
            context_octet(ElementType::SignedInt, width as u8),
            &[&bytes[..width.bytes()]],
        )
    }

    /// Booleans have no value octet
    pub fn encode_bool(&mut self, tag: u8, value: bool) -> Result<(), TlvError> {
        self.put(tag, context_octet(ElementType::Bool, u8::from(value)), &[])
    }

    /// One-octet length prefix, then the raw bytes
    pub fn encode_string(&mut self, tag: u8, value: &str) -> Result<(), TlvError> {
        if value.len() > MAX_STRING_LEN {
            return Err(TlvError::StringTooLong(value.len()));
        }
        self.put(
            tag,
            context_octet(ElementType::Utf8String, IntWidth::One as u8),
            &[&[value.len() as u8], value.as_bytes()],
        )
    }

    pub fn encode_structure_start(&mut self, tag: u8) -> Result<(), TlvError> {
        self.open_container(tag, ElementType::Structure)
    }

    /// Elements inside an array must use tag 0
    pub fn encode_array_start(&mut self, tag: u8) -> Result<(), TlvError> {
        self.open_container(tag, ElementType::Array)
    }

    /// Close the innermost open container
    pub fn encode_container_end(&mut self) -> Result<(), TlvError> {
        if self.open.is_empty() {
            return Err(TlvError::NoOpenContainer);
        }
        self.reserve(1)?;
        self.buf[self.len] = END_OF_CONTAINER;
        self.len += 1;
        self.open.pop();
        Ok(())
    }

    /// The encoded bytes, once every container is closed
    pub fn finish(self) -> Result<&'a [u8], TlvError> {
        if !self.open.is_empty() {
            return Err(TlvError::UnclosedContainer(self.open.len()));
        }
        let len = self.len;
        let buf: &'a [u8] = self.buf;
        Ok(&buf[..len])
    }

    fn open_container(&mut self, tag: u8, kind: ElementType) -> Result<(), TlvError> {
        if self.open.is_full() {
            return Err(TlvError::NestingTooDeep { max: MAX_DEPTH });
        }
        self.put(tag, context_octet(kind, 0), &[])?;
        // Fullness checked above
        let _ = self.open.push(kind);
        Ok(())
    }

    fn put(&mut self, tag: u8, control: u8, parts: &[&[u8]]) -> Result<(), TlvError> {
        if self.open.last() == Some(&ElementType::Array) && tag != 0 {
            return Err(TlvError::ArrayElementTag(tag));
        }

        let body: usize = parts.iter().map(|p| p.len()).sum();
        self.reserve(2 + body)?;

        self.buf[self.len] = control;
        self.buf[self.len + 1] = tag;
        let mut at = self.len + 2;
        for part in parts {
            self.buf[at..at + part.len()].copy_from_slice(part);
            at += part.len();
        }
        self.len = at;
        Ok(())
    }

    fn reserve(&self, needed: usize) -> Result<(), TlvError> {
        let remaining = self.remaining();
        if needed > remaining {
            trace!(needed, remaining, "tlv write rejected");
            return Err(TlvError::Overflow { needed, remaining });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode<F>(f: F) -> std::vec::Vec<u8>
    where
        F: FnOnce(&mut TlvWriter<'_>) -> Result<(), TlvError>,
    {
        let mut buf = [0u8; 128];
        let mut writer = TlvWriter::new(&mut buf);
        f(&mut writer).unwrap();
        writer.finish().unwrap().to_vec()
    }

    #[test]
    fn test_uint8_fixture() {
        assert_eq!(encode(|w| w.encode_uint8(1, 42)), [0x28, 0x01, 0x2A]);
    }

    #[test]
    fn test_integer_fixtures() {
        assert_eq!(encode(|w| w.encode_uint16(2, 1000)), [0x29, 0x02, 0xE8, 0x03]);
        assert_eq!(
            encode(|w| w.encode_uint32(3, 100_000)),
            [0x2A, 0x03, 0xA0, 0x86, 0x01, 0x00]
        );
        assert_eq!(encode(|w| w.encode_int8(4, -50)), [0x08, 0x04, 0xCE]);
        assert_eq!(encode(|w| w.encode_int16(5, -1000)), [0x09, 0x05, 0x18, 0xFC]);
        assert_eq!(
            encode(|w| w.encode_int32(6, -100_000)),
            [0x0A, 0x06, 0x60, 0x79, 0xFE, 0xFF]
        );
    }

    #[test]
    fn test_narrowest_width_used() {
        assert_eq!(encode(|w| w.encode_uint32(1, 7)), [0x28, 0x01, 0x07]);
        assert_eq!(encode(|w| w.encode_int16(1, 5)), [0x08, 0x01, 0x05]);
    }

    #[test]
    fn test_bool_has_no_value_octet() {
        assert_eq!(encode(|w| w.encode_bool(7, true)), [0x49, 0x07]);
        assert_eq!(encode(|w| w.encode_bool(7, false)), [0x48, 0x07]);
    }

    #[test]
    fn test_string_fixture() {
        assert_eq!(
            encode(|w| w.encode_string(8, "Hello")),
            [0x88, 0x08, 0x05, b'H', b'e', b'l', b'l', b'o']
        );
    }

    #[test]
    fn test_structure_and_array() {
        let bytes = encode(|w| {
            w.encode_structure_start(10)?;
            w.encode_array_start(1)?;
            w.encode_uint8(0, 1)?;
            w.encode_container_end()?;
            w.encode_container_end()
        });
        assert_eq!(bytes, [0xE8, 0x0A, 0xC8, 0x01, 0x28, 0x00, 0x01, 0xA0, 0xA0]);
    }

    #[test]
    fn test_string_overflow_leaves_length_unchanged() {
        let mut buf = [0u8; 8];
        let mut writer = TlvWriter::new(&mut buf);
        writer.encode_uint8(1, 1).unwrap();
        assert_eq!(writer.len(), 3);

        // 2 + 1 + 3 = 6 needed, 5 remaining
        assert_eq!(
            writer.encode_string(2, "abc"),
            Err(TlvError::Overflow {
                needed: 6,
                remaining: 5
            })
        );
        assert_eq!(writer.len(), 3);

        writer.encode_string(2, "ab").unwrap();
        assert_eq!(writer.len(), 8);
    }

    #[test]
    fn test_zero_capacity_writer() {
        let mut buf = [0u8; 0];
        let mut writer = TlvWriter::new(&mut buf);
        assert!(matches!(writer.encode_bool(0, true), Err(TlvError::Overflow { .. })));
        assert!(writer.is_empty());
    }

    #[test]
    fn test_string_too_long() {
        let long = "x".repeat(256);
        let mut buf = [0u8; 512];
        let mut writer = TlvWriter::new(&mut buf);
        assert_eq!(writer.encode_string(1, &long), Err(TlvError::StringTooLong(256)));
        writer.encode_string(1, &long[..255]).unwrap();
        assert_eq!(writer.len(), 258);
    }

    #[test]
    fn test_nesting_bound() {
        let mut buf = [0u8; 64];
        let mut writer = TlvWriter::new(&mut buf);
        for _ in 0..MAX_DEPTH {
            writer.encode_structure_start(1).unwrap();
        }
        let before = writer.len();
        assert_eq!(
            writer.encode_structure_start(1),
            Err(TlvError::NestingTooDeep { max: MAX_DEPTH })
        );
        assert_eq!(writer.len(), before);
    }

    #[test]
    fn test_container_misuse() {
        let mut buf = [0u8; 16];
        let mut writer = TlvWriter::new(&mut buf);
        assert_eq!(writer.encode_container_end(), Err(TlvError::NoOpenContainer));

        writer.encode_array_start(0).unwrap();
        assert_eq!(writer.encode_uint8(3, 1), Err(TlvError::ArrayElementTag(3)));
        assert_eq!(writer.finish(), Err(TlvError::UnclosedContainer(1)));
    }

    #[test]
    fn test_identical_calls_identical_bytes() {
        let build = |w: &mut TlvWriter<'_>| {
            w.encode_structure_start(0)?;
            w.encode_bool(0, true)?;
            w.encode_uint16(1, 300)?;
            w.encode_string(2, "burner")?;
            w.encode_container_end()
        };
        assert_eq!(encode(build), encode(build));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_fresh_writers_agree(
                tag in any::<u8>(),
                number in any::<u32>(),
                text in "[ -~]{0,40}",
            ) {
                let build = |w: &mut TlvWriter<'_>| {
                    w.encode_structure_start(tag)?;
                    w.encode_uint32(tag, number)?;
                    w.encode_string(tag, &text)?;
                    w.encode_container_end()
                };
                prop_assert_eq!(encode(build), encode(build));
            }

            #[test]
            fn prop_string_overflow_keeps_length(
                cap in 0usize..24,
                text in "[a-z]{0,32}",
            ) {
                let mut buf = [0u8; 24];
                let mut writer = TlvWriter::new(&mut buf[..cap]);
                let needed = 3 + text.len();
                match writer.encode_string(1, &text) {
                    Ok(()) => prop_assert_eq!(writer.len(), needed),
                    Err(TlvError::Overflow { .. }) => {
                        prop_assert!(needed > cap);
                        prop_assert_eq!(writer.len(), 0);
                    }
                    Err(e) => prop_assert!(false, "unexpected error {}", e),
                }
            }
        }
    }
}
