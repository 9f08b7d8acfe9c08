//! TLV Reader
//!
//! Walks a buffer element by element without copying. Strings borrow from
//! the input. The reader fails closed: the first malformed element is
//! reported once and every later call returns `Ok(None)`.

use crate::control::{Control, ElementType, IntWidth, TagControl};
use crate::error::TlvError;
use crate::MAX_DEPTH;

/// Decoded element value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlvValue<'a> {
    Signed(i32),
    Unsigned(u32),
    Bool(bool),
    Str(&'a str),
    /// Start of a structure or array; members follow
    ContainerStart,
    ContainerEnd,
}

impl<'a> TlvValue<'a> {
    pub fn as_u8(&self) -> Option<u8> {
        self.as_u32().and_then(|v| u8::try_from(v).ok())
    }

    pub fn as_u16(&self) -> Option<u16> {
        self.as_u32().and_then(|v| u16::try_from(v).ok())
    }

    pub fn as_u32(&self) -> Option<u32> {
        match *self {
            Self::Unsigned(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i16(&self) -> Option<i16> {
        self.as_i32().and_then(|v| i16::try_from(v).ok())
    }

    pub fn as_i32(&self) -> Option<i32> {
        match *self {
            Self::Signed(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Self::Bool(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&'a str> {
        match *self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// One element: type, context tag (absent on end markers) and value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Element<'a> {
    pub element_type: ElementType,
    pub tag: Option<u8>,
    pub value: TlvValue<'a>,
}

/// Zero-copy decoder
#[derive(Debug, Clone)]
pub struct TlvReader<'a> {
    buf: &'a [u8],
    pos: usize,
    depth: usize,
    failed: bool,
}

impl<'a> TlvReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            depth: 0,
            failed: false,
        }
    }

    /// Offset of the next element
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Containers currently open
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Whether `next` would return end-of-data
    pub fn is_end(&self) -> bool {
        self.failed || self.pos >= self.buf.len()
    }

    /// Decode the next element.
    ///
    /// `Ok(None)` means no more elements. An error also ends the stream.
    pub fn next(&mut self) -> Result<Option<Element<'a>>, TlvError> {
        if self.is_end() {
            return Ok(None);
        }
        match self.decode() {
            Ok(element) => Ok(Some(element)),
            Err(e) => {
                self.failed = true;
                Err(e)
            }
        }
    }

    /// Decode the next element without consuming it
    pub fn peek(&self) -> Result<Option<Element<'a>>, TlvError> {
        self.clone().next()
    }

    /// Consume the next element, including everything inside it when it
    /// opens a container
    pub fn skip(&mut self) -> Result<(), TlvError> {
        let Some(first) = self.next()? else {
            return Ok(());
        };
        if !first.element_type.is_container() {
            return Ok(());
        }

        let target = self.depth - 1;
        while self.depth > target {
            if self.next()?.is_none() {
                return Err(TlvError::Truncated { offset: self.pos });
            }
        }
        Ok(())
    }

    fn decode(&mut self) -> Result<Element<'a>, TlvError> {
        let start = self.pos;
        let control = Control::parse(self.buf[start])?;

        if control.element_type == ElementType::EndOfContainer {
            if control.tag_control != TagControl::Anonymous || control.low_bits != 0 {
                return Err(TlvError::UnsupportedTagControl(control.raw));
            }
            if self.depth == 0 {
                return Err(TlvError::UnbalancedContainer { offset: start });
            }
            self.depth -= 1;
            self.pos += 1;
            return Ok(Element {
                element_type: ElementType::EndOfContainer,
                tag: None,
                value: TlvValue::ContainerEnd,
            });
        }

        if control.tag_control != TagControl::Context {
            return Err(TlvError::UnsupportedTagControl(control.raw));
        }
        let tag = *self
            .buf
            .get(start + 1)
            .ok_or(TlvError::Truncated { offset: start })?;
        let mut at = start + 2;

        let value = match control.element_type {
            ElementType::UnsignedInt => {
                let width = control.width()?;
                let raw = self.take(&mut at, width.bytes(), start)?;
                TlvValue::Unsigned(le_unsigned(raw))
            }
            ElementType::SignedInt => {
                let width = control.width()?;
                let raw = self.take(&mut at, width.bytes(), start)?;
                TlvValue::Signed(le_signed(raw, width))
            }
            ElementType::Bool => match control.low_bits {
                0 => TlvValue::Bool(false),
                1 => TlvValue::Bool(true),
                _ => return Err(TlvError::InvalidWidth(control.raw)),
            },
            ElementType::Utf8String => {
                if control.width()? != IntWidth::One {
                    return Err(TlvError::InvalidWidth(control.raw));
                }
                let len = usize::from(self.take(&mut at, 1, start)?[0]);
                let remaining = self.buf.len() - at;
                if len > remaining {
                    return Err(TlvError::LengthExceedsBuffer {
                        declared: len,
                        remaining,
                    });
                }
                let raw = self.take(&mut at, len, start)?;
                let s = core::str::from_utf8(raw)
                    .map_err(|_| TlvError::InvalidUtf8 { offset: start })?;
                TlvValue::Str(s)
            }
            ElementType::Array | ElementType::Structure => {
                if self.depth >= MAX_DEPTH {
                    return Err(TlvError::NestingTooDeep { max: MAX_DEPTH });
                }
                self.depth += 1;
                TlvValue::ContainerStart
            }
            ElementType::EndOfContainer => {
                return Err(TlvError::UnsupportedTagControl(control.raw))
            }
        };

        self.pos = at;
        Ok(Element {
            element_type: control.element_type,
            tag: Some(tag),
            value,
        })
    }

    fn take(&self, at: &mut usize, n: usize, start: usize) -> Result<&'a [u8], TlvError> {
        let buf: &'a [u8] = self.buf;
        let slice = buf
            .get(*at..*at + n)
            .ok_or(TlvError::Truncated { offset: start })?;
        *at += n;
        Ok(slice)
    }
}

fn le_unsigned(raw: &[u8]) -> u32 {
    raw.iter()
        .rev()
        .fold(0u32, |acc, &b| (acc << 8) | u32::from(b))
}

fn le_signed(raw: &[u8], width: IntWidth) -> i32 {
    match width {
        IntWidth::One => i32::from(raw[0] as i8),
        IntWidth::Two => i32::from(i16::from_le_bytes([raw[0], raw[1]])),
        IntWidth::Four => i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::TlvWriter;
    use proptest::prelude::*;

    fn single(bytes: &[u8]) -> Element<'_> {
        let mut reader = TlvReader::new(bytes);
        let element = reader.next().unwrap().unwrap();
        assert!(reader.next().unwrap().is_none());
        element
    }

    #[test]
    fn test_decode_fixtures() {
        let e = single(&[0x28, 0x01, 0x2A]);
        assert_eq!(e.element_type, ElementType::UnsignedInt);
        assert_eq!(e.tag, Some(1));
        assert_eq!(e.value.as_u8(), Some(42));

        assert_eq!(single(&[0x29, 0x02, 0xE8, 0x03]).value.as_u16(), Some(1000));
        assert_eq!(single(&[0x08, 0x04, 0xCE]).value.as_i32(), Some(-50));
        assert_eq!(single(&[0x49, 0x07]).value.as_bool(), Some(true));
        assert_eq!(single(&[0x48, 0x07]).value.as_bool(), Some(false));

        let e = single(&[0x88, 0x08, 0x05, b'H', b'e', b'l', b'l', b'o']);
        assert_eq!(e.value.as_str(), Some("Hello"));
    }

    #[test]
    fn test_string_borrows_input() {
        let bytes = [0x88, 0x00, 0x02, b'o', b'k'];
        let e = single(&bytes);
        let s = e.value.as_str().unwrap();
        assert_eq!(s.as_ptr(), bytes[3..].as_ptr());
    }

    #[test]
    fn test_empty_buffer_is_end() {
        let mut reader = TlvReader::new(&[]);
        assert!(reader.is_end());
        assert_eq!(reader.next(), Ok(None));
    }

    #[test]
    fn test_truncated_integer_fails_closed() {
        let mut reader = TlvReader::new(&[0x2A, 0x01, 0x00, 0x01]);
        assert_eq!(reader.next(), Err(TlvError::Truncated { offset: 0 }));
        assert_eq!(reader.next(), Ok(None));
        assert!(reader.is_end());
    }

    #[test]
    fn test_declared_length_exceeds_buffer() {
        let mut reader = TlvReader::new(&[0x88, 0x01, 0x09, b'a', b'b']);
        assert_eq!(
            reader.next(),
            Err(TlvError::LengthExceedsBuffer {
                declared: 9,
                remaining: 2
            })
        );
    }

    #[test]
    fn test_missing_tag_octet() {
        let mut reader = TlvReader::new(&[0x49]);
        assert_eq!(reader.next(), Err(TlvError::Truncated { offset: 0 }));
    }

    #[test]
    fn test_invalid_utf8() {
        let mut reader = TlvReader::new(&[0x88, 0x01, 0x01, 0xFF]);
        assert_eq!(reader.next(), Err(TlvError::InvalidUtf8 { offset: 0 }));
    }

    #[test]
    fn test_unbalanced_end() {
        let mut reader = TlvReader::new(&[0xA0]);
        assert_eq!(reader.next(), Err(TlvError::UnbalancedContainer { offset: 0 }));
    }

    #[test]
    fn test_anonymous_primitive_rejected() {
        let mut reader = TlvReader::new(&[0x20, 0x05]);
        assert_eq!(reader.next(), Err(TlvError::UnsupportedTagControl(0x20)));
    }

    #[test]
    fn test_nesting_bound() {
        let mut bytes = Vec::new();
        for _ in 0..=MAX_DEPTH {
            bytes.extend_from_slice(&[0xE8, 0x01]);
        }
        let mut reader = TlvReader::new(&bytes);
        for _ in 0..MAX_DEPTH {
            assert!(reader.next().unwrap().is_some());
        }
        assert_eq!(
            reader.next(),
            Err(TlvError::NestingTooDeep { max: MAX_DEPTH })
        );
    }

    #[test]
    fn test_peek_and_skip() {
        let mut buf = [0u8; 64];
        let mut writer = TlvWriter::new(&mut buf);
        writer.encode_structure_start(1).unwrap();
        writer.encode_array_start(2).unwrap();
        writer.encode_uint8(0, 9).unwrap();
        writer.encode_container_end().unwrap();
        writer.encode_bool(3, true).unwrap();
        writer.encode_container_end().unwrap();
        writer.encode_string(4, "tail").unwrap();
        let bytes = writer.finish().unwrap();

        let mut reader = TlvReader::new(bytes);
        let peeked = reader.peek().unwrap().unwrap();
        assert_eq!(peeked.element_type, ElementType::Structure);
        assert_eq!(reader.position(), 0);

        reader.skip().unwrap();
        assert_eq!(reader.depth(), 0);
        let e = reader.next().unwrap().unwrap();
        assert_eq!(e.tag, Some(4));
        assert_eq!(e.value.as_str(), Some("tail"));
        assert!(reader.is_end());
    }

    #[test]
    fn test_container_walk() {
        let bytes = [0xE8, 0x0A, 0x28, 0x00, 0x05, 0xA0];
        let mut reader = TlvReader::new(&bytes);

        let open = reader.next().unwrap().unwrap();
        assert_eq!(open.value, TlvValue::ContainerStart);
        assert_eq!(open.tag, Some(10));
        assert_eq!(reader.depth(), 1);

        assert_eq!(reader.next().unwrap().unwrap().value.as_u8(), Some(5));

        let close = reader.next().unwrap().unwrap();
        assert_eq!(close.element_type, ElementType::EndOfContainer);
        assert_eq!(close.tag, None);
        assert_eq!(reader.depth(), 0);
    }

    proptest! {
        #[test]
        fn prop_unsigned_round_trip(tag in any::<u8>(), value in any::<u32>()) {
            let mut buf = [0u8; 8];
            let mut writer = TlvWriter::new(&mut buf);
            writer.encode_uint32(tag, value).unwrap();
            let e = single(writer.finish().unwrap());
            prop_assert_eq!(e.element_type, ElementType::UnsignedInt);
            prop_assert_eq!(e.tag, Some(tag));
            prop_assert_eq!(e.value, TlvValue::Unsigned(value));
        }

        #[test]
        fn prop_signed_round_trip(tag in any::<u8>(), value in any::<i32>()) {
            let mut buf = [0u8; 8];
            let mut writer = TlvWriter::new(&mut buf);
            writer.encode_int32(tag, value).unwrap();
            let e = single(writer.finish().unwrap());
            prop_assert_eq!(e.element_type, ElementType::SignedInt);
            prop_assert_eq!(e.tag, Some(tag));
            prop_assert_eq!(e.value, TlvValue::Signed(value));
        }

        #[test]
        fn prop_string_round_trip(tag in any::<u8>(), value in "[a-zA-Z0-9 ]{0,64}") {
            let mut buf = [0u8; 80];
            let mut writer = TlvWriter::new(&mut buf);
            writer.encode_string(tag, &value).unwrap();
            let e = single(writer.finish().unwrap());
            prop_assert_eq!(e.tag, Some(tag));
            prop_assert_eq!(e.value.as_str(), Some(value.as_str()));
        }

        #[test]
        fn prop_reader_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            let mut reader = TlvReader::new(&bytes);
            for _ in 0..bytes.len() + 1 {
                if !matches!(reader.next(), Ok(Some(_))) {
                    break;
                }
            }
        }
    }
}
