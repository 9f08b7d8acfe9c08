//! Control Octet

use crate::error::TlvError;

const TYPE_SHIFT: u8 = 5;
const TAG_SHIFT: u8 = 3;
const TAG_MASK: u8 = 0x18;
const WIDTH_MASK: u8 = 0x07;

/// Element type, bits 7..5
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ElementType {
    SignedInt = 0,
    UnsignedInt = 1,
    Bool = 2,
    Utf8String = 4,
    EndOfContainer = 5,
    Array = 6,
    Structure = 7,
}

impl ElementType {
    fn from_bits(bits: u8, control: u8) -> Result<Self, TlvError> {
        match bits {
            0 => Ok(Self::SignedInt),
            1 => Ok(Self::UnsignedInt),
            2 => Ok(Self::Bool),
            4 => Ok(Self::Utf8String),
            5 => Ok(Self::EndOfContainer),
            6 => Ok(Self::Array),
            7 => Ok(Self::Structure),
            _ => Err(TlvError::UnknownElementType(control)),
        }
    }

    /// Whether this element opens a container
    pub fn is_container(self) -> bool {
        matches!(self, Self::Array | Self::Structure)
    }
}

/// Tag form, bits 4..3
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TagControl {
    Anonymous = 0,
    Context = 1,
}

/// Integer or length width, bits 2..0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum IntWidth {
    One = 0,
    Two = 1,
    Four = 2,
}

impl IntWidth {
    pub fn bytes(self) -> usize {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Four => 4,
        }
    }

    fn from_bits(bits: u8, control: u8) -> Result<Self, TlvError> {
        match bits {
            0 => Ok(Self::One),
            1 => Ok(Self::Two),
            2 => Ok(Self::Four),
            _ => Err(TlvError::InvalidWidth(control)),
        }
    }

    pub(crate) fn for_unsigned(value: u32) -> Self {
        if value <= u32::from(u8::MAX) {
            Self::One
        } else if value <= u32::from(u16::MAX) {
            Self::Two
        } else {
            Self::Four
        }
    }

    pub(crate) fn for_signed(value: i32) -> Self {
        if i8::try_from(value).is_ok() {
            Self::One
        } else if i16::try_from(value).is_ok() {
            Self::Two
        } else {
            Self::Four
        }
    }
}

/// Octet that closes the innermost container
pub const END_OF_CONTAINER: u8 = (ElementType::EndOfContainer as u8) << TYPE_SHIFT;

/// Compose a context-tagged control octet
pub(crate) fn context_octet(element_type: ElementType, low_bits: u8) -> u8 {
    ((element_type as u8) << TYPE_SHIFT)
        | ((TagControl::Context as u8) << TAG_SHIFT)
        | (low_bits & WIDTH_MASK)
}

/// Decoded control octet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Control {
    pub element_type: ElementType,
    pub tag_control: TagControl,
    pub low_bits: u8,
    pub raw: u8,
}

impl Control {
    pub fn parse(raw: u8) -> Result<Self, TlvError> {
        let element_type = ElementType::from_bits(raw >> TYPE_SHIFT, raw)?;
        let tag_control = match (raw & TAG_MASK) >> TAG_SHIFT {
            0 => TagControl::Anonymous,
            1 => TagControl::Context,
            _ => return Err(TlvError::UnsupportedTagControl(raw)),
        };
        Ok(Self {
            element_type,
            tag_control,
            low_bits: raw & WIDTH_MASK,
            raw,
        })
    }

    pub fn width(&self) -> Result<IntWidth, TlvError> {
        IntWidth::from_bits(self.low_bits, self.raw)
    }
}
