//! Constant values represented as opcodes.

#![allow(non_camel_case_types)]

use alloc::{
    string::{String, ToString},
    vec::Vec,
};

use core::iter;

use bounded_vec::{BoundedVec, EmptyBoundedVec};

use crate::{num, opcode, script::Asm, signature};

/// Data values that aren’t represented within their opcode byte.
///
/// The payload length is bounded only by the encoding. The element size limit is a property of
/// the [`crate::interpreter::Limits`] in effect, and is enforced when the value is pushed.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum LargeValue {
    /// NB: The lower bound here is 1 because `PushdataBytelength([;0])` has the same encoding as
    ///     [`SmallValue::OP_0`].
    PushdataBytelength(BoundedVec<u8, 1, 0x4b>),
    /// A value whose byte length fits into a single byte.
    OP_PUSHDATA1(EmptyBoundedVec<u8, 0xff>),
    /// A value whose byte length fits into two bytes.
    OP_PUSHDATA2(EmptyBoundedVec<u8, 0xffff>),
    /// A value whose byte length fits into four bytes.
    OP_PUSHDATA4(Vec<u8>),
}

use LargeValue::*;

impl LargeValue {
    const PUSHDATA1_BYTE: u8 = 0x4c;
    const PUSHDATA2_BYTE: u8 = 0x4d;
    const PUSHDATA4_BYTE: u8 = 0x4e;

    /// The number of bytes this requires in a script.
    pub(crate) fn byte_len(&self) -> usize {
        1 + self.prefix_len() + self.value().len()
    }

    pub(crate) fn opcode_byte(&self) -> u8 {
        match self {
            // `BoundedVec` keeps this within 0x01–0x4b.
            PushdataBytelength(v) => v.len() as u8,
            OP_PUSHDATA1(_) => Self::PUSHDATA1_BYTE,
            OP_PUSHDATA2(_) => Self::PUSHDATA2_BYTE,
            OP_PUSHDATA4(_) => Self::PUSHDATA4_BYTE,
        }
    }

    fn prefix_len(&self) -> usize {
        match self {
            PushdataBytelength(_) => 0,
            OP_PUSHDATA1(_) => 1,
            OP_PUSHDATA2(_) => 2,
            OP_PUSHDATA4(_) => 4,
        }
    }

    /// Picks the smallest encoding able to carry `v`. Values that have a [`SmallValue`] encoding
    /// are not special-cased here; see [`opcode::PushValue::from_slice`].
    pub(crate) fn from_slice(v: &[u8]) -> Option<LargeValue> {
        match v.len() {
            0 => None,
            1..=0x4b => BoundedVec::try_from(v.to_vec()).ok().map(PushdataBytelength),
            0x4c..=0xff => BoundedVec::try_from(v.to_vec()).ok().map(OP_PUSHDATA1),
            0x100..=0xffff => BoundedVec::try_from(v.to_vec()).ok().map(OP_PUSHDATA2),
            n if u32::try_from(n).is_ok() => Some(OP_PUSHDATA4(v.to_vec())),
            _ => None,
        }
    }

    fn split_value(script: &[u8], needed_bytes: usize) -> Result<(&[u8], &[u8]), opcode::Error> {
        script
            .split_at_checked(needed_bytes)
            .ok_or(opcode::Error::Read {
                expected_bytes: needed_bytes,
                available_bytes: script.len(),
            })
    }

    /// Reads a little-endian length of `size_size` bytes, then the value it describes.
    fn split_tagged_value(
        script: &[u8],
        size_size: usize,
    ) -> Result<(&[u8], &[u8]), opcode::Error> {
        let (size_bytes, rem) = Self::split_value(script, size_size)?;
        let size = size_bytes
            .iter()
            .rev()
            .fold(0usize, |size, byte| (size << 8) | usize::from(*byte));
        Self::split_value(rem, size)
    }

    /// Parses the payload following `leading_byte`. Returns `None` if `leading_byte` isn’t one of
    /// the data-carrying push opcodes.
    pub(crate) fn parse(
        leading_byte: u8,
        script: &[u8],
    ) -> Option<Result<(LargeValue, &[u8]), opcode::Error>> {
        let bounded = |(v, rem): (&[u8], _)| {
            let value = match leading_byte {
                Self::PUSHDATA1_BYTE => BoundedVec::try_from(v.to_vec()).ok().map(OP_PUSHDATA1),
                Self::PUSHDATA2_BYTE => BoundedVec::try_from(v.to_vec()).ok().map(OP_PUSHDATA2),
                Self::PUSHDATA4_BYTE => Some(OP_PUSHDATA4(v.to_vec())),
                _ => BoundedVec::try_from(v.to_vec()).ok().map(PushdataBytelength),
            };
            // The length prefix bounds the value, so the conversions above can’t fail.
            value.map(|lv| (lv, rem)).ok_or(opcode::Error::Read {
                expected_bytes: v.len(),
                available_bytes: v.len(),
            })
        };
        match leading_byte {
            0x01..Self::PUSHDATA1_BYTE => Some(
                Self::split_value(script, usize::from(leading_byte)).and_then(bounded),
            ),
            Self::PUSHDATA1_BYTE => Some(Self::split_tagged_value(script, 1).and_then(bounded)),
            Self::PUSHDATA2_BYTE => Some(Self::split_tagged_value(script, 2).and_then(bounded)),
            Self::PUSHDATA4_BYTE => Some(Self::split_tagged_value(script, 4).and_then(bounded)),
            _ => None,
        }
    }

    /// Get the [`crate::interpreter::Stack`] element represented by this [`LargeValue`].
    pub(crate) fn value(&self) -> &[u8] {
        match self {
            PushdataBytelength(v) => v.as_slice(),
            OP_PUSHDATA1(v) => v.as_slice(),
            OP_PUSHDATA2(v) => v.as_slice(),
            OP_PUSHDATA4(v) => v.as_slice(),
        }
    }

    /// Returns false if there is a smaller possible encoding of the provided value.
    pub(crate) fn is_minimal_push(&self) -> bool {
        let len = self.value().len();
        match self {
            PushdataBytelength(data) => match data.as_slice() {
                [b] => *b != 0x81 && !(1..=16).contains(b),
                _ => true,
            },
            OP_PUSHDATA1(_) => usize::from(Self::PUSHDATA1_BYTE) <= len,
            OP_PUSHDATA2(_) => 0x100 <= len,
            OP_PUSHDATA4(_) => 0x10000 <= len,
        }
    }

    /// Returns the numeric value represented by the opcode, if one exists.
    pub(crate) fn to_num(&self) -> Result<i64, num::Error> {
        num::parse(self.value(), false, num::MAX_SIZE)
    }
}

impl From<&LargeValue> for Vec<u8> {
    fn from(value: &LargeValue) -> Self {
        let contents = value.value();
        let len = (contents.len() as u64).to_le_bytes();
        iter::once(value.opcode_byte())
            .chain(len[..value.prefix_len()].iter().copied())
            .chain(contents.iter().copied())
            .collect()
    }
}

impl Asm for LargeValue {
    fn to_asm(&self, attempt_sighash_decode: bool) -> String {
        let value = self.value();
        if attempt_sighash_decode && value.len() > 4 {
            if let signature::Validity::Valid(sig) = signature::Decoded::from_bytes(value, false, true)
            {
                return hex::encode(&*sig.sig().serialize_der())
                    + "["
                    + &sig.sighash_type().to_asm(false)
                    + "]";
            }
        }
        if value.len() <= 4 {
            // Short pushes read better as the number they encode.
            num::parse(value, false, num::MAX_SIZE)
                .unwrap_or(0)
                .to_string()
        } else {
            hex::encode(value)
        }
    }
}

/// Data values represented entirely by their opcode byte.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
#[allow(missing_docs)]
#[repr(u8)]
pub enum SmallValue {
    OP_0 = 0x00,
    OP_1NEGATE = 0x4f,
    OP_1 = 0x51,
    OP_2 = 0x52,
    OP_3 = 0x53,
    OP_4 = 0x54,
    OP_5 = 0x55,
    OP_6 = 0x56,
    OP_7 = 0x57,
    OP_8 = 0x58,
    OP_9 = 0x59,
    OP_10 = 0x5a,
    OP_11 = 0x5b,
    OP_12 = 0x5c,
    OP_13 = 0x5d,
    OP_14 = 0x5e,
    OP_15 = 0x5f,
    OP_16 = 0x60,
}

use SmallValue::*;

impl SmallValue {
    /// `OP_1` through `OP_16`, in order.
    const NUMBERED: [SmallValue; 16] = [
        OP_1, OP_2, OP_3, OP_4, OP_5, OP_6, OP_7, OP_8, OP_9, OP_10, OP_11, OP_12, OP_13, OP_14,
        OP_15, OP_16,
    ];

    /// Decodes this opcode from its byte encoding.
    pub(crate) fn decode(b: u8) -> Option<Self> {
        match b {
            0x00 => Some(OP_0),
            0x4f => Some(OP_1NEGATE),
            0x51..=0x60 => Self::NUMBERED.get(usize::from(b - 0x51)).copied(),
            _ => None,
        }
    }

    /// Returns the byte encoding of this opcode.
    pub(crate) fn encode(self) -> u8 {
        self as u8
    }

    /// Returns the numeric value of the opcode. It will always be in the range -1..=16.
    pub(crate) fn to_num(self) -> i8 {
        match self {
            OP_0 => 0,
            OP_1NEGATE => -1,
            // `OP_1` is 0x51, so this is always in 1..=16.
            n => (n.encode() - 0x50) as i8,
        }
    }

    /// Get the [`crate::interpreter::Stack`] element represented by this [`SmallValue`].
    pub(crate) fn value(&self) -> Vec<u8> {
        num::serialize(self.to_num().into())
    }
}

impl Asm for SmallValue {
    fn to_asm(&self, _attempt_sighash_decode: bool) -> String {
        match self {
            OP_0 => "0".to_string(),
            _ => format!("{:?}", self),
        }
    }
}
