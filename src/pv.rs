//! Convenience definitions for all push values.

#![allow(missing_docs)]

use alloc::vec::Vec;

use bounded_vec::BoundedVec;

use crate::{
    num,
    opcode::{
        push_value::{LargeValue, SmallValue::*},
        PushValue::{self, SmallValue},
    },
};

pub const _0: PushValue = SmallValue(OP_0);
pub const _1NEGATE: PushValue = SmallValue(OP_1NEGATE);
pub const _1: PushValue = SmallValue(OP_1);
pub const _2: PushValue = SmallValue(OP_2);
pub const _3: PushValue = SmallValue(OP_3);
pub const _4: PushValue = SmallValue(OP_4);
pub const _5: PushValue = SmallValue(OP_5);
pub const _6: PushValue = SmallValue(OP_6);
pub const _7: PushValue = SmallValue(OP_7);
pub const _8: PushValue = SmallValue(OP_8);
pub const _9: PushValue = SmallValue(OP_9);
pub const _10: PushValue = SmallValue(OP_10);
pub const _11: PushValue = SmallValue(OP_11);
pub const _12: PushValue = SmallValue(OP_12);
pub const _13: PushValue = SmallValue(OP_13);
pub const _14: PushValue = SmallValue(OP_14);
pub const _15: PushValue = SmallValue(OP_15);
pub const _16: PushValue = SmallValue(OP_16);

/// A bare data push. Fails unless the value is 1 to 75 bytes long.
pub fn pushdata_bytelength(value: Vec<u8>) -> Option<PushValue> {
    BoundedVec::try_from(value)
        .ok()
        .map(|v| PushValue::LargeValue(LargeValue::PushdataBytelength(v)))
}

/// Fails if the value is longer than 255 bytes.
pub fn pushdata1(value: Vec<u8>) -> Option<PushValue> {
    BoundedVec::try_from(value)
        .ok()
        .map(|v| PushValue::LargeValue(LargeValue::OP_PUSHDATA1(v)))
}

/// Fails if the value is longer than 65535 bytes.
pub fn pushdata2(value: Vec<u8>) -> Option<PushValue> {
    BoundedVec::try_from(value)
        .ok()
        .map(|v| PushValue::LargeValue(LargeValue::OP_PUSHDATA2(v)))
}

pub fn pushdata4(value: Vec<u8>) -> Option<PushValue> {
    u32::try_from(value.len())
        .ok()
        .map(|_| PushValue::LargeValue(LargeValue::OP_PUSHDATA4(value)))
}

/// Produces a minimally-encoded data value. Element size limits are enforced when the value is
/// pushed, not here.
pub fn push_value(value: &[u8]) -> Option<PushValue> {
    PushValue::from_slice(value)
}

/// The minimal push of `n` as a script number.
pub fn push_num(n: i64) -> PushValue {
    // A serialized `i64` is at most nine bytes, so it always has an encoding.
    PushValue::from_slice(&num::serialize(n)).unwrap_or(_0)
}
