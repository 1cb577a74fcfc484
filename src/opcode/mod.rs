//! The individual opcodes that form a script, and their classification.

#![allow(non_camel_case_types)]

use alloc::{
    string::{String, ToString},
    vec::Vec,
};
use core::cmp::{max, min};

use ripemd::Ripemd160;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use thiserror::Error;

pub mod push_value;

use crate::{
    external::pubkey::PubKey,
    interpreter::{self, cast_from_bool, cast_to_bool, Environment, Flags, Stack},
    num,
    script::Asm,
    signature,
};
use push_value::{
    LargeValue,
    SmallValue::{self, *},
};

/// Errors that occur while decoding a single opcode.
#[allow(missing_docs)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    #[error("expected {expected_bytes} bytes, but only {available_bytes} bytes available")]
    Read {
        expected_bytes: usize,
        available_bytes: usize,
    },
}

/// The functional group an opcode byte belongs to.
#[allow(missing_docs)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Class {
    PushData,
    FlowControl,
    Stack,
    Splice,
    Bitwise,
    Arithmetic,
    Crypto,
    Expansion,
    /// Template placeholders. They parse and print, but never execute.
    Pseudo,
    Disabled,
    Reserved,
    /// Bytes with no assigned meaning.
    Invalid,
}

/// Classifies any byte. Every one of the 256 values has exactly one class.
pub fn classify(code: u8) -> Class {
    if (0x01..=0x4e).contains(&code) || SmallValue::decode(code).is_some() {
        Class::PushData
    } else if Control::decode(code).is_some() {
        Class::FlowControl
    } else if let Some(op) = Normal::decode(code) {
        op.class()
    } else if Disabled::decode(code).is_some() {
        Class::Disabled
    } else if Pseudo::decode(code).is_some() {
        Class::Pseudo
    } else {
        match Reserved::decode(code) {
            Reserved::Unknown(_) => Class::Invalid,
            _ => Class::Reserved,
        }
    }
}

/// Opcodes that represent constants to be pushed onto the stack.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum PushValue {
    /// Constants that are represented by a single byte.
    SmallValue(SmallValue),
    /// Constants that contain data in addition to the opcode byte.
    LargeValue(LargeValue),
}

impl PushValue {
    /// Produce a minimal `PushValue` for the given data.
    pub(crate) fn from_slice(v: &[u8]) -> Option<PushValue> {
        match v {
            [] => Some(PushValue::SmallValue(OP_0)),
            [0x81] => Some(PushValue::SmallValue(OP_1NEGATE)),
            [n @ 1..=16] => SmallValue::decode(0x50 + n).map(PushValue::SmallValue),
            _ => LargeValue::from_slice(v).map(PushValue::LargeValue),
        }
    }

    /// Returns a number, if the data is no longer than a script number operand.
    pub fn to_num(&self) -> Result<i64, num::Error> {
        match self {
            PushValue::SmallValue(sv) => Ok(sv.to_num().into()),
            PushValue::LargeValue(lv) => lv.to_num(),
        }
    }

    /// The value this opcode pushes onto the stack.
    pub fn value(&self) -> Vec<u8> {
        match self {
            PushValue::SmallValue(sv) => sv.value(),
            PushValue::LargeValue(lv) => lv.value().to_vec(),
        }
    }

    /// Returns false if there is a smaller possible encoding of the provided value.
    pub(crate) fn is_minimal_push(&self) -> bool {
        match self {
            PushValue::SmallValue(_) => true,
            PushValue::LargeValue(lv) => lv.is_minimal_push(),
        }
    }

    /// The number of bytes this requires in a script.
    pub(crate) fn byte_len(&self) -> usize {
        match self {
            PushValue::SmallValue(_) => 1,
            PushValue::LargeValue(lv) => lv.byte_len(),
        }
    }

    pub(crate) fn opcode_byte(&self) -> u8 {
        match self {
            PushValue::SmallValue(sv) => sv.encode(),
            PushValue::LargeValue(lv) => lv.opcode_byte(),
        }
    }

    pub(crate) fn eval(&self, env: &mut Environment<'_>) -> Result<(), interpreter::Error> {
        if env.flags().contains(Flags::MinimalData) && !self.is_minimal_push() {
            return Err(interpreter::Error::MinimalData);
        }
        env.push(self.value())
    }
}

impl From<&PushValue> for Vec<u8> {
    fn from(value: &PushValue) -> Self {
        match value {
            PushValue::SmallValue(v) => vec![v.encode()],
            PushValue::LargeValue(v) => v.into(),
        }
    }
}

impl Asm for PushValue {
    fn to_asm(&self, attempt_sighash_decode: bool) -> String {
        match self {
            PushValue::SmallValue(sv) => sv.to_asm(attempt_sighash_decode),
            PushValue::LargeValue(lv) => lv.to_asm(attempt_sighash_decode),
        }
    }
}

/// The conditional opcodes. The parser folds these into [`crate::script::Branch`] nodes, so they
/// never reach the executor on their own.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
#[allow(missing_docs)]
#[repr(u8)]
pub enum Control {
    OP_IF = 0x63,
    OP_NOTIF = 0x64,
    OP_ELSE = 0x67,
    OP_ENDIF = 0x68,
}

impl Control {
    /// Decodes this opcode from its byte encoding.
    pub(crate) fn decode(b: u8) -> Option<Self> {
        match b {
            0x63 => Some(Self::OP_IF),
            0x64 => Some(Self::OP_NOTIF),
            0x67 => Some(Self::OP_ELSE),
            0x68 => Some(Self::OP_ENDIF),
            _ => None,
        }
    }

    /// Returns the byte encoding of this opcode.
    pub(crate) fn encode(self) -> u8 {
        self as u8
    }
}

/// Operations with executable behavior.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
#[allow(missing_docs)]
#[repr(u8)]
pub enum Normal {
    // control
    OP_NOP = 0x61,
    OP_VERIFY = 0x69,
    OP_RETURN = 0x6a,

    // stack ops
    OP_TOALTSTACK = 0x6b,
    OP_FROMALTSTACK = 0x6c,
    OP_2DROP = 0x6d,
    OP_2DUP = 0x6e,
    OP_3DUP = 0x6f,
    OP_2OVER = 0x70,
    OP_2ROT = 0x71,
    OP_2SWAP = 0x72,
    OP_IFDUP = 0x73,
    OP_DEPTH = 0x74,
    OP_DROP = 0x75,
    OP_DUP = 0x76,
    OP_NIP = 0x77,
    OP_OVER = 0x78,
    OP_PICK = 0x79,
    OP_ROLL = 0x7a,
    OP_ROT = 0x7b,
    OP_SWAP = 0x7c,
    OP_TUCK = 0x7d,

    // splice ops
    OP_SIZE = 0x82,

    // bit logic
    OP_EQUAL = 0x87,
    OP_EQUALVERIFY = 0x88,

    // numeric
    OP_1ADD = 0x8b,
    OP_1SUB = 0x8c,
    OP_NEGATE = 0x8f,
    OP_ABS = 0x90,
    OP_NOT = 0x91,
    OP_0NOTEQUAL = 0x92,

    OP_ADD = 0x93,
    OP_SUB = 0x94,

    OP_BOOLAND = 0x9a,
    OP_BOOLOR = 0x9b,
    OP_NUMEQUAL = 0x9c,
    OP_NUMEQUALVERIFY = 0x9d,
    OP_NUMNOTEQUAL = 0x9e,
    OP_LESSTHAN = 0x9f,
    OP_GREATERTHAN = 0xa0,
    OP_LESSTHANOREQUAL = 0xa1,
    OP_GREATERTHANOREQUAL = 0xa2,
    OP_MIN = 0xa3,
    OP_MAX = 0xa4,

    OP_WITHIN = 0xa5,

    // crypto
    OP_RIPEMD160 = 0xa6,
    OP_SHA1 = 0xa7,
    OP_SHA256 = 0xa8,
    OP_HASH160 = 0xa9,
    OP_HASH256 = 0xaa,
    OP_CHECKSIG = 0xac,
    OP_CHECKSIGVERIFY = 0xad,
    OP_CHECKMULTISIG = 0xae,
    OP_CHECKMULTISIGVERIFY = 0xaf,

    // expansion
    OP_NOP1 = 0xb0,
    OP_CHECKLOCKTIMEVERIFY = 0xb1,
    OP_NOP3 = 0xb2,
    OP_NOP4 = 0xb3,
    OP_NOP5 = 0xb4,
    OP_NOP6 = 0xb5,
    OP_NOP7 = 0xb6,
    OP_NOP8 = 0xb7,
    OP_NOP9 = 0xb8,
    OP_NOP10 = 0xb9,
}

use Normal::*;

impl Normal {
    /// Every operation, in encoding order.
    pub const ALL: [Normal; 64] = [
        OP_NOP,
        OP_VERIFY,
        OP_RETURN,
        OP_TOALTSTACK,
        OP_FROMALTSTACK,
        OP_2DROP,
        OP_2DUP,
        OP_3DUP,
        OP_2OVER,
        OP_2ROT,
        OP_2SWAP,
        OP_IFDUP,
        OP_DEPTH,
        OP_DROP,
        OP_DUP,
        OP_NIP,
        OP_OVER,
        OP_PICK,
        OP_ROLL,
        OP_ROT,
        OP_SWAP,
        OP_TUCK,
        OP_SIZE,
        OP_EQUAL,
        OP_EQUALVERIFY,
        OP_1ADD,
        OP_1SUB,
        OP_NEGATE,
        OP_ABS,
        OP_NOT,
        OP_0NOTEQUAL,
        OP_ADD,
        OP_SUB,
        OP_BOOLAND,
        OP_BOOLOR,
        OP_NUMEQUAL,
        OP_NUMEQUALVERIFY,
        OP_NUMNOTEQUAL,
        OP_LESSTHAN,
        OP_GREATERTHAN,
        OP_LESSTHANOREQUAL,
        OP_GREATERTHANOREQUAL,
        OP_MIN,
        OP_MAX,
        OP_WITHIN,
        OP_RIPEMD160,
        OP_SHA1,
        OP_SHA256,
        OP_HASH160,
        OP_HASH256,
        OP_CHECKSIG,
        OP_CHECKSIGVERIFY,
        OP_CHECKMULTISIG,
        OP_CHECKMULTISIGVERIFY,
        OP_NOP1,
        OP_CHECKLOCKTIMEVERIFY,
        OP_NOP3,
        OP_NOP4,
        OP_NOP5,
        OP_NOP6,
        OP_NOP7,
        OP_NOP8,
        OP_NOP9,
        OP_NOP10,
    ];

    /// Decodes this opcode from its byte encoding.
    pub(crate) fn decode(b: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.encode() == b)
    }

    /// Returns the byte encoding of this opcode.
    pub(crate) fn encode(self) -> u8 {
        self as u8
    }

    /// The functional group of this operation.
    pub fn class(self) -> Class {
        match self.encode() {
            0x61 | 0x69 | 0x6a => Class::FlowControl,
            0x6b..=0x7d => Class::Stack,
            0x82 => Class::Splice,
            0x87 | 0x88 => Class::Bitwise,
            0x8b..=0xa5 => Class::Arithmetic,
            0xa6..=0xaf => Class::Crypto,
            _ => Class::Expansion,
        }
    }

    /// Upper bound on the signature operations performed by this opcode. In the case of
    /// `OP_CHECKMULTISIG*`, it looks at the previous opcode (if provided) to possibly return a more
    /// accurate bound.
    pub(crate) fn sig_op_count(self, last_opcode: Option<&crate::Opcode>, accurate: bool) -> u32 {
        match self {
            OP_CHECKSIG | OP_CHECKSIGVERIFY => 1,
            OP_CHECKMULTISIG | OP_CHECKMULTISIGVERIFY => match last_opcode {
                Some(crate::Opcode::PushValue(PushValue::SmallValue(sv)))
                    if accurate && OP_1 <= *sv =>
                {
                    u32::try_from(sv.to_num()).unwrap_or(u32::from(interpreter::MAX_PUBKEY_COUNT))
                }
                // We don’t know what the previous opcode could be – assume the worst.
                _ => u32::from(interpreter::MAX_PUBKEY_COUNT),
            },
            _ => 0,
        }
    }

    fn is_compressed_or_uncompressed_pub_key(vch_pub_key: &[u8]) -> bool {
        match vch_pub_key.first() {
            Some(0x02 | 0x03) => vch_pub_key.len() == PubKey::COMPRESSED_SIZE,
            Some(0x04) => vch_pub_key.len() == PubKey::SIZE,
            _ => false, // not a public key
        }
    }

    fn check_pub_key_encoding(
        vch_pub_key: &[u8],
        flags: Flags,
    ) -> Result<(), interpreter::Error> {
        if flags.contains(Flags::StrictEnc)
            && !Self::is_compressed_or_uncompressed_pub_key(vch_pub_key)
        {
            return Err(interpreter::Error::PubKeyType);
        };
        Ok(())
    }

    fn is_sig_valid(
        vch_sig: &[u8],
        vch_pub_key: &[u8],
        flags: Flags,
        script_code: &[u8],
        checker: &dyn interpreter::SignatureChecker,
    ) -> Result<bool, interpreter::Error> {
        // With `StrictEnc`, the order signatures and keys are examined in is observable, since
        // either can abort.
        match signature::Decoded::from_bytes(
            vch_sig,
            flags.contains(Flags::LowS),
            flags.contains(Flags::StrictEnc),
        ) {
            signature::Validity::InvalidAbort(e) => Err(interpreter::Error::from(e)),
            signature::Validity::InvalidContinue => {
                Self::check_pub_key_encoding(vch_pub_key, flags)?;
                Ok(false)
            }
            signature::Validity::Valid(sig) => {
                Self::check_pub_key_encoding(vch_pub_key, flags)?;
                Ok(checker.check_sig(&sig, vch_pub_key, script_code))
            }
        }
    }

    fn verify_or_push(
        self,
        verify: bool,
        success: bool,
        stack: &mut Stack<Vec<u8>>,
    ) -> Result<(), interpreter::Error> {
        match (verify, success) {
            (true, true) => Ok(()),
            (true, false) => Err(interpreter::Error::Verify),
            (false, _) => Ok(stack.push(cast_from_bool(success))),
        }
    }

    fn upgradable_nop(flags: Flags) -> Result<(), interpreter::Error> {
        // Callers can reject these ahead of a soft fork that gives them meaning.
        if flags.contains(Flags::DiscourageUpgradableNOPs) {
            Err(interpreter::Error::DiscourageUpgradableNOPs)
        } else {
            Ok(())
        }
    }

    /// Evaluate a single operation. The caller has already counted it.
    pub(crate) fn eval(&self, env: &mut Environment<'_>) -> Result<(), interpreter::Error> {
        let flags = env.flags();
        let require_minimal = flags.contains(Flags::MinimalData);

        let parse_num = |v: &[u8], size: usize| -> Result<i64, interpreter::Error> {
            Ok(num::parse(v, require_minimal, size)?)
        };

        let pop_num = |stack: &mut Stack<Vec<u8>>| -> Result<i64, interpreter::Error> {
            stack.pop().and_then(|v| parse_num(&v, num::MAX_SIZE))
        };

        let unfn_num = |stack: &mut Stack<Vec<u8>>,
                        op: &dyn Fn(i64) -> Vec<u8>|
         -> Result<(), interpreter::Error> {
            stack.unop(|vch| parse_num(&vch, num::MAX_SIZE).map(op))
        };

        let binfn_num = |stack: &mut Stack<Vec<u8>>,
                         op: &dyn Fn(i64, i64) -> Vec<u8>|
         -> Result<(), interpreter::Error> {
            stack.binop(|x1, x2| {
                let bn2 = parse_num(&x2, num::MAX_SIZE)?;
                let bn1 = parse_num(&x1, num::MAX_SIZE)?;
                Ok(op(bn1, bn2))
            })
        };

        let stack = &mut env.stack;
        match self {
            //
            // Control
            //
            OP_NOP => Ok(()),

            OP_VERIFY => {
                // (true -- ) or
                // (false -- false) and return
                if cast_to_bool(&stack.pop()?) {
                    Ok(())
                } else {
                    Err(interpreter::Error::Verify)
                }
            }

            OP_RETURN => Err(interpreter::Error::OpReturn),

            //
            // Stack ops
            //
            OP_TOALTSTACK => stack.pop().map(|v| env.altstack.push(v)),

            OP_FROMALTSTACK => env.altstack.pop().map(|v| stack.push(v)),

            // (x1 x2 -- )
            OP_2DROP => stack.check_len(2).and_then(|()| {
                stack.pop()?;
                stack.pop().map(|_| ())
            }),

            // (x1 x2 -- x1 x2 x1 x2)
            OP_2DUP => stack.check_len(2).and_then(|()| {
                stack.repush(1)?;
                stack.repush(1)
            }),

            // (x1 x2 x3 -- x1 x2 x3 x1 x2 x3)
            OP_3DUP => stack.check_len(3).and_then(|()| {
                (0..3).try_for_each(|_| stack.repush(2))
            }),

            // (x1 x2 x3 x4 -- x1 x2 x3 x4 x1 x2)
            OP_2OVER => stack.check_len(4).and_then(|()| {
                stack.repush(3)?;
                stack.repush(3)
            }),

            // (x1 x2 x3 x4 x5 x6 -- x3 x4 x5 x6 x1 x2)
            OP_2ROT => stack.check_len(6).and_then(|()| {
                stack.move_to_top(5)?;
                stack.move_to_top(5)
            }),

            // (x1 x2 x3 x4 -- x3 x4 x1 x2)
            OP_2SWAP => stack.check_len(4).and_then(|()| {
                stack.move_to_top(3)?;
                stack.move_to_top(3)
            }),

            // (x - 0 | x x)
            OP_IFDUP => stack.rget(0).cloned().map(|v| {
                if cast_to_bool(&v) {
                    stack.push(v)
                }
            }),

            // -- stacksize
            OP_DEPTH => {
                let depth = stack.len() as i64;
                Ok(stack.push(num::serialize(depth)))
            }

            // (x -- )
            OP_DROP => stack.pop().map(|_| ()),

            // (x -- x x)
            OP_DUP => stack.repush(0),

            // (x1 x2 -- x2)
            OP_NIP => stack.check_len(2).and_then(|()| stack.rremove(1).map(|_| ())),

            // (x1 x2 -- x1 x2 x1)
            OP_OVER => stack.repush(1),

            // (xn ... x2 x1 x0 n - xn ... x2 x1 x0 xn)
            // (xn ... x2 x1 x0 n - ... x2 x1 x0 xn)
            OP_PICK | OP_ROLL => {
                stack.check_len(2)?;
                let n = pop_num(stack)?;
                let i = usize::try_from(n)
                    .ok()
                    .filter(|i| *i < stack.len())
                    .ok_or(interpreter::Error::InvalidStackIndex(n))?;
                if *self == OP_ROLL {
                    stack.move_to_top(i)
                } else {
                    stack.repush(i)
                }
            }

            // (x1 x2 x3 -- x2 x3 x1)
            OP_ROT => stack.check_len(3).and_then(|()| stack.move_to_top(2)),

            // (x1 x2 -- x2 x1)
            OP_SWAP => stack.check_len(2).and_then(|()| stack.move_to_top(1)),

            // (x1 x2 -- x2 x1 x2)
            OP_TUCK => {
                stack.check_len(2)?;
                let top = stack.rget(0)?.clone();
                stack.rinsert(1, top)
            }

            // (in -- in size)
            OP_SIZE => {
                let size = stack.rget(0)?.len() as i64;
                Ok(stack.push(num::serialize(size)))
            }

            //
            // Bitwise logic
            //
            // (x1 x2 - bool)
            OP_EQUAL | OP_EQUALVERIFY => {
                let equal = stack.binfn(|x1, x2| Ok(x1 == x2))?;
                self.verify_or_push(*self == OP_EQUALVERIFY, equal, stack)
            }

            //
            // Numeric
            //

            // (in -- out)
            OP_1ADD => unfn_num(stack, &|x| num::serialize(x + 1)),
            OP_1SUB => unfn_num(stack, &|x| num::serialize(x - 1)),
            OP_NEGATE => unfn_num(stack, &|x| num::serialize(-x)),
            OP_ABS => unfn_num(stack, &|x| num::serialize(x.abs())),
            OP_NOT => unfn_num(stack, &|x| cast_from_bool(x == 0)),
            OP_0NOTEQUAL => unfn_num(stack, &|x| cast_from_bool(x != 0)),

            // (x1 x2 -- out)
            OP_ADD => binfn_num(stack, &|x1, x2| num::serialize(x1 + x2)),
            OP_SUB => binfn_num(stack, &|x1, x2| num::serialize(x1 - x2)),
            OP_BOOLAND => binfn_num(stack, &|x1, x2| cast_from_bool(x1 != 0 && x2 != 0)),
            OP_BOOLOR => binfn_num(stack, &|x1, x2| cast_from_bool(x1 != 0 || x2 != 0)),
            OP_NUMEQUAL => binfn_num(stack, &|x1, x2| cast_from_bool(x1 == x2)),
            OP_NUMEQUALVERIFY => {
                binfn_num(stack, &|x1, x2| cast_from_bool(x1 == x2))?;
                let equal = cast_to_bool(&stack.pop()?);
                self.verify_or_push(true, equal, stack)
            }
            OP_NUMNOTEQUAL => binfn_num(stack, &|x1, x2| cast_from_bool(x1 != x2)),
            OP_LESSTHAN => binfn_num(stack, &|x1, x2| cast_from_bool(x1 < x2)),
            OP_GREATERTHAN => binfn_num(stack, &|x1, x2| cast_from_bool(x1 > x2)),
            OP_LESSTHANOREQUAL => binfn_num(stack, &|x1, x2| cast_from_bool(x1 <= x2)),
            OP_GREATERTHANOREQUAL => binfn_num(stack, &|x1, x2| cast_from_bool(x1 >= x2)),
            OP_MIN => binfn_num(stack, &|x1, x2| num::serialize(min(x1, x2))),
            OP_MAX => binfn_num(stack, &|x1, x2| num::serialize(max(x1, x2))),

            // (x min max -- out)
            OP_WITHIN => {
                stack.check_len(3)?;
                // Operands are decoded bottom first, so an encoding error in `x` wins.
                let x = stack.rremove(2).and_then(|v| parse_num(&v, num::MAX_SIZE))?;
                let lower = stack.rremove(1).and_then(|v| parse_num(&v, num::MAX_SIZE))?;
                let upper = pop_num(stack)?;
                Ok(stack.push(cast_from_bool(lower <= x && x < upper)))
            }

            //
            // Crypto
            //

            // (in -- hash)
            OP_RIPEMD160 | OP_SHA1 | OP_SHA256 | OP_HASH160 | OP_HASH256 => {
                let vch = stack.pop()?;
                let hash = match self {
                    OP_RIPEMD160 => Ripemd160::digest(&vch).to_vec(),
                    OP_SHA1 => Sha1::digest(&vch).to_vec(),
                    OP_SHA256 => Sha256::digest(&vch).to_vec(),
                    OP_HASH160 => Ripemd160::digest(Sha256::digest(&vch)).to_vec(),
                    _ => Sha256::digest(Sha256::digest(&vch)).to_vec(),
                };
                Ok(stack.push(hash))
            }

            // (sig pubkey -- bool)
            OP_CHECKSIG | OP_CHECKSIGVERIFY => {
                stack.check_len(2)?;
                let vch_pub_key = stack.pop()?;
                let vch_sig = stack.pop()?;
                let success = Self::is_sig_valid(
                    &vch_sig,
                    &vch_pub_key,
                    flags,
                    env.script_code(),
                    env.checker(),
                )?;
                self.verify_or_push(*self == OP_CHECKSIGVERIFY, success, &mut env.stack)
            }

            // ([sig ...] num_of_signatures [pubkey ...] num_of_pubkeys -- bool)
            OP_CHECKMULTISIG | OP_CHECKMULTISIGVERIFY => {
                let success = Self::check_multisig(env)?;
                self.verify_or_push(*self == OP_CHECKMULTISIGVERIFY, success, &mut env.stack)
            }

            //
            // Expansion
            //

            // (lt -- lt)
            OP_CHECKLOCKTIMEVERIFY => {
                if flags.contains(Flags::CheckLockTimeVerify) {
                    // Lock times are allowed one more byte than other numeric operands, so that
                    // they reach past 2038. That is still beyond the `u32` range of the field.
                    let lock_time = stack.rget(0).and_then(|v| parse_num(v, 5))?;
                    if lock_time < 0 {
                        Err(interpreter::Error::NegativeLockTime)
                    } else if env.checker().check_lock_time(lock_time) {
                        Ok(())
                    } else {
                        Err(interpreter::Error::UnsatisfiedLockTime)
                    }
                } else {
                    Self::upgradable_nop(flags)
                }
            }

            OP_NOP1 | OP_NOP3 | OP_NOP4 | OP_NOP5 | OP_NOP6 | OP_NOP7 | OP_NOP8 | OP_NOP9
            | OP_NOP10 => Self::upgradable_nop(flags),
        }
    }

    /// Runs the body of `OP_CHECKMULTISIG`, leaving the stack without its arguments and
    /// returning whether every signature matched.
    fn check_multisig(env: &mut Environment<'_>) -> Result<bool, interpreter::Error> {
        let flags = env.flags();
        let require_minimal = flags.contains(Flags::MinimalData);

        let keys_num = env
            .stack
            .pop()
            .and_then(|v| Ok(num::parse(&v, require_minimal, num::MAX_SIZE)?))?;
        let keys_count = u8::try_from(keys_num)
            .ok()
            .filter(|n| *n <= interpreter::MAX_PUBKEY_COUNT)
            .ok_or(interpreter::Error::PubKeyCount(keys_num))?;
        env.increment_op_count(usize::from(keys_count))?;

        let sigs_num = env
            .stack
            .rget(usize::from(keys_count))
            .and_then(|v| Ok(num::parse(v, require_minimal, num::MAX_SIZE)?))?;
        let sigs_count = u8::try_from(sigs_num)
            .ok()
            .filter(|n| *n <= keys_count)
            .ok_or(interpreter::Error::SigCount(sigs_num))?;

        // keys, the signature count, signatures and the dummy element
        let args = usize::from(keys_count) + 1 + usize::from(sigs_count);
        env.stack.check_len(args + 1)?;

        let (script_code, checker) = (env.script_code(), env.checker());
        let (mut keys_left, mut sigs_left) = (keys_count, sigs_count);
        let (mut ikey, mut isig) = (0, usize::from(keys_count) + 1);
        let mut success = true;
        while success && sigs_left > 0 {
            let vch_sig = env.stack.rget(isig)?;
            let vch_pub_key = env.stack.rget(ikey)?;
            if Self::is_sig_valid(vch_sig, vch_pub_key, flags, script_code, checker)? {
                isig += 1;
                sigs_left -= 1;
            }
            ikey += 1;
            keys_left -= 1;

            // If there are more signatures left than keys left, then too many signatures have
            // failed. Exit early, without checking any further signatures.
            success = sigs_left <= keys_left;
        }

        for _ in 0..args {
            env.stack.pop()?;
        }

        // The extra argument is consumed without being checked, unless `NullDummy` requires it to
        // be empty.
        let dummy = env.stack.pop()?;
        if flags.contains(Flags::NullDummy) && !dummy.is_empty() {
            return Err(interpreter::Error::SigNullDummy);
        }

        Ok(success)
    }
}

impl Asm for Normal {
    fn to_asm(&self, _attempt_sighash_decode: bool) -> String {
        format!("{:?}", self)
    }
}

/// Opcodes that were removed from the language. A script containing one never parses.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
#[allow(missing_docs)]
#[repr(u8)]
pub enum Disabled {
    OP_CAT = 0x7e,
    OP_SUBSTR = 0x7f,
    OP_LEFT = 0x80,
    OP_RIGHT = 0x81,
    OP_INVERT = 0x83,
    OP_AND = 0x84,
    OP_OR = 0x85,
    OP_XOR = 0x86,
    OP_2MUL = 0x8d,
    OP_2DIV = 0x8e,
    OP_MUL = 0x95,
    OP_DIV = 0x96,
    OP_MOD = 0x97,
    OP_LSHIFT = 0x98,
    OP_RSHIFT = 0x99,
    OP_CODESEPARATOR = 0xab,
}

impl Disabled {
    const ALL: [Disabled; 16] = [
        Self::OP_CAT,
        Self::OP_SUBSTR,
        Self::OP_LEFT,
        Self::OP_RIGHT,
        Self::OP_INVERT,
        Self::OP_AND,
        Self::OP_OR,
        Self::OP_XOR,
        Self::OP_2MUL,
        Self::OP_2DIV,
        Self::OP_MUL,
        Self::OP_DIV,
        Self::OP_MOD,
        Self::OP_LSHIFT,
        Self::OP_RSHIFT,
        Self::OP_CODESEPARATOR,
    ];

    pub(crate) fn decode(b: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.encode() == b)
    }

    pub(crate) fn encode(self) -> u8 {
        self as u8
    }
}

/// Opcodes that only fail if they are executed, plus every byte with no assigned meaning.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
#[allow(missing_docs)]
pub enum Reserved {
    OP_RESERVED,
    OP_VER,
    /// Unlike the others, this fails even on an untaken branch, so it never parses.
    OP_VERIF,
    /// See [`Reserved::OP_VERIF`].
    OP_VERNOTIF,
    OP_RESERVED1,
    OP_RESERVED2,
    Unknown(u8),
}

impl Reserved {
    /// Total over bytes that no other opcode type claims.
    pub(crate) fn decode(b: u8) -> Self {
        match b {
            0x50 => Self::OP_RESERVED,
            0x62 => Self::OP_VER,
            0x65 => Self::OP_VERIF,
            0x66 => Self::OP_VERNOTIF,
            0x89 => Self::OP_RESERVED1,
            0x8a => Self::OP_RESERVED2,
            _ => Self::Unknown(b),
        }
    }

    pub(crate) fn encode(self) -> u8 {
        match self {
            Self::OP_RESERVED => 0x50,
            Self::OP_VER => 0x62,
            Self::OP_VERIF => 0x65,
            Self::OP_VERNOTIF => 0x66,
            Self::OP_RESERVED1 => 0x89,
            Self::OP_RESERVED2 => 0x8a,
            Self::Unknown(byte) => byte,
        }
    }

    /// Whether [`Flags::DeferReserved`] can postpone the failure to execution.
    pub(crate) fn is_deferrable(self) -> bool {
        !matches!(self, Self::OP_VERIF | Self::OP_VERNOTIF)
    }
}

impl Asm for Reserved {
    fn to_asm(&self, _attempt_sighash_decode: bool) -> String {
        match self {
            Self::Unknown(_) => "OP_UNKNOWN".to_string(),
            _ => format!("{:?}", self),
        }
    }
}

/// Placeholders used by script templates. They have a wire encoding so templates can be stored
/// and printed, but they never execute.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
#[allow(missing_docs)]
#[repr(u8)]
pub enum Pseudo {
    OP_SMALLDATA = 0xf9,
    OP_SMALLINTEGER = 0xfa,
    OP_PUBKEYS = 0xfb,
    OP_PUBKEYHASH = 0xfd,
    OP_PUBKEY = 0xfe,
    OP_INVALIDOPCODE = 0xff,
}

impl Pseudo {
    pub(crate) fn decode(b: u8) -> Option<Self> {
        match b {
            0xf9 => Some(Self::OP_SMALLDATA),
            0xfa => Some(Self::OP_SMALLINTEGER),
            0xfb => Some(Self::OP_PUBKEYS),
            0xfd => Some(Self::OP_PUBKEYHASH),
            0xfe => Some(Self::OP_PUBKEY),
            0xff => Some(Self::OP_INVALIDOPCODE),
            _ => None,
        }
    }

    pub(crate) fn encode(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::{classify, Class, Disabled, Normal, Pseudo, Reserved};
    use crate::{
        interpreter::{self, Error, Flags, SignatureChecker},
        op, pv, signature, testing, Opcode,
    };

    #[test]
    fn classification_is_total() {
        let mut counts = [0usize; 12];
        for byte in 0..=u8::MAX {
            let index = match classify(byte) {
                Class::PushData => 0,
                Class::FlowControl => 1,
                Class::Stack => 2,
                Class::Splice => 3,
                Class::Bitwise => 4,
                Class::Arithmetic => 5,
                Class::Crypto => 6,
                Class::Expansion => 7,
                Class::Pseudo => 8,
                Class::Disabled => 9,
                Class::Reserved => 10,
                Class::Invalid => 11,
            };
            counts[index] += 1;
        }
        assert_eq!(counts.iter().sum::<usize>(), 256);
        // 0x00, 0x01–0x4e, 0x4f, 0x51–0x60
        assert_eq!(counts[0], 96);
        assert_eq!(counts[1], 7);
        assert_eq!(counts[8], 6);
        assert_eq!(counts[9], 16);
        assert_eq!(counts[10], 6);
        // 0xba–0xf8, 0xfc
        assert_eq!(counts[11], 64);
    }

    #[test]
    fn classification_spot_checks() {
        assert_eq!(classify(0x4c), Class::PushData);
        assert_eq!(classify(0x63), Class::FlowControl);
        assert_eq!(classify(0x6a), Class::FlowControl);
        assert_eq!(classify(0x76), Class::Stack);
        assert_eq!(classify(0x82), Class::Splice);
        assert_eq!(classify(0x88), Class::Bitwise);
        assert_eq!(classify(0x93), Class::Arithmetic);
        assert_eq!(classify(0xa9), Class::Crypto);
        assert_eq!(classify(0xb1), Class::Expansion);
        assert_eq!(classify(0xab), Class::Disabled);
        assert_eq!(classify(0x50), Class::Reserved);
        assert_eq!(classify(0xfe), Class::Pseudo);
        assert_eq!(classify(0xfc), Class::Invalid);
    }

    #[test]
    fn single_byte_opcodes_round_trip() {
        for byte in (0..=u8::MAX).filter(|b| !(0x01..=0x4e).contains(b)) {
            let bytes = [byte];
            let (opcode, rem) = Opcode::parse(&bytes).expect("single byte opcodes always decode");
            assert!(rem.is_empty());
            assert_eq!(Vec::from(&opcode), vec![byte], "0x{:02x}", byte);
        }
        assert_eq!(Normal::decode(0xb9), Some(Normal::OP_NOP10));
        assert_eq!(Disabled::decode(0xab), Some(Disabled::OP_CODESEPARATOR));
        assert_eq!(Pseudo::decode(0xfc), None);
        assert_eq!(Reserved::decode(0xfc), Reserved::Unknown(0xfc));
    }

    #[test]
    fn stack_operations() {
        assert_eq!(
            testing::run(&[op::_1, op::_2, op::_3, op::ROT]),
            Ok(vec![vec![2], vec![3], vec![1]])
        );
        assert_eq!(
            testing::run(&[op::_1, op::_2, op::TUCK]),
            Ok(vec![vec![2], vec![1], vec![2]])
        );
        assert_eq!(
            testing::run(&[op::_1, op::_2, op::_3, op::_4, op::_2SWAP]),
            Ok(vec![vec![3], vec![4], vec![1], vec![2]])
        );
        assert_eq!(
            testing::run(&[op::_5, op::_6, op::_7, op::_2, op::PICK]),
            Ok(vec![vec![5], vec![6], vec![7], vec![5]])
        );
        assert_eq!(
            testing::run(&[op::_5, op::_6, op::_7, op::_2, op::ROLL]),
            Ok(vec![vec![6], vec![7], vec![5]])
        );
        assert_eq!(
            testing::run(&[op::_0, op::IFDUP, op::DEPTH]),
            Ok(vec![vec![], vec![1]])
        );
        assert_eq!(
            testing::run(&[op::_1, op::_2, op::TOALTSTACK, op::DUP, op::FROMALTSTACK]),
            Ok(vec![vec![1], vec![1], vec![2]])
        );
    }

    #[test]
    fn pick_rejects_out_of_range_indices() {
        assert_eq!(
            testing::run(&[op::_1, op::_1, op::PICK]),
            Err(Error::InvalidStackIndex(1))
        );
        assert_eq!(
            testing::run(&[op::_1, op::_1NEGATE, op::ROLL]),
            Err(Error::InvalidStackIndex(-1))
        );
        assert_eq!(
            testing::run(&[op::_1, op::SWAP]),
            Err(Error::StackUnderflow { index: 1, len: 1 })
        );
    }

    #[test]
    fn arithmetic() {
        assert_eq!(
            testing::run(&[op::_2, op::_3, op::ADD, op::_16, op::SUB]),
            Ok(vec![vec![0x8b]])
        );
        assert_eq!(
            testing::run(&[op::_1NEGATE, op::ABS, op::NEGATE, op::_1ADD, op::NOT]),
            Ok(vec![vec![1]])
        );
        assert_eq!(
            testing::run(&[op::_3, op::_2, op::_4, op::WITHIN]),
            Ok(vec![vec![1]])
        );
        assert_eq!(
            testing::run(&[op::_4, op::_2, op::_4, op::WITHIN]),
            Ok(vec![vec![]])
        );
        assert_eq!(testing::run(&[op::_7, op::_9, op::MIN]), Ok(vec![vec![7]]));
        assert_eq!(
            testing::run(&[op::_7, op::_9, op::NUMEQUALVERIFY]),
            Err(Error::Verify)
        );
    }

    #[test]
    fn arithmetic_operands_are_limited_to_four_bytes() {
        let five_bytes = pv::push_value(&[0, 0, 0, 0, 1]).expect("small push");
        assert!(matches!(
            testing::run(&[Opcode::PushValue(five_bytes), op::_1ADD]),
            Err(Error::Num(_))
        ));
    }

    #[test]
    fn hashes() {
        // SHA-256 of the empty string.
        let stack = testing::run(&[op::_0, op::SHA256]).expect("hashes");
        assert_eq!(
            stack,
            vec![hex::decode("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
                .expect("valid hex")]
        );
        let stack = testing::run(&[op::_0, op::HASH160]).expect("hashes");
        assert_eq!(
            stack,
            vec![hex::decode("b472a266d0bd89c13706a4132ccfb16f7c3b9fcb").expect("valid hex")]
        );
    }

    #[test]
    fn return_and_verify() {
        assert_eq!(testing::run(&[op::RETURN]), Err(Error::OpReturn));
        assert_eq!(testing::run(&[op::_0, op::VERIFY]), Err(Error::Verify));
        assert_eq!(testing::run(&[op::_1, op::VERIFY]), Ok(vec![]));
        assert_eq!(
            testing::run(&[op::_1, op::_2, op::EQUALVERIFY]),
            Err(Error::Verify)
        );
    }

    #[test]
    fn upgradable_nops_can_be_discouraged() {
        assert_eq!(testing::run(&[op::NOP1, op::NOP10]), Ok(vec![]));
        assert_eq!(
            testing::run_with(&[op::NOP5], Flags::DiscourageUpgradableNOPs),
            Err(Error::DiscourageUpgradableNOPs)
        );
        // Without the flag, CHECKLOCKTIMEVERIFY behaves like NOP2.
        assert_eq!(testing::run(&[op::CHECKLOCKTIMEVERIFY]), Ok(vec![]));
        assert_eq!(
            testing::run_with(&[op::_1NEGATE, op::CHECKLOCKTIMEVERIFY], Flags::CheckLockTimeVerify),
            Err(Error::NegativeLockTime)
        );
        assert_eq!(
            testing::run_with(&[op::_1, op::CHECKLOCKTIMEVERIFY], Flags::CheckLockTimeVerify),
            Err(Error::UnsatisfiedLockTime)
        );
    }

    #[test]
    fn minimal_data_rejects_oversized_pushes() {
        let padded = op::pushdata1(vec![0xaa]).expect("fits");
        assert_eq!(testing::run(&[padded.clone()]), Ok(vec![vec![0xaa]]));
        assert_eq!(
            testing::run_with(&[padded], Flags::MinimalData),
            Err(Error::MinimalData)
        );
    }

    /// Accepts any well-formed signature against the key `[0x02; 33]`.
    struct MarkerKeyChecker;

    impl SignatureChecker for MarkerKeyChecker {
        fn check_sig(
            &self,
            _script_sig: &signature::Decoded,
            vch_pub_key: &[u8],
            _script_code: &[u8],
        ) -> bool {
            vch_pub_key == [0x02; 33]
        }

        fn check_lock_time(&self, _lock_time: i64) -> bool {
            true
        }
    }

    /// `r = 1`, `s = 1`, followed by `SIGHASH_ALL`.
    const SIG: [u8; 9] = [0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x01, 0x01];

    fn multisig(keys: &[[u8; 33]], sigs: usize, required: Opcode) -> Vec<Opcode> {
        let mut ops = vec![op::_0];
        ops.extend((0..sigs).map(|_| op::pushdata_bytelength(SIG.to_vec()).expect("fits")));
        ops.push(required);
        ops.extend(keys.iter().map(|k| op::pushdata_bytelength(k.to_vec()).expect("fits")));
        ops.push(op::push_num(keys.len() as i64));
        ops.push(op::CHECKMULTISIG);
        ops
    }

    #[test]
    fn checkmultisig_matches_signatures_in_order() {
        let good = [0x02; 33];
        let bad = [0x03; 33];
        let checker = MarkerKeyChecker;

        let ops = multisig(&[bad, good], 1, op::_1);
        assert_eq!(
            testing::run_checked(&ops, Flags::empty(), &checker),
            Ok(vec![vec![1]])
        );

        // Two signatures can’t both be satisfied by one good key.
        let ops = multisig(&[bad, good], 2, op::_2);
        assert_eq!(
            testing::run_checked(&ops, Flags::empty(), &checker),
            Ok(vec![vec![]])
        );
    }

    #[test]
    fn checkmultisig_counts() {
        let checker = MarkerKeyChecker;
        let ops = [op::_0, op::_1, op::_0, op::CHECKMULTISIG];
        assert_eq!(
            testing::run_checked(&ops, Flags::empty(), &checker),
            Err(Error::SigCount(1))
        );
        let ops = [op::_0, op::_0, op::push_num(21), op::CHECKMULTISIG];
        assert_eq!(
            testing::run_checked(&ops, Flags::empty(), &checker),
            Err(Error::PubKeyCount(21))
        );
        let ops = [op::_1, op::_0, op::_0, op::CHECKMULTISIG];
        assert_eq!(
            testing::run_checked(&ops, Flags::NullDummy, &checker),
            Err(Error::SigNullDummy)
        );
        assert_eq!(
            testing::run_checked(&ops, Flags::empty(), &checker),
            Ok(vec![vec![1]])
        );
    }

    #[test]
    fn checkmultisig_counts_its_keys_as_operations() {
        let keys: Vec<_> = (0..20).map(|_| [0x02; 33]).collect();
        let ops = multisig(&keys, 0, op::_0);
        let limits = interpreter::Limits {
            max_op_count: 20,
            ..interpreter::Limits::default()
        };
        assert_eq!(
            testing::run_limited(&ops, limits),
            Err(Error::ResourceLimitExceeded(
                interpreter::Limit::OpCount { max: 20 }
            ))
        );
    }

    #[test]
    fn checksig_with_strict_encoding() {
        let checker = MarkerKeyChecker;
        let ops = [
            op::pushdata_bytelength(SIG.to_vec()).expect("fits"),
            op::pushdata_bytelength(vec![0x02; 33]).expect("fits"),
            op::CHECKSIG,
        ];
        assert_eq!(
            testing::run_checked(&ops, Flags::StrictEnc, &checker),
            Ok(vec![vec![1]])
        );
        let ops = [
            op::pushdata_bytelength(SIG.to_vec()).expect("fits"),
            op::pushdata_bytelength(vec![0x02; 32]).expect("fits"),
            op::CHECKSIG,
        ];
        assert_eq!(
            testing::run_checked(&ops, Flags::StrictEnc, &checker),
            Err(Error::PubKeyType)
        );
        // An empty signature is simply false.
        let ops = [op::_0, op::pushdata_bytelength(vec![0x02; 33]).expect("fits"), op::CHECKSIGVERIFY];
        assert_eq!(
            testing::run_checked(&ops, Flags::empty(), &checker),
            Err(Error::Verify)
        );
    }

    #[test]
    fn non_executable_opcodes() {
        for ops in [
            [Opcode::Pseudo(Pseudo::OP_PUBKEY)],
            [Opcode::Reserved(Reserved::OP_RESERVED)],
            [Opcode::Reserved(Reserved::Unknown(0xc0))],
        ] {
            let byte = Vec::from(&ops[0])[0];
            assert_eq!(
                testing::run_with(&ops, Flags::DeferReserved),
                Err(Error::InvalidOpcodeExecution(byte))
            );
        }
    }
}
