//! Convenience definitions for all opcodes.

#![allow(missing_docs)]

use alloc::vec::Vec;

use crate::{
    opcode::{Control::*, Normal::*},
    pv, Opcode,
};

use Opcode::{Control, Normal, PushValue};

pub const _0: Opcode = PushValue(pv::_0);
pub const _1NEGATE: Opcode = PushValue(pv::_1NEGATE);
pub const _1: Opcode = PushValue(pv::_1);
pub const _2: Opcode = PushValue(pv::_2);
pub const _3: Opcode = PushValue(pv::_3);
pub const _4: Opcode = PushValue(pv::_4);
pub const _5: Opcode = PushValue(pv::_5);
pub const _6: Opcode = PushValue(pv::_6);
pub const _7: Opcode = PushValue(pv::_7);
pub const _8: Opcode = PushValue(pv::_8);
pub const _9: Opcode = PushValue(pv::_9);
pub const _10: Opcode = PushValue(pv::_10);
pub const _11: Opcode = PushValue(pv::_11);
pub const _12: Opcode = PushValue(pv::_12);
pub const _13: Opcode = PushValue(pv::_13);
pub const _14: Opcode = PushValue(pv::_14);
pub const _15: Opcode = PushValue(pv::_15);
pub const _16: Opcode = PushValue(pv::_16);

pub fn pushdata_bytelength(value: Vec<u8>) -> Option<Opcode> {
    pv::pushdata_bytelength(value).map(PushValue)
}

pub fn pushdata1(value: Vec<u8>) -> Option<Opcode> {
    pv::pushdata1(value).map(PushValue)
}

pub fn pushdata2(value: Vec<u8>) -> Option<Opcode> {
    pv::pushdata2(value).map(PushValue)
}

pub fn pushdata4(value: Vec<u8>) -> Option<Opcode> {
    pv::pushdata4(value).map(PushValue)
}

/// The minimal push of `n` as a script number.
pub fn push_num(n: i64) -> Opcode {
    PushValue(pv::push_num(n))
}

pub const IF: Opcode = Control(OP_IF);
pub const NOTIF: Opcode = Control(OP_NOTIF);
pub const ELSE: Opcode = Control(OP_ELSE);
pub const ENDIF: Opcode = Control(OP_ENDIF);
pub const NOP: Opcode = Normal(OP_NOP);
pub const VERIFY: Opcode = Normal(OP_VERIFY);
pub const RETURN: Opcode = Normal(OP_RETURN);
pub const TOALTSTACK: Opcode = Normal(OP_TOALTSTACK);
pub const FROMALTSTACK: Opcode = Normal(OP_FROMALTSTACK);
pub const _2DROP: Opcode = Normal(OP_2DROP);
pub const _2DUP: Opcode = Normal(OP_2DUP);
pub const _3DUP: Opcode = Normal(OP_3DUP);
pub const _2OVER: Opcode = Normal(OP_2OVER);
pub const _2ROT: Opcode = Normal(OP_2ROT);
pub const _2SWAP: Opcode = Normal(OP_2SWAP);
pub const IFDUP: Opcode = Normal(OP_IFDUP);
pub const DEPTH: Opcode = Normal(OP_DEPTH);
pub const DROP: Opcode = Normal(OP_DROP);
pub const DUP: Opcode = Normal(OP_DUP);
pub const NIP: Opcode = Normal(OP_NIP);
pub const OVER: Opcode = Normal(OP_OVER);
pub const PICK: Opcode = Normal(OP_PICK);
pub const ROLL: Opcode = Normal(OP_ROLL);
pub const ROT: Opcode = Normal(OP_ROT);
pub const SWAP: Opcode = Normal(OP_SWAP);
pub const TUCK: Opcode = Normal(OP_TUCK);
pub const SIZE: Opcode = Normal(OP_SIZE);
pub const EQUAL: Opcode = Normal(OP_EQUAL);
pub const EQUALVERIFY: Opcode = Normal(OP_EQUALVERIFY);
pub const _1ADD: Opcode = Normal(OP_1ADD);
pub const _1SUB: Opcode = Normal(OP_1SUB);
pub const NEGATE: Opcode = Normal(OP_NEGATE);
pub const ABS: Opcode = Normal(OP_ABS);
pub const NOT: Opcode = Normal(OP_NOT);
pub const _0NOTEQUAL: Opcode = Normal(OP_0NOTEQUAL);
pub const ADD: Opcode = Normal(OP_ADD);
pub const SUB: Opcode = Normal(OP_SUB);
pub const BOOLAND: Opcode = Normal(OP_BOOLAND);
pub const BOOLOR: Opcode = Normal(OP_BOOLOR);
pub const NUMEQUAL: Opcode = Normal(OP_NUMEQUAL);
pub const NUMEQUALVERIFY: Opcode = Normal(OP_NUMEQUALVERIFY);
pub const NUMNOTEQUAL: Opcode = Normal(OP_NUMNOTEQUAL);
pub const LESSTHAN: Opcode = Normal(OP_LESSTHAN);
pub const GREATERTHAN: Opcode = Normal(OP_GREATERTHAN);
pub const LESSTHANOREQUAL: Opcode = Normal(OP_LESSTHANOREQUAL);
pub const GREATERTHANOREQUAL: Opcode = Normal(OP_GREATERTHANOREQUAL);
pub const MIN: Opcode = Normal(OP_MIN);
pub const MAX: Opcode = Normal(OP_MAX);
pub const WITHIN: Opcode = Normal(OP_WITHIN);
pub const RIPEMD160: Opcode = Normal(OP_RIPEMD160);
pub const SHA1: Opcode = Normal(OP_SHA1);
pub const SHA256: Opcode = Normal(OP_SHA256);
pub const HASH160: Opcode = Normal(OP_HASH160);
pub const HASH256: Opcode = Normal(OP_HASH256);
pub const CHECKSIG: Opcode = Normal(OP_CHECKSIG);
pub const CHECKSIGVERIFY: Opcode = Normal(OP_CHECKSIGVERIFY);
pub const CHECKMULTISIG: Opcode = Normal(OP_CHECKMULTISIG);
pub const CHECKMULTISIGVERIFY: Opcode = Normal(OP_CHECKMULTISIGVERIFY);
pub const NOP1: Opcode = Normal(OP_NOP1);
pub const CHECKLOCKTIMEVERIFY: Opcode = Normal(OP_CHECKLOCKTIMEVERIFY);
pub const NOP3: Opcode = Normal(OP_NOP3);
pub const NOP4: Opcode = Normal(OP_NOP4);
pub const NOP5: Opcode = Normal(OP_NOP5);
pub const NOP6: Opcode = Normal(OP_NOP6);
pub const NOP7: Opcode = Normal(OP_NOP7);
pub const NOP8: Opcode = Normal(OP_NOP8);
pub const NOP9: Opcode = Normal(OP_NOP9);
pub const NOP10: Opcode = Normal(OP_NOP10);
