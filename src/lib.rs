//! A parser and interpreter for transparent locking and unlocking scripts.
//!
//! Scripts are parsed once into an [`script::OperationList`], with every conditional collapsed
//! into a [`script::Branch`], and then run by [`interpreter::execute`]. [`verify::verify`] ties
//! the two together the way a transaction validator would.

#![no_std]
#![doc(html_root_url = "https://docs.rs/coin_script/0.1.0")]
#![allow(clippy::unit_arg)]
#![allow(non_snake_case)]
#![deny(missing_docs)]

#[macro_use]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

mod external;
pub mod interpreter;
pub mod num;
pub mod op;
pub mod opcode;
pub mod printer;
pub mod pv;
pub mod script;
pub mod signature;
pub mod verify;

use alloc::{string::String, vec::Vec};
use core::fmt;

use tracing::trace;

use opcode::{push_value::LargeValue, PushValue};
use script::Asm;

pub use interpreter::Error as ExecError;
pub use script::Error as ParseError;

/// Script opcodes
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Opcode {
    /// Opcodes that represent constants to be pushed onto the stack.
    PushValue(opcode::PushValue),
    /// Conditionals. These only exist until parsing folds them into branches.
    Control(opcode::Control),
    /// Every opcode with a defined behavior other than pushing a constant.
    Normal(opcode::Normal),
    /// Template placeholders.
    Pseudo(opcode::Pseudo),
    /// Reserved and unassigned bytes.
    Reserved(opcode::Reserved),
    /// Opcodes that were once defined, but are now rejected wherever they appear.
    Disabled(opcode::Disabled),
}

impl Opcode {
    /// This parses a single opcode from a byte stream, returning the bytes that follow it.
    ///
    /// Every byte decodes to some opcode, so this only fails when a push runs past the end of the
    /// stream. Whether the opcode may appear in a script is decided by [`script::parse`].
    pub fn parse(script: &[u8]) -> Result<(Opcode, &[u8]), opcode::Error> {
        let (leading_byte, rest) = script.split_first().ok_or(opcode::Error::Read {
            expected_bytes: 1,
            available_bytes: 0,
        })?;
        match LargeValue::parse(*leading_byte, rest) {
            Some(res) => res.map(|(lv, rem)| (Opcode::PushValue(PushValue::LargeValue(lv)), rem)),
            None => Ok((Self::decode(*leading_byte), rest)),
        }
    }

    fn decode(b: u8) -> Self {
        opcode::push_value::SmallValue::decode(b)
            .map(|sv| Opcode::PushValue(PushValue::SmallValue(sv)))
            .or_else(|| opcode::Control::decode(b).map(Opcode::Control))
            .or_else(|| opcode::Normal::decode(b).map(Opcode::Normal))
            .or_else(|| opcode::Disabled::decode(b).map(Opcode::Disabled))
            .or_else(|| opcode::Pseudo::decode(b).map(Opcode::Pseudo))
            .unwrap_or_else(|| Opcode::Reserved(opcode::Reserved::decode(b)))
    }

    /// The byte that identifies this opcode on the wire.
    pub fn leading_byte(&self) -> u8 {
        match self {
            Opcode::PushValue(pv) => pv.opcode_byte(),
            Opcode::Control(v) => v.encode(),
            Opcode::Normal(v) => v.encode(),
            Opcode::Pseudo(v) => v.encode(),
            Opcode::Reserved(v) => v.encode(),
            Opcode::Disabled(v) => v.encode(),
        }
    }

    /// The class [`opcode::classify`] assigns to this opcode.
    pub fn class(&self) -> opcode::Class {
        opcode::classify(self.leading_byte())
    }

    /// Whether this opcode may appear in a script parsed under `flags`, regardless of whether it
    /// is ever executed.
    pub(crate) fn is_allowed(&self, flags: interpreter::Flags) -> bool {
        match self {
            Opcode::Disabled(_) => false,
            Opcode::Reserved(r) => {
                flags.contains(interpreter::Flags::DeferReserved) && r.is_deferrable()
            }
            _ => true,
        }
    }

    /// Runs a single (non-branch) opcode.
    pub(crate) fn eval(
        &self,
        env: &mut interpreter::Environment<'_>,
    ) -> Result<(), interpreter::Error> {
        match self {
            Opcode::PushValue(pv) => pv.eval(env),
            Opcode::Normal(op) => {
                env.increment_op_count(1)?;
                trace!(opcode = ?op, op_count = env.op_count(), "executing");
                op.eval(env)
            }
            _ => Err(interpreter::Error::InvalidOpcodeExecution(
                self.leading_byte(),
            )),
        }
    }

    /// See [`script::OperationList::sig_op_count`].
    pub(crate) fn sig_op_count(&self, last_opcode: Option<&Opcode>, accurate: bool) -> u32 {
        match self {
            Opcode::Normal(op) => op.sig_op_count(last_opcode, accurate),
            _ => 0,
        }
    }
}

impl From<opcode::PushValue> for Opcode {
    fn from(value: opcode::PushValue) -> Self {
        Opcode::PushValue(value)
    }
}

impl From<opcode::Control> for Opcode {
    fn from(value: opcode::Control) -> Self {
        Opcode::Control(value)
    }
}

impl From<opcode::Normal> for Opcode {
    fn from(value: opcode::Normal) -> Self {
        Opcode::Normal(value)
    }
}

impl From<&Opcode> for Vec<u8> {
    fn from(value: &Opcode) -> Self {
        match value {
            Opcode::PushValue(v) => v.into(),
            _ => vec![value.leading_byte()],
        }
    }
}

impl Asm for Opcode {
    fn to_asm(&self, attempt_sighash_decode: bool) -> String {
        match self {
            Opcode::PushValue(v) => v.to_asm(attempt_sighash_decode),
            Opcode::Normal(v) => v.to_asm(attempt_sighash_decode),
            Opcode::Reserved(v) => v.to_asm(attempt_sighash_decode),
            Opcode::Control(v) => format!("{:?}", v),
            Opcode::Pseudo(v) => format!("{:?}", v),
            Opcode::Disabled(v) => format!("{:?}", v),
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_asm(false))
    }
}

/// Fixtures shared by the unit tests, the integration tests and downstream crates.
#[cfg(any(test, feature = "test-dependencies"))]
pub mod testing {
    use alloc::vec::Vec;

    use hex::FromHex;

    use crate::{
        interpreter::{self, Environment, Flags, Limits, SignatureChecker},
        op,
        script::{self, OperationList},
        signature::HashType,
        Opcode,
    };

    /// A `usize` one larger than the longest allowed script, for testing bounds.
    pub const OVERFLOW_SCRIPT_SIZE: usize = script::Code::MAX_SIZE + 1;

    lazy_static::lazy_static! {
        /// A 2-of-3 multisig locking script.
        pub static ref LOCKING_SCRIPT: Vec<u8> = serialize(&[
            op::_2,
            op::pushdata_bytelength(<Vec<u8>>::from_hex("03b2cc71d23eb30020a4893982a1e2d352da0d20ee657fa02901c432758909ed8f").expect("valid key")).expect("fits"),
            op::pushdata_bytelength(<Vec<u8>>::from_hex("029d1e9a9354c0d2aee9ffd0f0cea6c39bbf98c4066cf143115ba2279d0ba7dabe").expect("valid key")).expect("fits"),
            op::pushdata_bytelength(<Vec<u8>>::from_hex("03e32096b63fd57f3308149d238dcbb24d8d28aad95c0e4e74e3e5e6a11b61bcc4").expect("valid key")).expect("fits"),
            op::_3,
            op::CHECKMULTISIG,
        ]);
        /// Spends [`struct@LOCKING_SCRIPT`] with signatures from its first two keys.
        pub static ref UNLOCKING_SCRIPT: Vec<u8> = serialize(&[
            op::_0,
            op::pushdata_bytelength(<Vec<u8>>::from_hex("3045022100d2ab3e6258fe244fa442cfb38f6cef9ac9a18c54e70b2f508e83fa87e20d040502200eead947521de943831d07a350e45af8e36c2166984a8636f0a8811ff03ed09401").expect("valid sig")).expect("fits"),
            op::pushdata_bytelength(<Vec<u8>>::from_hex("3044022013e15d865010c257eef133064ef69a780b4bc7ebe6eda367504e806614f940c3022062fdbc8c2d049f91db2042d6c9771de6f1ef0b3b1fea76c1ab5542e44ed29ed801").expect("valid sig")).expect("fits"),
        ]);
    }

    /// The sighash both fixture signatures commit to.
    pub fn sighash(_script_code: &[u8], _hash_type: &HashType) -> Option<[u8; 32]> {
        <[u8; 32]>::from_hex("e8c7bdac77f6bb1f3aba2eaa1fada551a9c8b3b5ecd1ef86e6e58a5f1aab952c")
            .ok()
    }

    /// An incorrect sighash for the fixture – for checking failure cases.
    pub fn invalid_sighash(_script_code: &[u8], _hash_type: &HashType) -> Option<[u8; 32]> {
        <[u8; 32]>::from_hex("08c7bdac77f6bb1f3aba2eaa1fada551a9c8b3b5ecd1ef86e6e58a5f1aab952c")
            .ok()
    }

    /// A callback that returns no sighash at all – another failure case.
    pub fn missing_sighash(_script_code: &[u8], _hash_type: &HashType) -> Option<[u8; 32]> {
        None
    }

    /// See [`script::Code::serialize`].
    pub fn serialize(ops: &[Opcode]) -> Vec<u8> {
        script::Code::serialize(ops)
    }

    /// Parses opcodes that are known to form a well-formed script.
    pub fn parse(ops: &[Opcode]) -> OperationList {
        script::parse(&serialize(ops), Flags::empty()).expect("well-formed script")
    }

    /// Runs `ops` from an empty stack and returns the final stack, bottom first.
    pub fn run(ops: &[Opcode]) -> Result<Vec<Vec<u8>>, interpreter::Error> {
        run_with(ops, Flags::empty())
    }

    /// Like [`run`], but under the given dialect.
    pub fn run_with(ops: &[Opcode], flags: Flags) -> Result<Vec<Vec<u8>>, interpreter::Error> {
        run_checked(ops, flags, &interpreter::NullSignatureChecker())
    }

    /// Like [`run_with`], but checking signatures with `checker`.
    pub fn run_checked(
        ops: &[Opcode],
        flags: Flags,
        checker: &dyn SignatureChecker,
    ) -> Result<Vec<Vec<u8>>, interpreter::Error> {
        run_in(ops, Limits::default(), flags, checker)
    }

    /// Like [`run`], but under custom resource bounds.
    pub fn run_limited(ops: &[Opcode], limits: Limits) -> Result<Vec<Vec<u8>>, interpreter::Error> {
        run_in(ops, limits, Flags::empty(), &interpreter::NullSignatureChecker())
    }

    fn run_in(
        ops: &[Opcode],
        limits: Limits,
        flags: Flags,
        checker: &dyn SignatureChecker,
    ) -> Result<Vec<Vec<u8>>, interpreter::Error> {
        let parsed = script::parse(&serialize(ops), flags).expect("well-formed script");
        let mut env = Environment::new(limits, flags).with_checker(checker, &[]);
        interpreter::execute(&parsed, &mut env)?;
        Ok(env.into_stack().into())
    }
}
