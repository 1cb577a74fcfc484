//! Execution of parsed scripts.

use alloc::vec::Vec;
use core::slice::Iter;

use thiserror::Error;
use tracing::trace;

use crate::{
    external::pubkey::PubKey,
    num,
    script::{self, Branch, Operation, OperationList},
    signature,
};

/// A resource bound that an execution ran into.
#[allow(missing_docs)]
#[derive(Copy, Clone, PartialEq, Eq, Debug, Error)]
pub enum Limit {
    #[error("combined stack depth exceeded maximum of {max} entries")]
    StackDepth { max: usize },

    #[error("stack element of {actual} bytes exceeded maximum of {max} bytes")]
    ElementSize { max: usize, actual: usize },

    /// __NB__: There is no “actual count” here, because the count is checked incrementally and
    ///         fails on the first operation that crosses the limit.
    #[error("operation count exceeded maximum of {max}")]
    OpCount { max: usize },
}

/// Any error that can happen while executing a script.
#[allow(missing_docs)]
#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum Error {
    #[error("tried to retrieve element {index} from a stack with {len} elements")]
    StackUnderflow { index: usize, len: usize },

    #[error("resource limit exceeded: {0}")]
    ResourceLimitExceeded(Limit),

    #[error("opcode 0x{0:02x} has no executable behavior")]
    InvalidOpcodeExecution(u8),

    #[error("OP_RETURN encountered")]
    OpReturn,

    #[error("verify operation failed")]
    Verify,

    #[error("stack index {0} is out of range")]
    InvalidStackIndex(i64),

    #[error("signature count {0} wasn’t in the range 0..=<public key count>")]
    SigCount(i64),

    #[error("public key count {0} wasn’t in the range 0..={max}", max = MAX_PUBKEY_COUNT)]
    PubKeyCount(i64),

    // OP_CHECKLOCKTIMEVERIFY
    #[error("negative lock time encountered")]
    NegativeLockTime,

    #[error("unsatisfied locktime condition")]
    UnsatisfiedLockTime,

    #[error("signature encoding error: {0}")]
    SignatureEncoding(signature::Error),

    #[error("non-minimal data encountered when minimal data required")]
    MinimalData,

    #[error("signature null dummy error")]
    SigNullDummy,

    #[error("public key type error")]
    PubKeyType,

    // softfork safeness
    #[error("discouraged upgradable NOP encountered")]
    DiscourageUpgradableNOPs,

    #[error("script number error: {0}")]
    Num(num::Error),
}

impl From<num::Error> for Error {
    fn from(value: num::Error) -> Self {
        Error::Num(value)
    }
}

impl From<signature::Error> for Error {
    fn from(value: signature::Error) -> Self {
        Error::SignatureEncoding(value)
    }
}

impl From<Limit> for Error {
    fn from(value: Limit) -> Self {
        Error::ResourceLimitExceeded(value)
    }
}

/// Threshold for lock_time: below this value it is interpreted as block number,
/// otherwise as UNIX timestamp.
const LOCKTIME_THRESHOLD: i64 = 500_000_000; // Tue Nov  5 00:53:20 1985 UTC

/// The maximum number of pubkeys (and signatures, by implication) allowed in CHECKMULTISIG.
pub(crate) const MAX_PUBKEY_COUNT: u8 = 20;

/// Resource bounds for a single execution.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Limits {
    /// The maximum number of elements allowed in the _combined_ stack and altstack.
    pub max_stack_depth: usize,
    /// The largest element that may be pushed onto the stack.
    pub max_element_size: usize,
    /// The maximum number of counted operations. Pushes are free.
    pub max_op_count: usize,
    /// The largest script accepted by [`crate::verify::verify`].
    pub max_script_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_stack_depth: 1000,
            max_element_size: 520,
            max_op_count: 201,
            max_script_size: script::Code::MAX_SIZE,
        }
    }
}

bitflags::bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    /// Script verification flags, selecting the dialect a script is parsed and run under.
    pub struct Flags: u32 {
        /// Passing a non-strict-DER signature or one with undefined hashtype to a checksig
        /// operation causes script failure. Evaluating a pubkey that is not (0x04 + 64 bytes) or
        /// (0x02 or 0x03 + 32 bytes) by checksig causes script failure.
        const StrictEnc = 1 << 1;

        /// Passing a non-strict-DER signature or one with S > order/2 to a checksig operation
        /// causes script failure.
        const LowS = 1 << 3;

        /// Verify dummy stack item consumed by CHECKMULTISIG is of zero-length.
        const NullDummy = 1 << 4;

        /// Using a non-push operator in the unlocking script causes script failure.
        const SigPushOnly = 1 << 5;

        /// Require minimal encodings for all push operations (OP_0... OP_16, OP_1NEGATE where
        /// possible, direct pushes up to 75 bytes, OP_PUSHDATA1 up to 255 bytes, OP_PUSHDATA2 for
        /// anything larger). In addition, whenever a stack element is interpreted as a number, it
        /// must be of minimal length.
        const MinimalData = 1 << 6;

        /// Discourage use of NOPs reserved for upgrades (NOP1-10). NOPs that are not executed,
        /// e.g. within an untaken branch, are *not* rejected.
        const DiscourageUpgradableNOPs = 1 << 7;

        /// Require that exactly one stack element remains after evaluation.
        const CleanStack = 1 << 8;

        /// Verify CHECKLOCKTIMEVERIFY. Without it the opcode behaves as NOP2.
        const CheckLockTimeVerify = 1 << 9;

        /// Accept reserved and unassigned opcodes while parsing, failing only if one is executed.
        /// `OP_VERIF` and `OP_VERNOTIF` are rejected regardless.
        const DeferReserved = 1 << 10;
    }
}

/// This verifies that a signature is correct for the given pubkey and script code.
pub trait SignatureChecker {
    /// Check that the signature is valid.
    fn check_sig(
        &self,
        script_sig: &signature::Decoded,
        vch_pub_key: &[u8],
        script_code: &[u8],
    ) -> bool;

    /// Return true if the lock time argument is more recent than the time the script was evaluated.
    fn check_lock_time(&self, lock_time: i64) -> bool;
}

/// A signature checker that always fails. This is helpful in testing cases that don’t involve
/// `CHECK*SIG`.
#[derive(Copy, Clone, Debug, Default)]
pub struct NullSignatureChecker();

static NULL_CHECKER: NullSignatureChecker = NullSignatureChecker();

impl SignatureChecker for NullSignatureChecker {
    fn check_sig(
        &self,
        _script_sig: &signature::Decoded,
        _vch_pub_key: &[u8],
        _script_code: &[u8],
    ) -> bool {
        false
    }

    fn check_lock_time(&self, _lock_time: i64) -> bool {
        false
    }
}

/// All signature hashes are 32 bytes.
pub(crate) const SIGHASH_SIZE: usize = 32;

/// A function which is called to obtain the sighash.
///    - script_code: the locking script being validated.
///    - hash_type: the hash type being used.
///
/// Returning `None` indicates _some_ failure to produce the desired hash.
pub type SighashCalculator<'a> =
    &'a (dyn Fn(&[u8], &signature::HashType) -> Option<[u8; SIGHASH_SIZE]> + Sync);

/// A signature checker that uses a callback to get necessary information about the transaction
/// involved.
#[derive(Copy, Clone)]
pub struct CallbackTransactionSignatureChecker<'a> {
    /// The callback to be used to calculate the sighash.
    pub sighash: SighashCalculator<'a>,
    /// This is stored as an `i64` instead of the `u32` used by transactions to avoid partial
    /// conversions when reading from the stack.
    pub lock_time: i64,
    /// Whether this is the final UTXO in the transaction.
    pub is_final: bool,
}

impl SignatureChecker for CallbackTransactionSignatureChecker<'_> {
    fn check_sig(
        &self,
        sig: &signature::Decoded,
        vch_pub_key: &[u8],
        script_code: &[u8],
    ) -> bool {
        let pubkey = PubKey(vch_pub_key);

        pubkey.is_valid()
            && (self.sighash)(script_code, sig.sighash_type())
                .map(|sighash| pubkey.verify(&sighash, sig.sig()))
                .unwrap_or(false)
    }

    fn check_lock_time(&self, lock_time: i64) -> bool {
        // Lock-by-height and lock-by-time values are not comparable, so the kinds must match
        // before the numbers are compared.
        let same_kind = (self.lock_time < LOCKTIME_THRESHOLD) == (lock_time < LOCKTIME_THRESHOLD);
        // A finalized input disables the lock time entirely.
        same_kind && lock_time <= self.lock_time && !self.is_final
    }
}

/// Treat a stack entry as a generalized boolean. Anything other than 0 and -0 (minimal encoding not
/// required) is treated as `true`.
pub fn cast_to_bool(vch: &[u8]) -> bool {
    match vch.split_last() {
        None => false,
        Some((last, rest)) => rest.iter().any(|b| *b != 0) || (last & 0x7f) != 0,
    }
}

/// The canonical stack encodings of `true` and `false`.
pub(crate) fn cast_from_bool(b: bool) -> Vec<u8> {
    if b {
        vec![1]
    } else {
        vec![]
    }
}

/// Script is a stack machine (like Forth) that evaluates a predicate returning a bool indicating
/// valid or not. There are no loops.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Stack<T>(Vec<T>);

impl<T> Stack<T> {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Stack(vec![])
    }

    /// Fail if the Stack doesn’t contain at least `min` elements.
    pub(crate) fn check_len(&self, min: usize) -> Result<(), Error> {
        let len = self.0.len();
        if min <= len {
            Ok(())
        } else {
            Err(Error::StackUnderflow {
                index: min - 1,
                len,
            })
        }
    }

    fn rindex(&self, i: usize) -> Result<usize, Error> {
        let len = self.0.len();
        if i < len {
            Ok(len - i - 1)
        } else {
            Err(Error::StackUnderflow { index: i, len })
        }
    }

    /// Gets an element from the stack without removing it, counting from the right. I.e.,
    /// `rget(0)` returns the top element.
    pub fn rget(&self, i: usize) -> Result<&T, Error> {
        let idx = self.rindex(i)?;
        Ok(&self.0[idx])
    }

    /// Removes and returns the top element from the stack.
    pub(crate) fn pop(&mut self) -> Result<T, Error> {
        let len = self.0.len();
        self.0.pop().ok_or(Error::StackUnderflow { index: 0, len })
    }

    /// Adds a new element to the top of the stack.
    pub(crate) fn push(&mut self, value: T) {
        self.0.push(value)
    }

    /// Returns the number of elements in the stack.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the stack has no elements.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns an iterator over the stack, bottom first.
    pub fn iter(&self) -> Iter<'_, T> {
        self.0.iter()
    }

    /// Returns a reference to the last element of the stack.
    pub fn last(&self) -> Result<&T, Error> {
        self.rget(0)
    }

    /// Removes an element from the stack, counting from the right.
    pub(crate) fn rremove(&mut self, start: usize) -> Result<T, Error> {
        self.rindex(start).map(|rstart| self.0.remove(rstart))
    }

    /// Inserts an element at the given index, counting from the right.
    pub(crate) fn rinsert(&mut self, i: usize, element: T) -> Result<(), Error> {
        let ri = self.rindex(i)?;
        self.0.insert(ri, element);
        Ok(())
    }

    // higher-level operations

    /// Perform a unary operation on the top stack element.
    pub(crate) fn unop(&mut self, op: impl FnOnce(T) -> Result<T, Error>) -> Result<(), Error> {
        self.pop().and_then(op).map(|res| self.push(res))
    }

    /// Call a binary function on the top two stack elements.
    pub(crate) fn binfn<R>(
        &mut self,
        op: impl FnOnce(T, T) -> Result<R, Error>,
    ) -> Result<R, Error> {
        self.check_len(2)?;
        let x2 = self.pop()?;
        let x1 = self.pop()?;
        op(x1, x2)
    }

    /// Perform a binary operation on the top two stack elements.
    pub(crate) fn binop(&mut self, op: impl FnOnce(T, T) -> Result<T, Error>) -> Result<(), Error> {
        self.binfn(op).map(|res| self.push(res))
    }
}

impl<T: Clone> Stack<T> {
    /// Copies the element at `i` (from the right) onto the top of the stack.
    pub(crate) fn repush(&mut self, i: usize) -> Result<(), Error> {
        self.rget(i).cloned().map(|v| self.push(v))
    }

    /// Moves the element at `i` (from the right) onto the top of the stack.
    pub(crate) fn move_to_top(&mut self, i: usize) -> Result<(), Error> {
        self.rremove(i).map(|v| self.push(v))
    }
}

impl<T> From<Vec<T>> for Stack<T> {
    fn from(value: Vec<T>) -> Self {
        Stack(value)
    }
}

impl<T> From<Stack<T>> for Vec<T> {
    fn from(value: Stack<T>) -> Self {
        value.0
    }
}

/// Everything a single execution reads and mutates.
///
/// **NB**: This intentionally doesn’t provide a `Clone` impl, to prevent reuse of old state.
pub struct Environment<'a> {
    /// The primary evaluation stack.
    pub(crate) stack: Stack<Vec<u8>>,
    /// A secondary stack that elements can be moved to temporarily.
    pub(crate) altstack: Stack<Vec<u8>>,
    op_count: usize,
    pushed_bytes: usize,
    limits: Limits,
    flags: Flags,
    checker: &'a dyn SignatureChecker,
    script_code: &'a [u8],
}

impl Environment<'static> {
    /// An empty environment whose signature checks always fail.
    pub fn new(limits: Limits, flags: Flags) -> Self {
        Environment {
            stack: Stack::new(),
            altstack: Stack::new(),
            op_count: 0,
            pushed_bytes: 0,
            limits,
            flags,
            checker: &NULL_CHECKER,
            script_code: &[],
        }
    }
}

impl<'a> Environment<'a> {
    /// Replaces the signature checker, along with the script code signatures are checked against.
    pub fn with_checker<'b>(
        self,
        checker: &'b dyn SignatureChecker,
        script_code: &'b [u8],
    ) -> Environment<'b> {
        Environment {
            stack: self.stack,
            altstack: self.altstack,
            op_count: self.op_count,
            pushed_bytes: self.pushed_bytes,
            limits: self.limits,
            flags: self.flags,
            checker,
            script_code,
        }
    }

    /// Pushes a value, enforcing the element size and combined depth limits.
    pub fn push(&mut self, value: Vec<u8>) -> Result<(), Error> {
        if value.len() > self.limits.max_element_size {
            return Err(Limit::ElementSize {
                max: self.limits.max_element_size,
                actual: value.len(),
            }
            .into());
        }
        if self.depth() >= self.limits.max_stack_depth {
            return Err(Limit::StackDepth {
                max: self.limits.max_stack_depth,
            }
            .into());
        }
        self.pushed_bytes = self.pushed_bytes.saturating_add(value.len());
        self.stack.push(value);
        Ok(())
    }

    /// Removes and returns the top of the stack.
    pub fn pop(&mut self) -> Result<Vec<u8>, Error> {
        self.stack.pop()
    }

    /// The top of the stack, without removing it.
    pub fn top(&self) -> Result<&[u8], Error> {
        self.stack.last().map(Vec::as_slice)
    }

    /// The primary stack.
    pub fn stack(&self) -> &Stack<Vec<u8>> {
        &self.stack
    }

    /// The alternate stack.
    pub fn altstack(&self) -> &Stack<Vec<u8>> {
        &self.altstack
    }

    /// Counted operations executed so far.
    pub fn op_count(&self) -> usize {
        self.op_count
    }

    /// Total bytes of data pushed so far.
    pub fn pushed_bytes(&self) -> usize {
        self.pushed_bytes
    }

    /// The bounds this execution runs under.
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// The dialect this execution runs under.
    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub(crate) fn checker(&self) -> &'a dyn SignatureChecker {
        self.checker
    }

    pub(crate) fn script_code(&self) -> &'a [u8] {
        self.script_code
    }

    /// Bumps the current `op_count` and errors if it exceeds the limit.
    pub(crate) fn increment_op_count(&mut self, by: usize) -> Result<(), Error> {
        self.op_count = self.op_count.saturating_add(by);
        if self.op_count <= self.limits.max_op_count {
            Ok(())
        } else {
            Err(Limit::OpCount {
                max: self.limits.max_op_count,
            }
            .into())
        }
    }

    fn depth(&self) -> usize {
        self.stack.len() + self.altstack.len()
    }

    fn check_depth(&self) -> Result<(), Error> {
        if self.depth() > self.limits.max_stack_depth {
            Err(Limit::StackDepth {
                max: self.limits.max_stack_depth,
            }
            .into())
        } else {
            Ok(())
        }
    }

    /// Consumes the environment, returning the final stack.
    pub fn into_stack(self) -> Stack<Vec<u8>> {
        self.stack
    }
}

/// Runs `ops` in order against `env`, stopping at the first error.
pub fn execute(ops: &OperationList, env: &mut Environment<'_>) -> Result<(), Error> {
    ops.iter().try_for_each(|op| {
        match op {
            Operation::Opcode(opcode) => opcode.eval(env),
            Operation::Branch(branch) => eval_branch(branch, env),
        }?;
        env.check_depth()
    })
}

fn eval_branch(branch: &Branch, env: &mut Environment<'_>) -> Result<(), Error> {
    env.increment_op_count(1)?;
    let condition = cast_to_bool(&env.pop()?);
    trace!(
        invert = branch.invert,
        condition,
        op_count = env.op_count,
        "selecting branch"
    );
    match branch.select(condition) {
        Some(ops) => execute(ops, env),
        None => Ok(()),
    }
}
