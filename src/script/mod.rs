//! Parsing byte streams into structured operation lists.
//!
//! Conditionals never survive parsing as opcodes: every `OP_IF`/`OP_NOTIF` … `OP_ELSE` …
//! `OP_ENDIF` run becomes a single [`Branch`], so execution never has to scan for its matching
//! terminator.

use alloc::{string::String, vec::Vec};
use core::{mem, slice::Iter};

use thiserror::Error;

use crate::{interpreter::Flags, opcode, opcode::Control, Opcode};

/// Errors that can occur while parsing a script.
#[allow(missing_docs)]
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    #[error("{opcode:?} at offset {offset} has no open conditional to terminate")]
    DanglingTerminator { offset: usize, opcode: Control },

    #[error("conditional opened at offset {offset} is still open at the end of the script ({depth} unclosed)")]
    UnterminatedConditional { offset: usize, depth: usize },

    #[error("push needs {expected_bytes} bytes, but only {available_bytes} remain")]
    TruncatedPush {
        expected_bytes: usize,
        available_bytes: usize,
    },

    #[error("opcode 0x{opcode:02x} at offset {offset} is not allowed")]
    InvalidOpcode { offset: usize, opcode: u8 },

    #[error("conditional opened at offset {offset} nests deeper than {max}")]
    NestingTooDeep { offset: usize, max: usize },
}

/// How many conditionals may be open at once.
pub const MAX_NESTING_DEPTH: usize = 256;

impl From<opcode::Error> for Error {
    fn from(value: opcode::Error) -> Self {
        match value {
            opcode::Error::Read {
                expected_bytes,
                available_bytes,
            } => Error::TruncatedPush {
                expected_bytes,
                available_bytes,
            },
        }
    }
}

/// A parsed node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    /// A single instruction, with its payload if it is a push.
    Opcode(Opcode),
    /// A collapsed conditional.
    Branch(Branch),
}

/// A conditional, with both arms already parsed.
///
/// This has no wire encoding of its own; [`Asm`] renders it back as the opcodes it came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Branch {
    /// Set when the conditional was opened by `OP_NOTIF`.
    pub invert: bool,
    /// Runs when the condition (after inversion) is true.
    pub then_branch: OperationList,
    /// Runs otherwise. Absent when there was no `OP_ELSE`.
    pub else_branch: Option<OperationList>,
}

impl Branch {
    /// The arm to run for a condition popped from the stack, if any.
    pub fn select(&self, condition: bool) -> Option<&OperationList> {
        if condition != self.invert {
            Some(&self.then_branch)
        } else {
            self.else_branch.as_ref()
        }
    }
}

/// An ordered sequence of parsed nodes. Execution order is list order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OperationList(Vec<Operation>);

impl OperationList {
    /// The nodes, in order.
    pub fn iter(&self) -> Iter<'_, Operation> {
        self.0.iter()
    }

    /// The first node, if any.
    pub fn first(&self) -> Option<&Operation> {
        self.0.first()
    }

    /// The number of top-level nodes. A branch counts as one.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no nodes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The nodes as a slice.
    pub fn as_slice(&self) -> &[Operation] {
        &self.0
    }

    /// This list followed by `other`, as executed by [`crate::verify::verify`].
    pub fn concat(&self, other: &OperationList) -> OperationList {
        OperationList(self.0.iter().chain(other.0.iter()).cloned().collect())
    }

    /// Returns true if every node is a push. Branches are never push-only.
    pub fn is_push_only(&self) -> bool {
        self.0
            .iter()
            .all(|op| matches!(op, Operation::Opcode(Opcode::PushValue(_))))
    }

    /// Counts signature operations, following every branch arm.
    ///
    /// `CHECKMULTISIG` counts as the maximum number of keys unless `accurate` is set and it is
    /// directly preceded by `OP_1` … `OP_16`.
    pub fn sig_op_count(&self, accurate: bool) -> u32 {
        let mut last_opcode = None;
        self.0.iter().fold(0, |total, op| {
            total
                + match op {
                    Operation::Opcode(opcode) => {
                        let count = opcode.sig_op_count(last_opcode, accurate);
                        last_opcode = Some(opcode);
                        count
                    }
                    Operation::Branch(branch) => {
                        last_opcode = None;
                        branch.then_branch.sig_op_count(accurate)
                            + branch
                                .else_branch
                                .as_ref()
                                .map_or(0, |ops| ops.sig_op_count(accurate))
                    }
                }
        })
    }
}

impl From<Vec<Operation>> for OperationList {
    fn from(value: Vec<Operation>) -> Self {
        OperationList(value)
    }
}

impl<'a> IntoIterator for &'a OperationList {
    type Item = &'a Operation;
    type IntoIter = Iter<'a, Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A conditional that has been opened but not yet closed.
struct Frame {
    invert: bool,
    /// Where the opening `OP_IF`/`OP_NOTIF` was.
    offset: usize,
    /// The list the finished branch will be appended to.
    enclosing: Vec<Operation>,
    /// Set once `OP_ELSE` has been seen.
    then_branch: Option<OperationList>,
}

/// Parses a complete script, collapsing conditionals into [`Branch`] nodes.
///
/// Nesting is tracked on an explicit stack of open frames and is capped at
/// [`MAX_NESTING_DEPTH`]. Everything that walks the resulting tree recurses once per level.
pub fn parse(script: &[u8], flags: Flags) -> Result<OperationList, Error> {
    let mut frames: Vec<Frame> = Vec::new();
    let mut current: Vec<Operation> = Vec::new();
    let mut remaining = script;

    while !remaining.is_empty() {
        let offset = script.len() - remaining.len();
        let (opcode, rest) = Opcode::parse(remaining)?;
        remaining = rest;

        match opcode {
            Opcode::Control(control @ (Control::OP_IF | Control::OP_NOTIF)) => {
                if frames.len() == MAX_NESTING_DEPTH {
                    return Err(Error::NestingTooDeep {
                        offset,
                        max: MAX_NESTING_DEPTH,
                    });
                }
                frames.push(Frame {
                    invert: control == Control::OP_NOTIF,
                    offset,
                    enclosing: mem::take(&mut current),
                    then_branch: None,
                })
            }
            Opcode::Control(Control::OP_ELSE) => match frames.last_mut() {
                Some(frame) if frame.then_branch.is_none() => {
                    frame.then_branch = Some(OperationList(mem::take(&mut current)))
                }
                _ => {
                    return Err(Error::DanglingTerminator {
                        offset,
                        opcode: Control::OP_ELSE,
                    })
                }
            },
            Opcode::Control(Control::OP_ENDIF) => {
                let frame = frames.pop().ok_or(Error::DanglingTerminator {
                    offset,
                    opcode: Control::OP_ENDIF,
                })?;
                let last_arm = OperationList(mem::replace(&mut current, frame.enclosing));
                let branch = match frame.then_branch {
                    None => Branch {
                        invert: frame.invert,
                        then_branch: last_arm,
                        else_branch: None,
                    },
                    Some(then_branch) => Branch {
                        invert: frame.invert,
                        then_branch,
                        else_branch: Some(last_arm),
                    },
                };
                current.push(Operation::Branch(branch));
            }
            opcode if opcode.is_allowed(flags) => current.push(Operation::Opcode(opcode)),
            opcode => {
                return Err(Error::InvalidOpcode {
                    offset,
                    opcode: opcode.leading_byte(),
                })
            }
        }
    }

    match frames.last() {
        Some(frame) => Err(Error::UnterminatedConditional {
            offset: frame.offset,
            depth: frames.len(),
        }),
        None => Ok(OperationList(current)),
    }
}

/// Serialized script, used inside transaction inputs and outputs
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Code(pub Vec<u8>);

impl Code {
    /// Maximum script length in bytes
    pub const MAX_SIZE: usize = 10_000;

    /// See [`parse`].
    pub fn parse(&self, flags: Flags) -> Result<OperationList, Error> {
        parse(&self.0, flags)
    }

    /// Convert a sequence of `Opcode`s to the bytes that would be included in a transaction.
    pub fn serialize(script: &[Opcode]) -> Vec<u8> {
        script.iter().flat_map(Vec::from).collect()
    }
}

/// Produce a readable representation of a script or one of its pieces.
pub trait Asm {
    /// When `attempt_sighash_decode` is set, pushes that decode as signatures are rendered with
    /// their hash type, e.g. `…[ALL]`.
    fn to_asm(&self, attempt_sighash_decode: bool) -> String;
}

impl Asm for Branch {
    fn to_asm(&self, attempt_sighash_decode: bool) -> String {
        let opener = if self.invert { "OP_NOTIF" } else { "OP_IF" };
        let mut parts = vec![String::from(opener)];
        parts.extend(
            Some(self.then_branch.to_asm(attempt_sighash_decode)).filter(|s| !s.is_empty()),
        );
        if let Some(else_branch) = &self.else_branch {
            parts.push(String::from("OP_ELSE"));
            parts.extend(Some(else_branch.to_asm(attempt_sighash_decode)).filter(|s| !s.is_empty()));
        }
        parts.push(String::from("OP_ENDIF"));
        parts.join(" ")
    }
}

impl Asm for Operation {
    fn to_asm(&self, attempt_sighash_decode: bool) -> String {
        match self {
            Operation::Opcode(opcode) => opcode.to_asm(attempt_sighash_decode),
            Operation::Branch(branch) => branch.to_asm(attempt_sighash_decode),
        }
    }
}

impl Asm for OperationList {
    fn to_asm(&self, attempt_sighash_decode: bool) -> String {
        self.0
            .iter()
            .map(|op| op.to_asm(attempt_sighash_decode))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
