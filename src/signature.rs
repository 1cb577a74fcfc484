//! Signature handling.
//!
//! This is in a separate module so we can minimize the code that has access to the internals,
//! making it easier to ensure that we check the encoding correctly.

use alloc::{borrow::ToOwned, string::String, vec::Vec};

use secp256k1::ecdsa;
use thiserror::Error;

use crate::{
    external::pubkey::PubKey,
    opcode::PushValue,
    script::{Asm, Operation, OperationList},
    Opcode,
};

/// Things that can go wrong when constructing a `HashType` from bit flags.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Error)]
pub enum InvalidHashType {
    /// The low bits must name one of `ALL`, `NONE` or `SINGLE`.
    #[error("invalid signed outputs")]
    InvalidSignedOutputs,
    /// Bits other than those specified for `HashType` must be 0. This includes only the bits that
    /// are undefined by `HashType`.
    #[error("extra bits set: {0:#04x}")]
    ExtraBitsSet(u8),
}

/// Any error that can happen during signature decoding.
#[allow(missing_docs)]
#[derive(Copy, Clone, PartialEq, Eq, Debug, Error)]
pub enum InvalidDerInteger {
    #[error("missing the 0x02 integer encoding byte")]
    NotAnInteger,
    #[error("the integer was expected to be {expected} bytes, but it was {actual} bytes")]
    IncorrectLength { actual: usize, expected: u8 },
    #[error("integers can’t be zero-length")]
    ZeroLength,
    #[error("leading 0x00 bytes are disallowed, unless it would otherwise be interpreted as a negative number.")]
    LeadingNullByte,
    #[error("integers can’t be negative")]
    Negative,
}

/// Errors that occur during decoding of a DER signature.
#[allow(missing_docs)]
#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum InvalidDerEncoding {
    #[error("didn’t start with 0x30, or was missing the length")]
    WrongType,
    #[error("the signature can’t be longer than 70 bytes")]
    TooLong,
    #[error("the signature was expected to be {expected} bytes, but it was {actual} bytes")]
    IncorrectLength { actual: usize, expected: u8 },
    #[error(
        "the {name} component {}failed: {error}",
        .value.clone().map_or("".to_owned(), |vec| format!("({vec:?}) "))
    )]
    InvalidComponent {
        name: &'static str,
        value: Option<Vec<u8>>,
        error: InvalidDerInteger,
    },
}

/// Errors that occur when parsing signatures.
#[allow(missing_docs)]
#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum Error {
    #[error("signature hash type error: {0}")]
    SigHashType(InvalidHashType),

    #[error("signature DER encoding error: {0}")]
    SigDER(InvalidDerEncoding),

    #[error("signature s value is too high")]
    SigHighS,
}

/// The ways in which an input may commit to the outputs of its transaction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SignedOutputs {
    /// The input signature commits to all outputs in the transaction.
    All,
    /// The input's signature commits to the output at the same index as the input.
    Single,
    /// The input's signature does not commit to any outputs.
    None,
}

/// The different SigHash types.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HashType {
    signed_outputs: SignedOutputs,
    anyone_can_pay: bool,
}

impl HashType {
    const ANYONECANPAY: u8 = 0x80;

    /// Construct a `HashType` from bit flags.
    ///
    /// When `is_strict`, undefined bits are rejected and the low bits must be 1, 2 or 3. Otherwise
    /// anything other than `NONE` or `SINGLE` in the low five bits is treated as `ALL`.
    pub fn from_bits(bits: u8, is_strict: bool) -> Result<Self, InvalidHashType> {
        let unknown_bits = bits & !(Self::ANYONECANPAY | 0x03);
        if is_strict && unknown_bits != 0 {
            return Err(InvalidHashType::ExtraBitsSet(unknown_bits));
        }
        if is_strict && bits & 0x03 == 0 {
            return Err(InvalidHashType::InvalidSignedOutputs);
        }
        Ok(HashType {
            signed_outputs: match bits & 0x1f {
                2 => SignedOutputs::None,
                3 => SignedOutputs::Single,
                _ => SignedOutputs::All,
            },
            anyone_can_pay: bits & Self::ANYONECANPAY != 0,
        })
    }

    /// See [SignedOutputs].
    pub fn signed_outputs(&self) -> SignedOutputs {
        self.signed_outputs
    }

    /// Allows anyone to add inputs to this transaction.
    pub fn anyone_can_pay(&self) -> bool {
        self.anyone_can_pay
    }
}

impl Asm for HashType {
    fn to_asm(&self, _attempt_sighash_decode: bool) -> String {
        let base = match self.signed_outputs {
            SignedOutputs::All => "ALL",
            SignedOutputs::Single => "SINGLE",
            SignedOutputs::None => "NONE",
        };
        if self.anyone_can_pay {
            format!("{}|ANYONECANPAY", base)
        } else {
            base.to_owned()
        }
    }
}

/// Different signature encoding failures may result in either aborting execution or continuing
/// execution with an invalid signature.
pub enum Validity {
    /// Fail execution with the given error.
    InvalidAbort(Error),
    /// Continue execution, without a valid signature.
    InvalidContinue,
    /// Continue execution with a valid signature.
    Valid(Decoded),
}

/// This contains a validated ECDSA signature and the hash type. It’s an opaque value, so we can
/// ensure all values are valid (e.g., signature is “low-S” if required, and the hash type was
/// created without any extra bits, if required).
#[derive(Clone)]
pub struct Decoded {
    sig: ecdsa::Signature,
    hash_type: HashType,
}

impl Decoded {
    /// Checks the properties of individual integers in a DER signature.
    fn is_valid_integer(int_bytes: &[u8]) -> Result<(), InvalidDerInteger> {
        match int_bytes {
            [] => Err(InvalidDerInteger::ZeroLength),
            // A leading zero is only there to keep a high first byte from reading as negative.
            [0x00, next, ..] if next & 0x80 == 0 => Err(InvalidDerInteger::LeadingNullByte),
            [first, ..] if first & 0x80 != 0 => Err(InvalidDerInteger::Negative),
            _ => Ok(()),
        }
    }

    fn component<'a>(
        name: &'static str,
        bytes: &'a [u8],
    ) -> impl FnOnce(InvalidDerInteger) -> InvalidDerEncoding + 'a {
        move |error| InvalidDerEncoding::InvalidComponent {
            name,
            value: Some(bytes.to_vec()),
            error,
        }
    }

    /// A canonical signature consists of: <30> <total len> <02> <len R> <R> <02> <len S> <S>
    ///
    /// Where R and S are not negative (their first byte has its highest bit not set), and not
    /// excessively padded (do not start with a 0 byte, unless an otherwise negative number follows,
    /// in which case a single 0 byte is necessary and even required).
    ///
    /// __NB__: This doesn’t rely on [ecdsa::Signature::from_der] because these exact checks are
    ///         consensus critical.
    fn is_valid_encoding(sig: &[u8]) -> Result<(), InvalidDerEncoding> {
        let [0x30, total_len, content @ ..] = sig else {
            return Err(InvalidDerEncoding::WrongType);
        };
        if *total_len > 70 {
            return Err(InvalidDerEncoding::TooLong);
        }
        if usize::from(*total_len) != content.len() {
            return Err(InvalidDerEncoding::IncorrectLength {
                actual: content.len(),
                expected: *total_len,
            });
        }

        let [0x02, r_len, r_s @ ..] = content else {
            return Err(InvalidDerEncoding::InvalidComponent {
                name: "r",
                value: None,
                error: InvalidDerInteger::NotAnInteger,
            });
        };
        let (r, rest) = r_s.split_at_checked(usize::from(*r_len)).ok_or_else(|| {
            InvalidDerEncoding::InvalidComponent {
                name: "r",
                value: Some(r_s.to_vec()),
                error: InvalidDerInteger::IncorrectLength {
                    actual: r_s.len(),
                    expected: *r_len,
                },
            }
        })?;
        let [0x02, s_len, s @ ..] = rest else {
            return Err(InvalidDerEncoding::InvalidComponent {
                name: "s",
                value: None,
                error: InvalidDerInteger::NotAnInteger,
            });
        };

        Self::is_valid_integer(r).map_err(Self::component("r", r))?;
        if usize::from(*s_len) != s.len() {
            return Err(Self::component("s", s)(InvalidDerInteger::IncorrectLength {
                actual: s.len(),
                expected: *s_len,
            }));
        }
        Self::is_valid_integer(s).map_err(Self::component("s", s))
    }

    /// This decodes an ECDSA signature and hash type from bytes. It ensures that the encoding was
    /// valid.
    ///
    /// __NB__: An empty signature is not strictly DER encoded, but will result in
    ///         `InvalidContinue` as a compact way to provide an invalid signature for use with
    ///         CHECK(MULTI)SIG.
    pub fn from_bytes(vch_sig_in: &[u8], require_low_s: bool, is_strict: bool) -> Validity {
        let Some((hash_type, vch_sig)) = vch_sig_in.split_last() else {
            return Validity::InvalidContinue;
        };
        let validated = Self::is_valid_encoding(vch_sig)
            .map_err(Error::SigDER)
            .and_then(|()| HashType::from_bits(*hash_type, is_strict).map_err(Error::SigHashType));
        match validated {
            Err(e) => Validity::InvalidAbort(e),
            // Parse failures that `is_valid_encoding` lets through don’t abort execution.
            Ok(hash_type) => match ecdsa::Signature::from_der(vch_sig) {
                Err(_) => Validity::InvalidContinue,
                Ok(sig) if require_low_s && !PubKey::check_low_s(&sig) => {
                    Validity::InvalidAbort(Error::SigHighS)
                }
                Ok(sig) => Validity::Valid(Decoded { sig, hash_type }),
            },
        }
    }

    /// The ECDSA signature.
    pub fn sig(&self) -> &ecdsa::Signature {
        &self.sig
    }

    /// The hash type used to inform signature validation.
    pub fn sighash_type(&self) -> &HashType {
        &self.hash_type
    }
}

/// The hash type an unlocking script signs with: the last byte of its first push, provided that
/// push carries a non-empty literal payload. Small-number opcodes carry none. Anything else,
/// including an empty script, has no hash type.
pub fn hash_type_of(unlocking: &OperationList) -> Option<u8> {
    match unlocking.first()? {
        Operation::Opcode(Opcode::PushValue(PushValue::LargeValue(lv))) => {
            lv.value().last().copied()
        }
        _ => None,
    }
}
