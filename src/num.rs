//! Script numbers: the little-endian sign-magnitude integers that arithmetic opcodes operate on.

use alloc::vec::Vec;

use thiserror::Error;

/// Errors that occur while decoding a stack element as a number.
#[allow(missing_docs)]
#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum Error {
    #[error("non-minimal encoding of script number: {0:02x?}")]
    NonMinimalEncoding(Vec<u8>),

    #[error("script number overflow: max: {max_size}, actual: {actual}")]
    Overflow { max_size: usize, actual: usize },
}

/// The operand size accepted by arithmetic opcodes. Results may be larger, but they can’t be
/// fed back into another arithmetic opcode.
pub const MAX_SIZE: usize = 4;

/// The widest encoding that fits an `i64`.
const MAX_I64_SIZE: usize = 8;

/// Whether `bytes` is the shortest encoding of its value. Negative zero and zero-padding are not.
pub fn is_minimal(bytes: &[u8]) -> bool {
    match bytes {
        [] => true,
        [.., last] if last & 0x7f != 0 => true,
        // The final byte only carries the sign, which is needed only when the byte before it
        // already uses its high bit.
        [.., before, _] => before & 0x80 != 0,
        [_] => false,
    }
}

/// Decodes a script number of at most `max_size` bytes.
pub fn parse(bytes: &[u8], require_minimal: bool, max_size: usize) -> Result<i64, Error> {
    let max_size = max_size.min(MAX_I64_SIZE);
    if bytes.len() > max_size {
        return Err(Error::Overflow {
            max_size,
            actual: bytes.len(),
        });
    }
    if require_minimal && !is_minimal(bytes) {
        return Err(Error::NonMinimalEncoding(bytes.to_vec()));
    }
    let Some(last) = bytes.last() else {
        return Ok(0);
    };
    let raw = bytes
        .iter()
        .rev()
        .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte));
    let sign_bit = 0x80u64 << (8 * (bytes.len() - 1));
    let magnitude = i64::try_from(raw & !sign_bit).map_err(|_| Error::Overflow {
        max_size,
        actual: bytes.len(),
    })?;
    Ok(if last & 0x80 != 0 {
        -magnitude
    } else {
        magnitude
    })
}

/// Encodes `value` minimally.
pub fn serialize(value: i64) -> Vec<u8> {
    let negative = value < 0;
    let mut magnitude = value.unsigned_abs();
    let mut result = Vec::new();
    while magnitude != 0 {
        // low byte
        result.push(magnitude as u8);
        magnitude >>= 8;
    }
    match result.last().copied() {
        Some(top) if top & 0x80 != 0 => result.push(if negative { 0x80 } else { 0 }),
        Some(_) if negative => {
            if let Some(top) = result.last_mut() {
                *top |= 0x80
            }
        }
        _ => {}
    }
    result
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::{is_minimal, parse, serialize, Error, MAX_SIZE};

    #[test]
    fn parse_examples() {
        assert_eq!(parse(&[], true, MAX_SIZE), Ok(0));
        assert_eq!(parse(&[0x01], true, MAX_SIZE), Ok(1));
        assert_eq!(parse(&[0x81], true, MAX_SIZE), Ok(-1));
        assert_eq!(parse(&[0xff, 0x00], true, MAX_SIZE), Ok(255));
        assert_eq!(parse(&[0xff, 0x80], true, MAX_SIZE), Ok(-255));
        assert_eq!(parse(&[0xff, 0xff, 0xff, 0x7f], true, MAX_SIZE), Ok(0x7fff_ffff));
        assert_eq!(parse(&[0x00, 0x00, 0x00, 0x80, 0x00], true, 5), Ok(0x8000_0000));
    }

    #[test]
    fn negative_zero_and_padding() {
        assert!(!is_minimal(&[0x80]));
        assert!(!is_minimal(&[0x00]));
        assert!(!is_minimal(&[0x01, 0x00]));
        assert!(is_minimal(&[0x80, 0x00]));
        assert!(is_minimal(&[0x80, 0x80]));
        assert_eq!(parse(&[0x80], false, MAX_SIZE), Ok(0));
        assert_eq!(parse(&[0x00, 0x00], false, MAX_SIZE), Ok(0));
        assert_eq!(
            parse(&[0x01, 0x00], true, MAX_SIZE),
            Err(Error::NonMinimalEncoding(vec![0x01, 0x00]))
        );
    }

    #[test]
    fn overflow() {
        assert_eq!(
            parse(&[0, 0, 0, 0, 0], false, MAX_SIZE),
            Err(Error::Overflow {
                max_size: 4,
                actual: 5
            })
        );
    }

    #[test]
    fn serialize_examples() {
        assert_eq!(serialize(0), Vec::<u8>::new());
        assert_eq!(serialize(1), vec![0x01]);
        assert_eq!(serialize(-1), vec![0x81]);
        assert_eq!(serialize(127), vec![0x7f]);
        assert_eq!(serialize(128), vec![0x80, 0x00]);
        assert_eq!(serialize(-128), vec![0x80, 0x80]);
        assert_eq!(serialize(-255), vec![0xff, 0x80]);
        assert_eq!(serialize(256), vec![0x00, 0x01]);
    }

    #[test]
    fn serialized_numbers_are_minimal_and_parse_back() {
        for n in [-0x7fff_ffff, -65536, -129, -1, 0, 1, 127, 128, 32767, 0x7fff_ffff] {
            let bytes = serialize(n);
            assert!(is_minimal(&bytes), "{}", n);
            assert_eq!(parse(&bytes, true, MAX_SIZE), Ok(n));
        }
    }
}
