//! Human-readable descriptions of raw scripts, for logs and debugging.
//!
//! These never fail. A script that doesn’t parse is still described, with the parse error in
//! place of its operations.

use alloc::string::String;

use crate::{
    interpreter::Flags,
    script::{self, Asm},
    signature,
};

/// Reserved opcodes are rendered rather than rejected, since nothing here executes.
const PRINT_FLAGS: Flags = Flags::DeferReserved;

fn ops(bytes: &[u8]) -> Result<script::OperationList, String> {
    script::parse(bytes, PRINT_FLAGS).map_err(|err| format!("<{}>", err))
}

/// `LockingScript(<hex>) /* ops:<asm> */`
pub fn describe_locking(bytes: &[u8]) -> String {
    let asm = ops(bytes).map_or_else(|err| err, |ops| ops.to_asm(false));
    format!("LockingScript({}) /* ops:{} */", hex::encode(bytes), asm)
}

/// `UnlockingScript(<hex>) /* ops:<asm>, hashType:<Some(n)|None> */`
///
/// The hash type is recomputed from the parsed script every time.
pub fn describe_unlocking(bytes: &[u8]) -> String {
    match ops(bytes) {
        Ok(ops) => format!(
            "UnlockingScript({}) /* ops:{}, hashType:{:?} */",
            hex::encode(bytes),
            ops.to_asm(true),
            signature::hash_type_of(&ops)
        ),
        Err(err) => format!(
            "UnlockingScript({}) /* ops:{}, hashType:None */",
            hex::encode(bytes),
            err
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::{describe_locking, describe_unlocking};
    use crate::{op, testing::serialize};

    #[test]
    fn locking() {
        let script = serialize(&[
            op::DUP,
            op::HASH160,
            op::pushdata_bytelength(vec![0xab; 20]).expect("fits"),
            op::EQUALVERIFY,
            op::CHECKSIG,
        ]);
        let hash = "ab".repeat(20);
        assert_eq!(
            describe_locking(&script),
            format!(
                "LockingScript(76a914{}88ac) /* ops:OP_DUP OP_HASH160 {} OP_EQUALVERIFY OP_CHECKSIG */",
                hash, hash
            )
        );
    }

    #[test]
    fn unlocking_reports_hash_type() {
        let script = serialize(&[op::pushdata_bytelength(vec![0xaa, 0xbb, 0xcc, 0xdd, 0x03]).expect("fits")]);
        assert_eq!(
            describe_unlocking(&script),
            "UnlockingScript(05aabbccdd03) /* ops:aabbccdd03, hashType:Some(3) */"
        );
        assert_eq!(
            describe_unlocking(&[]),
            "UnlockingScript() /* ops:, hashType:None */"
        );
        assert_eq!(
            describe_unlocking(&serialize(&[op::_0])),
            "UnlockingScript(00) /* ops:0, hashType:None */"
        );
    }

    #[test]
    fn parse_failures_are_rendered() {
        assert_eq!(
            describe_locking(&[0x68]),
            "LockingScript(68) /* ops:<OP_ENDIF at offset 0 has no open conditional to terminate> */"
        );
        assert_eq!(
            describe_unlocking(&[0x02, 0xaa]),
            "UnlockingScript(02aa) /* ops:<push needs 2 bytes, but only 1 remain>, hashType:None */"
        );
    }

    #[test]
    fn deep_nesting_is_rendered_as_an_error() {
        let mut script = vec![0x63; 1_000_000];
        script.extend(vec![0x68; 1_000_000]);
        let described = describe_locking(&script);
        assert!(described.ends_with(
            "/* ops:<conditional opened at offset 256 nests deeper than 256> */"
        ));
    }

    #[test]
    fn branches_render_as_conditionals() {
        let script = serialize(&[op::_1, op::IF, op::_2, op::ELSE, op::_3, op::ENDIF]);
        assert_eq!(
            describe_locking(&script),
            "LockingScript(516352675368) /* ops:OP_1 OP_IF OP_2 OP_ELSE OP_3 OP_ENDIF */"
        );
    }
}
