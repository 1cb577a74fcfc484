#![no_main]

use libfuzzer_sys::fuzz_target;

use coin_script::{
    interpreter::{CallbackTransactionSignatureChecker, Flags, Limits},
    printer,
    signature::HashType,
    verify,
};

fn missing_sighash(_script_code: &[u8], _hash_type: &HashType) -> Option<[u8; 32]> {
    None
}

fuzz_target!(|tup: (u32, bool, &[u8], &[u8], u32)| {
    // `fuzz_target!` doesn’t support pattern matching in the parameter list.
    let (lock_time, is_final, unlocking, locking, flag_bits) = tup;
    let flags = Flags::from_bits_truncate(flag_bits);
    let checker = CallbackTransactionSignatureChecker {
        sighash: &missing_sighash,
        lock_time: lock_time.into(),
        is_final,
    };
    // Any outcome is fine, as long as there is one.
    let _ = verify::verify(unlocking, locking, &Limits::default(), flags, &checker);
    let _ = printer::describe_unlocking(unlocking);
    let _ = printer::describe_locking(locking);
});
