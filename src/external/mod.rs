//! Wrappers around the secp256k1 library.

pub(crate) mod pubkey;
