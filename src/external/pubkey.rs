use secp256k1::{ecdsa, Message, PublicKey, Secp256k1};

/// An encoded public key, as found on the stack. Nothing about it is checked until it is used.
pub struct PubKey<'a>(pub &'a [u8]);

impl PubKey<'_> {
    /// Length of an uncompressed key (`0x04` followed by both coordinates).
    pub const SIZE: usize = 65;
    /// Length of a compressed key (`0x02` or `0x03` followed by the x coordinate).
    pub const COMPRESSED_SIZE: usize = 33;

    /// Check syntactic correctness.
    ///
    /// Note that this is consensus critical as `check_sig` calls it!
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
    }

    /// Verify a DER signature against a 32-byte message hash.
    /// If this public key is not fully valid, the return value will be false.
    pub fn verify(&self, hash: &[u8; 32], sig: &ecdsa::Signature) -> bool {
        if !self.is_valid() {
            return false;
        };

        PublicKey::from_slice(self.0).is_ok_and(|pubkey| {
            Secp256k1::verification_only()
                .verify_ecdsa(&Message::from_digest(*hash), sig, &pubkey)
                .is_ok()
        })
    }

    /// Whether `sig` already has the lower of its two equivalent `s` values.
    pub fn check_low_s(sig: &ecdsa::Signature) -> bool {
        let mut normalized = *sig;
        normalized.normalize_s();
        *sig == normalized
    }
}

#[cfg(test)]
mod tests {
    use secp256k1::{ecdsa, Message, Secp256k1, SecretKey};

    use super::PubKey;

    #[test]
    fn verifies_its_own_signatures() {
        let secp = Secp256k1::new();
        let secret = SecretKey::from_slice(&[0x11; 32]).expect("in range");
        let key = secret.public_key(&secp).serialize();
        let hash = [0x42; 32];
        let sig = secp.sign_ecdsa(&Message::from_digest(hash), &secret);

        assert!(PubKey::check_low_s(&sig));
        assert!(PubKey(&key).verify(&hash, &sig));
        assert!(!PubKey(&key).verify(&[0x43; 32], &sig));
        assert!(!PubKey(&[]).verify(&hash, &sig));
        assert!(!PubKey(&key[1..]).verify(&hash, &sig));
    }

    #[test]
    fn high_s_is_detected() {
        // r = 1, s = n - 1
        let der = hex::decode(
            "3026020101022100fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364140",
        )
        .expect("valid hex");
        let sig = ecdsa::Signature::from_der(&der).expect("valid DER");
        assert!(!PubKey::check_low_s(&sig));
    }
}
