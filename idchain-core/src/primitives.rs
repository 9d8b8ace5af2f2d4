//! Cryptographic primitives behind an injectable seam.
//!
//! All signing, verification, hashing and keyed hashing used by the key
//! chain and the attestation protocol goes through the [`Primitives`]
//! trait, so deterministic stubs can be substituted in tests. The default
//! implementation is RFC-8032 Ed25519 plus HMAC-SHA512.

use crate::types::{Hash256, KeyPair, PublicKey, SecretKeyBytes, SignatureBytes};
use hmac::{Hmac, Mac};
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

/// Stateless signing, verification and hashing operations.
///
/// Implementations must be deterministic: the same inputs always produce
/// the same outputs.
pub trait Primitives {
    /// Sign a message with the key pair's secret key.
    fn sign(&self, message: &[u8], key_pair: &KeyPair) -> SignatureBytes;

    /// Verify a detached signature. Returns `false` for any failure,
    /// including a public key that is not a valid curve point.
    fn verify(&self, message: &[u8], signature: &SignatureBytes, public_key: &PublicKey) -> bool;

    /// Generic 32-byte hash, used to bind payloads into data attestations.
    fn hash(&self, data: &[u8]) -> Hash256;

    /// HMAC-SHA512 with an arbitrary-length key.
    fn hmac_sha512(&self, key: &[u8], message: &[u8]) -> [u8; 64];

    /// Generate the Ed25519 key pair seeded by `seed`.
    fn key_pair_from_seed(&self, seed: &[u8; 32]) -> KeyPair;
}

/// Default primitives: `ed25519-dalek` signatures, BLAKE3 payload hashing,
/// HMAC-SHA512 key derivation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Primitives;

impl Primitives for Ed25519Primitives {
    fn sign(&self, message: &[u8], key_pair: &KeyPair) -> SignatureBytes {
        use ed25519_dalek::Signer as _;

        let signing_key = ed25519_dalek::SigningKey::from_bytes(key_pair.secret_key.seed());
        SignatureBytes(signing_key.sign(message).to_bytes())
    }

    fn verify(&self, message: &[u8], signature: &SignatureBytes, public_key: &PublicKey) -> bool {
        use ed25519_dalek::Verifier as _;

        let Ok(verifying_key) = ed25519_dalek::VerifyingKey::from_bytes(public_key) else {
            return false;
        };
        let signature = ed25519_dalek::Signature::from_bytes(signature.as_ref());

        verifying_key.verify(message, &signature).is_ok()
    }

    fn hash(&self, data: &[u8]) -> Hash256 {
        *blake3::hash(data).as_bytes()
    }

    fn hmac_sha512(&self, key: &[u8], message: &[u8]) -> [u8; 64] {
        let mut mac =
            HmacSha512::new_from_slice(key).expect("HMAC accepts keys of any length");
        mac.update(message);

        let mut out = [0u8; 64];
        out.copy_from_slice(&mac.finalize().into_bytes());
        out
    }

    fn key_pair_from_seed(&self, seed: &[u8; 32]) -> KeyPair {
        let signing_key = ed25519_dalek::SigningKey::from_bytes(seed);

        KeyPair {
            public_key: signing_key.verifying_key().to_bytes(),
            secret_key: SecretKeyBytes(signing_key.to_keypair_bytes()),
        }
    }
}

/// Generate a fresh random key pair (device enrolment, tests).
pub fn generate_key_pair() -> KeyPair {
    use rand::rngs::OsRng;
    use rand::RngCore;

    let mut seed = [0u8; 32];
    OsRng.fill_bytes(&mut seed);

    let pair = Ed25519Primitives.key_pair_from_seed(&seed);
    seed.iter_mut().for_each(|b| *b = 0);
    pair
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify() {
        let pair = generate_key_pair();
        let message = b"test message";

        let signature = Ed25519Primitives.sign(message, &pair);
        assert!(Ed25519Primitives.verify(message, &signature, &pair.public_key));
    }

    #[test]
    fn test_wrong_message_fails() {
        let pair = generate_key_pair();
        let signature = Ed25519Primitives.sign(b"correct message", &pair);

        assert!(!Ed25519Primitives.verify(b"wrong message", &signature, &pair.public_key));
    }

    #[test]
    fn test_verify_rejects_invalid_public_key() {
        let pair = generate_key_pair();
        let signature = Ed25519Primitives.sign(b"message", &pair);

        // Not a valid curve point
        let bogus = [0xFF; 32];
        assert!(!Ed25519Primitives.verify(b"message", &signature, &bogus));
    }

    #[test]
    fn test_hash_deterministic() {
        let hash1 = Ed25519Primitives.hash(b"test data");
        let hash2 = Ed25519Primitives.hash(b"test data");
        assert_eq!(hash1, hash2);
    }

    #[test]
    fn test_hmac_sha512_rfc4231_vector() {
        // RFC 4231 test case 2
        let out = Ed25519Primitives.hmac_sha512(b"Jefe", b"what do ya want for nothing?");
        assert_eq!(
            hex::encode(out),
            "164b7a7bfcf819e2e395fbe73b56e0a387bd64222e831fd610270cd7ea250554\
             9758bf75c05a994a6d034f65f8f0e6fdcaeab1a34d4a6b4b636e070a38bce737"
        );
    }

    #[test]
    fn test_key_pair_from_seed_deterministic() {
        let pair1 = Ed25519Primitives.key_pair_from_seed(&[9u8; 32]);
        let pair2 = Ed25519Primitives.key_pair_from_seed(&[9u8; 32]);

        assert_eq!(pair1.public_key, pair2.public_key);
        assert_eq!(pair1.secret_key.as_ref(), pair2.secret_key.as_ref());
        // libsodium layout: trailing half is the public key
        assert_eq!(&pair1.secret_key.as_ref()[32..], &pair1.public_key);
    }
}
