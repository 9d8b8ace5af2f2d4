//! Core types used across the identity system.

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Ed25519 public key (32 bytes, compressed form)
pub type PublicKey = [u8; 32];

/// Generic 32-byte hash output
pub type Hash256 = [u8; 32];

/// Derived symmetric key (32 bytes)
pub type SymmetricKey = [u8; 32];

/// Ed25519 signature (64 bytes) - wrapped for Serde support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureBytes(#[serde(with = "serde_arrays")] pub [u8; 64]);

impl From<[u8; 64]> for SignatureBytes {
    fn from(bytes: [u8; 64]) -> Self {
        SignatureBytes(bytes)
    }
}

impl AsRef<[u8; 64]> for SignatureBytes {
    fn as_ref(&self) -> &[u8; 64] {
        &self.0
    }
}

/// Ed25519 secret key (64 bytes, libsodium layout: seed followed by the
/// public key). Zeroized on drop; `Debug` never prints the bytes.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKeyBytes(pub [u8; 64]);

impl SecretKeyBytes {
    /// The 32-byte seed half, usable to regenerate the key pair.
    pub fn seed(&self) -> &[u8; 32] {
        self.0[..32].try_into().expect("slice is 32 bytes")
    }
}

impl From<[u8; 64]> for SecretKeyBytes {
    fn from(bytes: [u8; 64]) -> Self {
        SecretKeyBytes(bytes)
    }
}

impl AsRef<[u8; 64]> for SecretKeyBytes {
    fn as_ref(&self) -> &[u8; 64] {
        &self.0
    }
}

impl std::fmt::Debug for SecretKeyBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretKeyBytes")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// An Ed25519 key pair.
///
/// The secret half is always exactly the pair generated from its own
/// 32-byte seed; see [`crate::primitives::Primitives::key_pair_from_seed`].
#[derive(Clone)]
pub struct KeyPair {
    pub public_key: PublicKey,
    pub secret_key: SecretKeyBytes,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &hex::encode(&self.public_key[..8]))
            .finish()
    }
}

/// Root key material accepted at protocol boundaries.
///
/// Replaces duck-typed "is this a keychain?" probing with an explicit
/// tagged union: callers hand over a ready key pair, raw seed entropy,
/// or a mnemonic phrase to be run through the seed derivation boundary.
#[derive(Debug, Clone, Copy)]
pub enum KeyMaterial<'a> {
    /// A ready-made identity key pair.
    KeyPair(&'a KeyPair),
    /// Raw seed entropy; the identity key pair is derived at the
    /// canonical identity path.
    Seed(&'a [u8]),
    /// BIP-39 mnemonic phrase; converted to a seed first.
    Mnemonic(&'a str),
}

// Serde support for large arrays
mod serde_arrays {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 64], serializer: S) -> Result<S::Ok, S::Error> {
        bytes.as_slice().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 64], D::Error> {
        let bytes: Vec<u8> = Vec::deserialize(deserializer)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("Invalid signature length"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_key_debug_redacted() {
        let secret = SecretKeyBytes([0xAB; 64]);
        let debug = format!("{:?}", secret);

        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("171")); // 0xAB = 171
    }

    #[test]
    fn test_secret_key_seed_half() {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&[7u8; 32]);
        let secret = SecretKeyBytes(bytes);

        assert_eq!(secret.seed(), &[7u8; 32]);
    }

    #[test]
    fn test_signature_serde_roundtrip() {
        let sig = SignatureBytes([0x42; 64]);
        let json = serde_json::to_string(&sig).unwrap();
        let restored: SignatureBytes = serde_json::from_str(&json).unwrap();
        assert_eq!(sig, restored);
    }

    #[test]
    fn test_signature_serde_rejects_wrong_length() {
        let short = serde_json::to_string(&vec![1u8; 63]).unwrap();
        assert!(serde_json::from_str::<SignatureBytes>(&short).is_err());
    }
}
