//! # idchain-core
//!
//! Stable cryptographic identity derived from a seed, plus a protocol for
//! that identity to authorize devices and sign payloads as a portable,
//! independently verifiable chain of trust.
//!
//! ## Key Features
//! - **Deterministic derivation**: SLIP-0010 Ed25519 key chains, bit-exact
//!   against the published test vectors, plus a domain-separated symmetric
//!   lineage
//! - **Attestation chains**: a root identity authorizes devices, devices
//!   authorize further devices, and the chain tip can seal one payload
//! - **Total verification**: proofs are attacker-controlled bytes;
//!   [`Protocol::verify`] rejects every malformed or tampered input
//!   without raising
//! - **Anti-rollback receipts**: verification returns a freshness token
//!   that rejects regressed proofs
//!
//! ## Example
//!
//! ```
//! use idchain_core::{generate_mnemonic, KeyMaterial, Protocol, VerifyOptions};
//!
//! let mnemonic = generate_mnemonic();
//! let device = idchain_core::primitives::generate_key_pair();
//!
//! let protocol = Protocol::new();
//! let proof = protocol
//!     .bootstrap(KeyMaterial::Mnemonic(&mnemonic), &device.public_key)
//!     .unwrap();
//!
//! let auth = protocol.verify(&proof, None, &VerifyOptions::default()).unwrap();
//! assert_eq!(auth.device_public_key, device.public_key);
//! ```

pub mod codec;
pub mod identity;
pub mod keychain;
pub mod primitives;
pub mod proof;
pub mod types;

pub use codec::CodecError;
pub use identity::{
    discovery_path, identity_path, profile_key, IdentityError, IdentityRecord, BIP43_PURPOSE,
    IDCHAIN_SLIP44, SYMMETRIC_NAMESPACE,
};
pub use keychain::{
    derive_symmetric, generate_mnemonic, seed_from_mnemonic, KeyChain, KeyChainError,
};
pub use primitives::{Ed25519Primitives, Primitives};
pub use proof::{
    DataAttestation, DeviceAttestation, Proof, Protocol, ProtocolError, Receipt, Verified,
    VerifyOptions, PROOF_VERSION,
};
pub use types::{Hash256, KeyMaterial, KeyPair, PublicKey, SecretKeyBytes, SignatureBytes, SymmetricKey};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_session_flow() {
        // Enrol: derive a session identity, authorize this device
        let mnemonic = generate_mnemonic();
        let record = IdentityRecord::from_mnemonic(&mnemonic).unwrap();
        let device = primitives::generate_key_pair();

        let protocol = Protocol::new();
        let proof = protocol
            .bootstrap(
                KeyMaterial::KeyPair(record.identity.key_pair()),
                &device.public_key,
            )
            .unwrap();

        // The device seals a payload and a verifier pins the identity
        let sealed = protocol
            .attest_data(Some(b"hello"), &device, Some(&proof))
            .unwrap();

        let options = VerifyOptions {
            expected_identity: Some(*record.identity_public_key()),
            ..Default::default()
        };
        let auth = protocol.verify(&sealed, Some(b"hello"), &options).unwrap();

        assert_eq!(auth.identity_public_key, *record.identity_public_key());
        assert_eq!(auth.device_public_key, device.public_key);
    }
}
