//! Canonical derivation positions and the session identity record.
//!
//! Identity and discovery keys live at fixed, hardened positions under a
//! BIP-43 purpose and a project coin type:
//!
//!   identity  -> m/44'/8191'/0'/0'/0'
//!   discovery -> m/44'/8191'/0'/0'/1'
//!
//! Symmetric keys live in the separate label lineage under the application
//! namespace, e.g. per-profile keys at `["idchain", "profile", hex(key)]`.

use crate::keychain::{self, KeyChain, KeyChainError};
use crate::primitives::{Ed25519Primitives, Primitives};
use crate::types::{KeyMaterial, KeyPair, PublicKey, SymmetricKey};
use thiserror::Error;

/// BIP-43 purpose field
/// https://github.com/bitcoin/bips/blob/master/bip-0043.mediawiki
pub const BIP43_PURPOSE: u32 = 44;

/// Project coin type (unregistered; see
/// https://github.com/satoshilabs/slips/blob/master/slip-0044.md)
pub const IDCHAIN_SLIP44: u32 = 8191;

/// First label of every symmetric derivation path.
pub const SYMMETRIC_NAMESPACE: &str = "idchain";

/// Errors raised at the identity boundary.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Account recovery beyond index 0 is not supported
    #[error("account {0} is not supported (only account 0 is implemented)")]
    NotImplemented(u32),

    /// Underlying derivation failure
    #[error(transparent)]
    KeyChain(#[from] KeyChainError),
}

/// Canonical identity path for `account`.
///
/// Only account 0 is implemented; other values fail with
/// [`IdentityError::NotImplemented`].
pub fn identity_path(account: u32) -> Result<[u32; 5], IdentityError> {
    if account != 0 {
        return Err(IdentityError::NotImplemented(account));
    }
    Ok([BIP43_PURPOSE, IDCHAIN_SLIP44, 0, account, 0])
}

/// Canonical discovery path, adjacent to the identity position.
pub fn discovery_path(account: u32) -> Result<[u32; 5], IdentityError> {
    if account != 0 {
        return Err(IdentityError::NotImplemented(account));
    }
    Ok([BIP43_PURPOSE, IDCHAIN_SLIP44, 0, account, 1])
}

/// The key pairs of one logged-in session.
///
/// Derived at the canonical positions; destroyed by zeroing the secret
/// byte arrays on [`IdentityRecord::clear`] or on drop.
#[derive(Debug)]
pub struct IdentityRecord {
    /// Root identity key chain (signs the first device attestation)
    pub identity: KeyChain,
    /// Discovery key chain (network rendezvous)
    pub discovery: KeyChain,
}

impl IdentityRecord {
    /// Derive the session identity from a seed and/or mnemonic.
    pub fn from_parts(seed: Option<&[u8]>, mnemonic: Option<&str>) -> Result<Self, IdentityError> {
        Self::from_parts_with(&Ed25519Primitives, seed, mnemonic)
    }

    /// [`IdentityRecord::from_parts`] with injected primitives.
    pub fn from_parts_with<P: Primitives>(
        primitives: &P,
        seed: Option<&[u8]>,
        mnemonic: Option<&str>,
    ) -> Result<Self, IdentityError> {
        let root = KeyChain::from_parts_with(primitives, seed, mnemonic, None)?;

        Ok(IdentityRecord {
            identity: root.derive_with(primitives, &identity_path(0)?),
            discovery: root.derive_with(primitives, &discovery_path(0)?),
        })
    }

    /// Derive the session identity from raw seed entropy.
    pub fn from_seed(seed: &[u8]) -> Result<Self, IdentityError> {
        Self::from_parts(Some(seed), None)
    }

    /// Derive the session identity from a mnemonic phrase.
    pub fn from_mnemonic(phrase: &str) -> Result<Self, IdentityError> {
        Self::from_parts(None, Some(phrase))
    }

    /// The root identity public key other parties pin.
    pub fn identity_public_key(&self) -> &PublicKey {
        self.identity.public_key()
    }

    /// Zero all secret byte arrays of the session.
    pub fn clear(&mut self) {
        self.identity.clear();
        self.discovery.clear();
    }
}

impl KeyMaterial<'_> {
    /// Resolve this material to the root identity key pair: a key pair is
    /// used as-is; seed or mnemonic material is derived at the canonical
    /// identity position.
    pub fn identity_key_pair(&self) -> Result<KeyPair, IdentityError> {
        match *self {
            KeyMaterial::KeyPair(pair) => Ok(pair.clone()),
            KeyMaterial::Seed(seed) => {
                let path = identity_path(0)?;
                let node = KeyChain::from_parts(Some(seed), None, Some(path.as_slice()))?;
                Ok(node.key_pair().clone())
            }
            KeyMaterial::Mnemonic(phrase) => {
                let path = identity_path(0)?;
                let node = KeyChain::from_parts(None, Some(phrase), Some(path.as_slice()))?;
                Ok(node.key_pair().clone())
            }
        }
    }
}

/// Symmetric key encrypting the profile addressed by `public_key`.
///
/// Derived under the application namespace with the hex-encoded public key
/// as the final label, so every profile gets an independent key.
pub fn profile_key(seed: &[u8], public_key: &PublicKey) -> SymmetricKey {
    keychain::derive_symmetric(
        seed,
        &[SYMMETRIC_NAMESPACE, "profile", &hex::encode(public_key)],
    )
}
