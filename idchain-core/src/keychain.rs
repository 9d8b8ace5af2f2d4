//! Hierarchical deterministic key derivation.
//!
//! Implements SLIP-0010 Ed25519 derivation: a master node is produced by
//! keyed-hashing the seed, and children are derived along caller-chosen
//! index paths. Every index is forced into the hardened range, so child
//! keys can never be derived from public material alone.
//!
//! A second, domain-separated lineage derives 32-byte symmetric keys from
//! the same seed along UTF-8 label paths. The two lineages use distinct
//! master constants and cannot be derived from one another.

use crate::primitives::{Ed25519Primitives, Primitives};
use crate::types::{KeyPair, PublicKey, SecretKeyBytes, SymmetricKey};
use thiserror::Error;
use zeroize::Zeroize;

/// Master constant for the asymmetric (SLIP-0010) lineage.
const MASTER_CHAIN_CODE: &[u8] = b"ed25519 seed";

/// Master constant for the symmetric lineage.
const MASTER_SYMMETRIC_CODE: &[u8] = b"Symmetric key seed";

/// Indices at or above this value are hardened.
const HARDENED_OFFSET: u32 = 0x8000_0000;

/// Result type for key chain operations
pub type KeyChainResult<T> = Result<T, KeyChainError>;

/// Errors raised on misuse of the derivation engine.
///
/// These occur on trusted, locally controlled input and fail fast.
#[derive(Debug, Error)]
pub enum KeyChainError {
    /// Neither a seed nor a mnemonic was supplied
    #[error("no seed or mnemonic was provided")]
    MissingMaterial,

    /// The mnemonic phrase failed BIP-39 validation
    #[error("invalid mnemonic phrase: {0}")]
    InvalidMnemonic(String),
}

impl From<bip39::Error> for KeyChainError {
    fn from(err: bip39::Error) -> Self {
        KeyChainError::InvalidMnemonic(err.to_string())
    }
}

/// A node in the hierarchical derivation tree.
///
/// Holds the 32-byte chain key (the seed of this node's key pair), the
/// 32-byte chain code (entropy folded into child derivation), and the
/// Ed25519 key pair generated from the chain key. The key pair is always
/// exactly the pair seeded by `chain_key`; the fields are private so the
/// invariant cannot be broken from outside.
///
/// Derivation is pure: deriving a child never mutates the parent, and the
/// same (seed, path) always yields byte-identical output. Secret material
/// is zeroized when the node is dropped; call [`KeyChain::clear`] to wipe
/// it earlier.
pub struct KeyChain {
    chain_key: [u8; 32],
    chain_code: [u8; 32],
    key_pair: KeyPair,
}

impl KeyChain {
    /// Build a node from a seed, a mnemonic, or both, optionally deriving
    /// straight into `path`.
    ///
    /// A seed takes precedence over a mnemonic; a mnemonic alone is first
    /// converted through the BIP-39 seed derivation.
    ///
    /// # Errors
    ///
    /// [`KeyChainError::MissingMaterial`] when both inputs are `None`, or
    /// [`KeyChainError::InvalidMnemonic`] when the phrase fails validation.
    pub fn from_parts(
        seed: Option<&[u8]>,
        mnemonic: Option<&str>,
        path: Option<&[u32]>,
    ) -> KeyChainResult<Self> {
        Self::from_parts_with(&Ed25519Primitives, seed, mnemonic, path)
    }

    /// [`KeyChain::from_parts`] with injected primitives.
    pub fn from_parts_with<P: Primitives>(
        primitives: &P,
        seed: Option<&[u8]>,
        mnemonic: Option<&str>,
        path: Option<&[u32]>,
    ) -> KeyChainResult<Self> {
        let root = match (seed, mnemonic) {
            (Some(seed), _) => Self::master(primitives, seed),
            (None, Some(phrase)) => {
                let mut seed = seed_from_mnemonic(phrase)?;
                let root = Self::master(primitives, &seed);
                seed.zeroize();
                root
            }
            (None, None) => return Err(KeyChainError::MissingMaterial),
        };

        Ok(match path {
            Some(path) => root.derive_with(primitives, path),
            None => root,
        })
    }

    /// Build the master node from raw seed entropy.
    pub fn from_seed(seed: &[u8]) -> Self {
        Self::master(&Ed25519Primitives, seed)
    }

    /// Build the master node from a BIP-39 mnemonic phrase.
    pub fn from_mnemonic(phrase: &str) -> KeyChainResult<Self> {
        Self::from_parts(None, Some(phrase), None)
    }

    fn master<P: Primitives>(primitives: &P, seed: &[u8]) -> Self {
        let mut digest = primitives.hmac_sha512(MASTER_CHAIN_CODE, seed);

        let node = Self::from_digest(primitives, &digest);
        digest.zeroize();
        node
    }

    fn from_digest<P: Primitives>(primitives: &P, digest: &[u8; 64]) -> Self {
        let mut chain_key = [0u8; 32];
        let mut chain_code = [0u8; 32];
        chain_key.copy_from_slice(&digest[..32]);
        chain_code.copy_from_slice(&digest[32..]);

        let key_pair = primitives.key_pair_from_seed(&chain_key);

        KeyChain {
            chain_key,
            chain_code,
            key_pair,
        }
    }

    /// Derive the child node at `path`.
    ///
    /// Pure and non-mutating: the parent stays usable, and children can be
    /// derived from parent and child independently. Every index is forced
    /// hardened before use.
    pub fn derive(&self, path: &[u32]) -> KeyChain {
        self.derive_with(&Ed25519Primitives, path)
    }

    /// [`KeyChain::derive`] with injected primitives.
    pub fn derive_with<P: Primitives>(&self, primitives: &P, path: &[u32]) -> KeyChain {
        tracing::trace!(depth = path.len(), "deriving child key chain");

        let mut chain_key = self.chain_key;
        let mut chain_code = self.chain_code;

        for &step in path {
            let index = step | HARDENED_OFFSET;

            // 0x00 | chain key (32 bytes) | index (big-endian u32)
            let mut message = [0u8; 37];
            message[1..33].copy_from_slice(&chain_key);
            message[33..].copy_from_slice(&index.to_be_bytes());

            let mut digest = primitives.hmac_sha512(&chain_code, &message);
            chain_key.copy_from_slice(&digest[..32]);
            chain_code.copy_from_slice(&digest[32..]);

            message.zeroize();
            digest.zeroize();
        }

        let key_pair = primitives.key_pair_from_seed(&chain_key);

        KeyChain {
            chain_key,
            chain_code,
            key_pair,
        }
    }

    /// The Ed25519 key pair seeded by this node's chain key.
    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    /// This node's public key (32 bytes).
    pub fn public_key(&self) -> &PublicKey {
        &self.key_pair.public_key
    }

    /// This node's secret key (64 bytes, libsodium layout).
    pub fn secret_key(&self) -> &SecretKeyBytes {
        &self.key_pair.secret_key
    }

    /// The 32-byte chain key (the seed of this node's key pair).
    pub fn chain_key(&self) -> &[u8; 32] {
        &self.chain_key
    }

    /// The 32-byte chain code (entropy for child derivation).
    pub fn chain_code(&self) -> &[u8; 32] {
        &self.chain_code
    }

    /// Zero all secret byte arrays in place.
    ///
    /// Best-effort hygiene, not a boundary against memory inspection. The
    /// node is unusable afterwards. Dropping a node wipes it as well.
    pub fn clear(&mut self) {
        self.chain_key.zeroize();
        self.chain_code.zeroize();
        self.key_pair.secret_key.0.zeroize();
    }
}

impl Drop for KeyChain {
    fn drop(&mut self) {
        self.chain_key.zeroize();
        self.chain_code.zeroize();
        // key_pair.secret_key zeroizes itself on drop
    }
}

impl std::fmt::Debug for KeyChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyChain")
            .field("public_key", &hex::encode(&self.key_pair.public_key[..8]))
            .field("chain_key", &"[REDACTED]")
            .field("chain_code", &"[REDACTED]")
            .finish()
    }
}

/// Derive a 32-byte symmetric key from `seed` along a label path.
///
/// Uses an independent lineage seeded by its own master constant, so
/// symmetric keys and asymmetric chain keys can never be derived from one
/// another.
pub fn derive_symmetric<S: AsRef<str>>(seed: &[u8], labels: &[S]) -> SymmetricKey {
    derive_symmetric_with(&Ed25519Primitives, seed, labels)
}

/// [`derive_symmetric`] with injected primitives.
pub fn derive_symmetric_with<P: Primitives, S: AsRef<str>>(
    primitives: &P,
    seed: &[u8],
    labels: &[S],
) -> SymmetricKey {
    let mut state = primitives.hmac_sha512(MASTER_SYMMETRIC_CODE, seed);

    for label in labels {
        let raw = label.as_ref().as_bytes();

        // 0x00 | label (UTF-8)
        let mut message = Vec::with_capacity(raw.len() + 1);
        message.push(0u8);
        message.extend_from_slice(raw);

        let next = primitives.hmac_sha512(&state[..32], &message);
        state.zeroize();
        state = next;
    }

    let mut key = [0u8; 32];
    key.copy_from_slice(&state[32..]);
    state.zeroize();
    key
}

/// Generate a fresh 24-word BIP-39 mnemonic from OS entropy.
pub fn generate_mnemonic() -> String {
    use rand::rngs::OsRng;
    use rand::RngCore;

    let mut entropy = [0u8; 32];
    OsRng.fill_bytes(&mut entropy);

    let mnemonic =
        bip39::Mnemonic::from_entropy(&entropy).expect("32 bytes is valid BIP-39 entropy");
    entropy.zeroize();

    mnemonic.to_string()
}

/// Convert a BIP-39 mnemonic phrase to its 64-byte seed (empty passphrase).
pub fn seed_from_mnemonic(phrase: &str) -> KeyChainResult<[u8; 64]> {
    let normalized = phrase.trim().to_lowercase();
    let mnemonic = bip39::Mnemonic::parse_normalized(&normalized)?;

    Ok(mnemonic.to_seed(""))
}
