//! Attestation proofs: building and verifying chains of device trust.
//!
//! A proof binds a root identity key to zero or more delegated device
//! keys and, optionally, to one signed payload. Each chain entry is signed
//! by its parent (the identity for the first entry, the previous device
//! after that), so a verifier replays the signatures root-to-tip instead
//! of checking one aggregate signature.
//!
//! A proof moves through these states:
//!
//! ```text
//! ROOTED (identity + epoch, empty chain)
//!   -> DEVICE-EXTENDED (0..n device attestations)
//!   -> DATA-SEALED (terminal; at most one data attestation)
//! ```
//!
//! Building misuse raises an error; [`Protocol::verify`] processes
//! attacker-controlled bytes and therefore never raises - any malformed or
//! tampered input yields `None`.

use crate::codec::{self, CodecError};
use crate::identity::IdentityError;
use crate::primitives::{Ed25519Primitives, Primitives};
use crate::types::{KeyMaterial, KeyPair, PublicKey, SignatureBytes};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Current proof schema version. Version 0 is permanently retired: it is
/// decoded to an empty sentinel and never verifies.
pub const PROOF_VERSION: u32 = 1;

/// A device key and the signature of the parent that authorized it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAttestation {
    /// Newly authorized device public key
    pub public_key: PublicKey,
    /// Parent signature over `{epoch, identity, device}`
    pub signature: SignatureBytes,
}

/// Seals a proof to one specific payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataAttestation {
    /// Chain-tip signature over `{epoch, identity, hash(payload)}`
    pub signature: SignatureBytes,
}

/// A portable, independently verifiable chain of trust.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    /// Schema version
    pub version: u32,
    /// Creation time, whole seconds
    pub epoch: u64,
    /// Root identity public key
    pub identity: PublicKey,
    /// Device attestations, root-to-tip
    pub chain: Vec<DeviceAttestation>,
    /// Optional terminal data attestation
    pub data: Option<DataAttestation>,
}

impl Proof {
    /// Serialize to wire bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        codec::encode_proof(self)
    }

    /// Deserialize from wire bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        codec::decode_proof(bytes)
    }

    /// The empty sentinel a retired version-0 payload decodes to.
    pub fn retired() -> Self {
        Proof {
            version: 0,
            epoch: 0,
            identity: [0u8; 32],
            chain: Vec::new(),
            data: None,
        }
    }

    /// The key currently speaking for this proof: the last attested
    /// device, or the identity itself while the chain is empty.
    pub fn current_device(&self) -> &PublicKey {
        self.chain
            .last()
            .map(|entry| &entry.public_key)
            .unwrap_or(&self.identity)
    }
}

/// Freshness token returned on successful verification.
///
/// Callers persist the encoded form and pass it back via
/// [`VerifyOptions::receipt`] to reject any later proof whose epoch
/// regressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Proof creation time, whole seconds
    pub epoch: u64,
}

impl Receipt {
    /// Serialize to the opaque token form.
    pub fn to_bytes(&self) -> Vec<u8> {
        codec::encode_receipt(self)
    }

    /// Deserialize a token.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        codec::decode_receipt(bytes)
    }
}

/// Successful verification result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verified {
    /// Freshness token for this proof's epoch
    pub receipt: Receipt,
    /// The root identity that anchors the chain
    pub identity_public_key: PublicKey,
    /// The device at the chain tip (the identity itself for an empty chain)
    pub device_public_key: PublicKey,
}

/// Optional checks applied during verification.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerifyOptions<'a> {
    /// Encoded [`Receipt`]; proofs older than it are rejected
    pub receipt: Option<&'a [u8]>,
    /// Require the proof to anchor at exactly this identity
    pub expected_identity: Option<PublicKey>,
    /// Require the chain tip to be exactly this device
    pub expected_device: Option<PublicKey>,
}

/// Errors raised when building proofs from locally controlled input.
///
/// Verification failures are deliberately not represented here;
/// [`Protocol::verify`] signals them by returning `None`.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The proof carries a retired or unknown schema version
    #[error("unsupported proof version {0}")]
    UnsupportedVersion(u32),

    /// A data attestation already seals this proof
    #[error("proof is sealed by a data attestation")]
    Sealed,

    /// `None` is reserved to mean "no payload" and cannot be attested
    #[error("cannot attest an absent payload")]
    NotAttestable,

    /// Malformed proof bytes
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Root key material could not be resolved
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

/// The attestation protocol over a set of injected primitives.
#[derive(Debug, Clone, Default)]
pub struct Protocol<P: Primitives = Ed25519Primitives> {
    primitives: P,
}

impl Protocol<Ed25519Primitives> {
    /// Protocol over the default Ed25519 primitives.
    pub fn new() -> Self {
        Protocol {
            primitives: Ed25519Primitives,
        }
    }
}

impl<P: Primitives> Protocol<P> {
    /// Protocol over caller-supplied primitives.
    pub fn with_primitives(primitives: P) -> Self {
        Protocol { primitives }
    }

    /// Create a proof rooted at `root` and authorize a first device.
    ///
    /// The root identity key pair is accepted directly or derived from
    /// seed or mnemonic material at the canonical identity position.
    pub fn bootstrap(
        &self,
        root: KeyMaterial<'_>,
        device: &PublicKey,
    ) -> Result<Vec<u8>, ProtocolError> {
        let root = root.identity_key_pair()?;

        let mut proof = Proof {
            version: PROOF_VERSION,
            epoch: epoch_now(),
            identity: root.public_key,
            chain: Vec::new(),
            data: None,
        };

        self.append_device(&mut proof, device, &root);
        Ok(proof.to_bytes())
    }

    /// Append a device attestation to an encoded proof.
    ///
    /// `signer` must hold the identity key for the first entry, or any
    /// previously attested device key after that - delegation nests to
    /// arbitrary depth. A proof already sealed by a data attestation
    /// refuses further devices.
    pub fn attest_device(
        &self,
        device: &PublicKey,
        signer: &KeyPair,
        proof: &[u8],
    ) -> Result<Vec<u8>, ProtocolError> {
        let mut proof = Proof::from_bytes(proof)?;
        check_version(&proof)?;
        if proof.data.is_some() {
            return Err(ProtocolError::Sealed);
        }

        self.append_device(&mut proof, device, signer);
        Ok(proof.to_bytes())
    }

    /// Seal a proof to one payload.
    ///
    /// With no prior proof, a fresh one is rooted at the signer itself
    /// (self-attestation, empty chain). Re-attesting overwrites the
    /// previous data attestation; the last write wins.
    ///
    /// `payload` is `None` only as the reserved "no payload" sentinel,
    /// which is a misuse error here.
    pub fn attest_data(
        &self,
        payload: Option<&[u8]>,
        signer: &KeyPair,
        proof: Option<&[u8]>,
    ) -> Result<Vec<u8>, ProtocolError> {
        let payload = payload.ok_or(ProtocolError::NotAttestable)?;

        let mut proof = match proof {
            Some(bytes) => {
                let proof = Proof::from_bytes(bytes)?;
                check_version(&proof)?;
                proof
            }
            None => Proof {
                version: PROOF_VERSION,
                epoch: epoch_now(),
                identity: signer.public_key,
                chain: Vec::new(),
                data: None,
            },
        };

        let payload_hash = self.primitives.hash(payload);
        let signable = codec::data_signable(proof.epoch, &proof.identity, &payload_hash);
        proof.data = Some(DataAttestation {
            signature: self.primitives.sign(&signable, signer),
        });

        Ok(proof.to_bytes())
    }

    /// Check an encoded proof against an optional payload and options.
    ///
    /// Total over attacker-controlled input: every malformed, tampered,
    /// stale or mismatched proof yields `None`, never a panic or an error.
    /// The input is never mutated.
    pub fn verify(
        &self,
        proof: &[u8],
        payload: Option<&[u8]>,
        options: &VerifyOptions<'_>,
    ) -> Option<Verified> {
        let proof = match Proof::from_bytes(proof) {
            Ok(proof) => proof,
            Err(err) => {
                debug!(%err, "proof rejected: malformed encoding");
                return None;
            }
        };

        if proof.version == 0 || proof.version > PROOF_VERSION {
            debug!(version = proof.version, "proof rejected: unsupported version");
            return None;
        }

        if let Some(bytes) = options.receipt {
            let receipt = match Receipt::from_bytes(bytes) {
                Ok(receipt) => receipt,
                Err(_) => {
                    debug!("proof rejected: malformed receipt");
                    return None;
                }
            };
            if proof.epoch < receipt.epoch {
                debug!(
                    epoch = proof.epoch,
                    floor = receipt.epoch,
                    "proof rejected: epoch regressed"
                );
                return None;
            }
        }

        if let Some(expected) = options.expected_identity {
            if expected != proof.identity {
                debug!("proof rejected: identity mismatch");
                return None;
            }
        }

        // A payload and a data attestation only make sense together
        if payload.is_some() != proof.data.is_some() {
            debug!("proof rejected: payload and data attestation mismatch");
            return None;
        }

        let candidate = *proof.current_device();
        if let Some(expected) = options.expected_device {
            if expected != candidate {
                debug!("proof rejected: device mismatch");
                return None;
            }
        }

        // Replay the chain root-to-tip; each entry is signed by its parent
        for (i, entry) in proof.chain.iter().enumerate() {
            let parent = if i == 0 {
                &proof.identity
            } else {
                &proof.chain[i - 1].public_key
            };

            let signable = codec::device_signable(proof.epoch, &proof.identity, &entry.public_key);
            if !self.primitives.verify(&signable, &entry.signature, parent) {
                debug!(entry = i, "proof rejected: device signature invalid");
                return None;
            }
        }

        if let Some(data) = &proof.data {
            let payload = payload?;
            let payload_hash = self.primitives.hash(payload);

            let signable = codec::data_signable(proof.epoch, &proof.identity, &payload_hash);
            if !self.primitives.verify(&signable, &data.signature, &candidate) {
                debug!("proof rejected: data signature invalid");
                return None;
            }
        }

        Some(Verified {
            receipt: Receipt { epoch: proof.epoch },
            identity_public_key: proof.identity,
            device_public_key: candidate,
        })
    }

    fn append_device(&self, proof: &mut Proof, device: &PublicKey, signer: &KeyPair) {
        let signable = codec::device_signable(proof.epoch, &proof.identity, device);

        proof.chain.push(DeviceAttestation {
            public_key: *device,
            signature: self.primitives.sign(&signable, signer),
        });
    }
}

fn check_version(proof: &Proof) -> Result<(), ProtocolError> {
    if proof.version == 0 || proof.version > PROOF_VERSION {
        return Err(ProtocolError::UnsupportedVersion(proof.version));
    }
    Ok(())
}

fn epoch_now() -> u64 {
    Utc::now().timestamp().max(0) as u64
}
