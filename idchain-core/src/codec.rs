//! Deterministic binary encoding for proofs, receipts and signables.
//!
//! ## Wire layout (big-endian, fixed-width)
//!
//! ```text
//! proof   := version:u32 | epoch:u64 | identity:[32] | count:u32 |
//!            count * (public_key:[32] | signature:[64]) |
//!            flags:u32 | data_signature:[64] when flags bit0 is set
//! receipt := epoch:u64
//! ```
//!
//! Encoding is order-preserving and reproducible: the same proof always
//! encodes to the same bytes. Flags bits other than bit0 are written as
//! zero and ignored on decode, so newer writers stay readable.
//!
//! The two signable layouts (device, data) are encode-only. They are never
//! stored, only fed to the signing primitive; decoding one is always a
//! misuse error, so a signable buffer can never be confused with a stored
//! structure.
//!
//! Decoding a retired version-0 proof yields the empty sentinel instead of
//! an error, so old data cannot crash a reader. The sentinel never passes
//! verification.

use crate::proof::{DataAttestation, DeviceAttestation, Proof, Receipt, PROOF_VERSION};
use crate::types::{Hash256, PublicKey, SignatureBytes};
use thiserror::Error;

/// Signable tag: a device key authorized by its parent.
const ATTESTED_DEVICE: u8 = 0;

/// Signable tag: a payload hash sealed by the chain tip.
const ATTESTED_DATA: u8 = 1;

/// Flags bit marking a data attestation as present.
const FLAG_DATA_ATTESTED: u32 = 1;

/// Encoded size of one chain entry.
const DEVICE_ENTRY_LEN: usize = 32 + 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("{0} trailing bytes after decoded value")]
    TrailingBytes(usize),

    #[error("chain length {0} exceeds remaining input")]
    ChainLength(u32),

    #[error("signed data should only be encoded")]
    SignableDecode,
}

pub type Result<T> = std::result::Result<T, CodecError>;

/// Serialize a proof to its wire form.
pub fn encode_proof(proof: &Proof) -> Vec<u8> {
    let mut buf = Vec::with_capacity(
        4 + 8 + 32 + 4 + proof.chain.len() * DEVICE_ENTRY_LEN + 4 + 64,
    );

    buf.extend_from_slice(&proof.version.to_be_bytes());
    buf.extend_from_slice(&proof.epoch.to_be_bytes());
    buf.extend_from_slice(&proof.identity);

    buf.extend_from_slice(&(proof.chain.len() as u32).to_be_bytes());
    for entry in &proof.chain {
        buf.extend_from_slice(&entry.public_key);
        buf.extend_from_slice(entry.signature.as_ref());
    }

    let flags = if proof.data.is_some() {
        FLAG_DATA_ATTESTED
    } else {
        0
    };
    buf.extend_from_slice(&flags.to_be_bytes());

    if let Some(data) = &proof.data {
        buf.extend_from_slice(data.signature.as_ref());
    }

    buf
}

/// Deserialize a proof from its wire form.
///
/// Version-0 input returns the retired sentinel without reading further.
/// Everything else is strict: truncated input, an oversized chain count,
/// or unread trailing bytes are errors.
pub fn decode_proof(bytes: &[u8]) -> Result<Proof> {
    let mut reader = Reader::new(bytes);

    let version = reader.read_u32()?;
    if version == 0 {
        return Ok(Proof::retired());
    }

    let epoch = reader.read_u64()?;
    let identity: PublicKey = reader.read_array()?;

    let count = reader.read_u32()?;
    if u64::from(count) * DEVICE_ENTRY_LEN as u64 > reader.remaining() as u64 {
        return Err(CodecError::ChainLength(count));
    }

    let mut chain = Vec::with_capacity(count as usize);
    for _ in 0..count {
        chain.push(DeviceAttestation {
            public_key: reader.read_array()?,
            signature: SignatureBytes(reader.read_array()?),
        });
    }

    let flags = reader.read_u32()?;
    let data = if flags & FLAG_DATA_ATTESTED != 0 {
        Some(DataAttestation {
            signature: SignatureBytes(reader.read_array()?),
        })
    } else {
        None
    };

    reader.finish()?;

    Ok(Proof {
        version,
        epoch,
        identity,
        chain,
        data,
    })
}

/// Serialize a receipt.
pub fn encode_receipt(receipt: &Receipt) -> Vec<u8> {
    receipt.epoch.to_be_bytes().to_vec()
}

/// Deserialize a receipt; exactly eight bytes.
pub fn decode_receipt(bytes: &[u8]) -> Result<Receipt> {
    let mut reader = Reader::new(bytes);
    let epoch = reader.read_u64()?;
    reader.finish()?;

    Ok(Receipt { epoch })
}

/// Bytes a parent signs to authorize `device` under `identity`.
pub(crate) fn device_signable(epoch: u64, identity: &PublicKey, device: &PublicKey) -> [u8; 73] {
    signable(ATTESTED_DEVICE, epoch, identity, device)
}

/// Bytes the chain tip signs to seal a proof to `payload_hash`.
pub(crate) fn data_signable(epoch: u64, identity: &PublicKey, payload_hash: &Hash256) -> [u8; 73] {
    signable(ATTESTED_DATA, epoch, identity, payload_hash)
}

fn signable(tag: u8, epoch: u64, identity: &PublicKey, subject: &[u8; 32]) -> [u8; 73] {
    let mut buf = [0u8; 73];
    buf[0] = tag;
    buf[1..9].copy_from_slice(&epoch.to_be_bytes());
    buf[9..41].copy_from_slice(identity);
    buf[41..].copy_from_slice(subject);
    buf
}

/// Signable layouts are never stored, so decoding one is always a misuse
/// error regardless of content.
pub fn decode_signable(_bytes: &[u8]) -> Result<()> {
    Err(CodecError::SignableDecode)
}

/// Strict big-endian reader over a borrowed buffer.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Reader { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(CodecError::UnexpectedEof);
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_u32(&mut self) -> Result<u32> {
        let bytes: [u8; 4] = self.read_array()?;
        Ok(u32::from_be_bytes(bytes))
    }

    fn read_u64(&mut self) -> Result<u64> {
        let bytes: [u8; 8] = self.read_array()?;
        Ok(u64::from_be_bytes(bytes))
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let slice = self.take(N)?;
        Ok(slice.try_into().expect("slice has requested length"))
    }

    fn finish(&self) -> Result<()> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(CodecError::TrailingBytes(n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_proof(entries: usize, with_data: bool) -> Proof {
        Proof {
            version: PROOF_VERSION,
            epoch: 1_700_000_000,
            identity: [0xAA; 32],
            chain: (0..entries)
                .map(|i| DeviceAttestation {
                    public_key: [i as u8; 32],
                    signature: SignatureBytes([0x10 + i as u8; 64]),
                })
                .collect(),
            data: with_data.then(|| DataAttestation {
                signature: SignatureBytes([0xDD; 64]),
            }),
        }
    }

    #[test]
    fn test_roundtrip_empty_chain() {
        let proof = sample_proof(0, false);
        let decoded = decode_proof(&encode_proof(&proof)).unwrap();
        assert_eq!(proof, decoded);
    }

    #[test]
    fn test_roundtrip_with_chain_and_data() {
        let proof = sample_proof(3, true);
        let decoded = decode_proof(&encode_proof(&proof)).unwrap();
        assert_eq!(proof, decoded);
    }

    #[test]
    fn test_version_zero_decodes_to_sentinel() {
        // Arbitrary garbage after the version field is ignored
        let mut bytes = 0u32.to_be_bytes().to_vec();
        bytes.extend_from_slice(&[0xFF; 40]);

        let proof = decode_proof(&bytes).unwrap();
        assert_eq!(proof, Proof::retired());
        assert_eq!(proof.version, 0);
        assert!(proof.chain.is_empty());
    }

    #[test]
    fn test_truncated_input_fails() {
        let bytes = encode_proof(&sample_proof(2, true));

        for len in 1..bytes.len() {
            // A version-0 prefix is the sentinel case, not a truncation
            if len >= 4 {
                assert!(
                    decode_proof(&bytes[..len]).is_err(),
                    "truncation at {len} must fail"
                );
            }
        }
    }

    #[test]
    fn test_trailing_bytes_fail() {
        let mut bytes = encode_proof(&sample_proof(1, false));
        bytes.push(0);

        assert_eq!(decode_proof(&bytes), Err(CodecError::TrailingBytes(1)));
    }

    #[test]
    fn test_oversized_chain_count_fails_fast() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&PROOF_VERSION.to_be_bytes());
        bytes.extend_from_slice(&0u64.to_be_bytes());
        bytes.extend_from_slice(&[0u8; 32]);
        bytes.extend_from_slice(&u32::MAX.to_be_bytes());

        assert_eq!(
            decode_proof(&bytes),
            Err(CodecError::ChainLength(u32::MAX))
        );
    }

    #[test]
    fn test_unknown_flag_bits_ignored_on_decode() {
        let proof = sample_proof(1, true);
        let mut bytes = encode_proof(&proof);

        // flags field sits between the chain and the data signature
        let flags_at = bytes.len() - 64 - 4;
        bytes[flags_at] = 0x80;

        let decoded = decode_proof(&bytes).unwrap();
        assert_eq!(decoded, proof);
    }

    #[test]
    fn test_encode_writes_reserved_flag_bits_as_zero() {
        let bytes = encode_proof(&sample_proof(0, true));
        let flags_at = bytes.len() - 64 - 4;

        assert_eq!(&bytes[flags_at..flags_at + 4], &[0, 0, 0, 1]);
    }

    #[test]
    fn test_signable_decode_always_fails() {
        let signable = device_signable(7, &[1u8; 32], &[2u8; 32]);

        assert_eq!(decode_signable(&signable), Err(CodecError::SignableDecode));
        assert_eq!(decode_signable(&[]), Err(CodecError::SignableDecode));
    }

    #[test]
    fn test_device_and_data_signables_domain_separated() {
        let device = device_signable(7, &[1u8; 32], &[2u8; 32]);
        let data = data_signable(7, &[1u8; 32], &[2u8; 32]);

        assert_ne!(device, data);
        assert_eq!(&device[1..], &data[1..]);
    }

    #[test]
    fn test_receipt_roundtrip() {
        let receipt = Receipt { epoch: u64::MAX };
        let decoded = decode_receipt(&encode_receipt(&receipt)).unwrap();
        assert_eq!(receipt, decoded);
    }

    #[test]
    fn test_receipt_wrong_length_fails() {
        assert_eq!(decode_receipt(&[0u8; 7]), Err(CodecError::UnexpectedEof));
        assert_eq!(decode_receipt(&[0u8; 9]), Err(CodecError::TrailingBytes(1)));
    }

    fn arb_proof() -> impl Strategy<Value = Proof> {
        (
            any::<u64>(),
            any::<[u8; 32]>(),
            proptest::collection::vec((any::<[u8; 32]>(), any::<[u8; 64]>()), 0..5),
            proptest::option::of(any::<[u8; 64]>()),
        )
            .prop_map(|(epoch, identity, chain, data)| Proof {
                version: PROOF_VERSION,
                epoch,
                identity,
                chain: chain
                    .into_iter()
                    .map(|(public_key, signature)| DeviceAttestation {
                        public_key,
                        signature: SignatureBytes(signature),
                    })
                    .collect(),
                data: data.map(|signature| DataAttestation {
                    signature: SignatureBytes(signature),
                }),
            })
    }

    proptest! {
        #[test]
        fn prop_roundtrip(proof in arb_proof()) {
            let decoded = decode_proof(&encode_proof(&proof)).unwrap();
            prop_assert_eq!(proof, decoded);
        }

        #[test]
        fn prop_encoding_deterministic(proof in arb_proof()) {
            prop_assert_eq!(encode_proof(&proof), encode_proof(&proof));
        }
    }
}
