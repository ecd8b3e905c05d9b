//! Pluggable 32-bit flow fingerprint.
//!
//! `spec.md` §4.1 names two acceptable implementations of `hash(key_bytes) ->
//! u32`: one AES-128-based (one block encryption of a 16-byte key, low 32 bits
//! of ciphertext) and MurmurHash3-32. Both are ported from
//! `original_source/aeshash` and `original_source/murmur3`; the Go originals
//! keyed off a process-wide seed/RNG (`murmur3.ResetSeed`, `aeshash.SetSeed`),
//! which `spec.md` §9 explicitly replaces with an explicit `hash` config
//! member passed at construction — no process-wide state here.

use crate::types::FlowKey;
use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::Aes128;

/// A pluggable 32-bit fingerprint of a 16-byte flow key.
///
/// Implementors should be approximately uniform over `u32` for typical 5-tuple
/// keys. The detectors assume independence between the two 16-bit halves of
/// the resulting id; wrap a hash that doesn't have that property in
/// [`DecorrelatingFlowHash`].
pub trait FlowHash: Send + Sync {
    fn hash(&self, key: &FlowKey) -> u32;
}

/// MurmurHash3 (x86, 32-bit variant) over the 16-byte flow key.
///
/// Ported from `original_source/murmur3/murmur3.go`, generalized from that
/// file's two hardcoded 8- and 12-byte key lengths to operate over any byte
/// slice (the original's final length-mix constant, `hash ^= 8`, was simply
/// `hash ^= len(key)` specialized to its fixed caller; here the full 16-byte
/// `FlowKey` is always the input so the mix constant is a fixed 16).
#[derive(Debug, Clone, Copy)]
pub struct Murmur3FlowHash {
    seed: u32,
}

impl Murmur3FlowHash {
    pub const fn new(seed: u32) -> Self {
        Self { seed }
    }
}

impl Default for Murmur3FlowHash {
    fn default() -> Self {
        Self::new(0)
    }
}

impl FlowHash for Murmur3FlowHash {
    fn hash(&self, key: &FlowKey) -> u32 {
        const C1: u32 = 0xcc9e2d51;
        const C2: u32 = 0x1b873593;

        let mut hash = self.seed;
        for chunk in key.chunks_exact(4) {
            let mut k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            k = k.wrapping_mul(C1);
            k = k.rotate_left(15);
            k = k.wrapping_mul(C2);

            hash ^= k;
            hash = hash.rotate_left(13);
            hash = hash.wrapping_mul(5).wrapping_add(0xe6546b64);
        }

        hash ^= key.len() as u32;
        hash ^= hash >> 16;
        hash = hash.wrapping_mul(0x85ebca6b);
        hash ^= hash >> 13;
        hash = hash.wrapping_mul(0xc2b2ae35);
        hash ^= hash >> 16;
        hash
    }
}

/// AES-128-based hash: one block encryption of the 16-byte key, low 32 bits
/// of the ciphertext. Ported from `original_source/aeshash/aeshash.go`, which
/// keys the cipher off an explicit seed rather than a secret — this is a
/// fingerprint, not an authenticator (`spec.md` §1 Non-goals: no cryptographic
/// authentication of flow keys).
#[derive(Clone)]
pub struct AesFlowHash {
    cipher: Aes128,
}

impl AesFlowHash {
    pub fn new(seed: [u8; 16]) -> Self {
        Self { cipher: Aes128::new(GenericArray::from_slice(&seed)) }
    }
}

impl FlowHash for AesFlowHash {
    fn hash(&self, key: &FlowKey) -> u32 {
        let mut block = GenericArray::clone_from_slice(key);
        self.cipher.encrypt_block(&mut block);
        u32::from_le_bytes([block[0], block[1], block[2], block[3]])
    }
}

/// Wraps any [`FlowHash`] and mixes its high and low 16-bit halves together,
/// so a hash without a built-in guarantee that its two halves are independent
/// (which `EARDetector`'s two-way hashing and `RLFDetector`'s cuckoo slots
/// both assume, per `spec.md` §4.1) gets that property for free.
pub struct DecorrelatingFlowHash<H> {
    inner: H,
}

impl<H: FlowHash> DecorrelatingFlowHash<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }
}

impl<H: FlowHash> FlowHash for DecorrelatingFlowHash<H> {
    fn hash(&self, key: &FlowKey) -> u32 {
        let raw = self.inner.hash(key);
        let lo = raw & 0xFFFF;
        let hi = (raw >> 16) & 0xFFFF;
        // Odd multiplier on a 16-bit domain is a bijection, cheap enough to
        // run per packet and good enough to break correlation between the
        // two halves without needing a second independent hash function.
        let mixed_hi = (hi.wrapping_mul(0x9E37) ^ lo) & 0xFFFF;
        (mixed_hi << 16) | lo
    }
}
