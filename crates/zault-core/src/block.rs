//! The block: the smallest addressable unit of storage. A signed, typed
//! record whose hash is its own content address.
//!
//! Three byte-exact encodings exist side by side and must never be unified:
//! the signing preimage (what the signature covers), the hash preimage (what
//! the content address covers — it includes the signature), and the on-disk
//! serialization (what `BlockStore` persists). They differ only in field
//! order and in whether `data_len` is present.

use crate::crypto::{dsa, sha3_256, DSA_PK_LEN, DSA_SIG_LEN, HASH_LEN, NONCE_LEN};
use crate::error::{Result, ZaultError};

pub const MAX_BLOCK_DATA_LEN: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Content = 1,
    Metadata = 2,
    Index = 3,
    Tombstone = 4,
    Share = 5,
}

impl BlockKind {
    fn from_u8(b: u8) -> Result<Self> {
        Ok(match b {
            1 => BlockKind::Content,
            2 => BlockKind::Metadata,
            3 => BlockKind::Index,
            4 => BlockKind::Tombstone,
            5 => BlockKind::Share,
            _ => return Err(ZaultError::InvalidBlock),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub version: u8,
    pub kind: BlockKind,
    pub timestamp: i64,
    pub author: [u8; DSA_PK_LEN],
    pub data: Vec<u8>,
    pub nonce: [u8; NONCE_LEN],
    pub signature: [u8; DSA_SIG_LEN],
    pub prev_hash: [u8; HASH_LEN],
    pub hash: [u8; HASH_LEN],
}

impl Block {
    /// `version ‖ kind ‖ timestamp_le8 ‖ author ‖ nonce ‖ data_len_le4 ‖ data ‖ prev_hash`.
    /// Carries `data_len` to forbid splice attacks; excludes `hash`/`signature`.
    fn signing_preimage(
        version: u8,
        kind: BlockKind,
        timestamp: i64,
        author: &[u8; DSA_PK_LEN],
        nonce: &[u8; NONCE_LEN],
        data: &[u8],
        prev_hash: &[u8; HASH_LEN],
    ) -> Vec<u8> {
        let mut buf = Vec::with_capacity(1 + 1 + 8 + DSA_PK_LEN + NONCE_LEN + 4 + data.len() + HASH_LEN);
        buf.push(version);
        buf.push(kind as u8);
        buf.extend_from_slice(&timestamp.to_le_bytes());
        buf.extend_from_slice(author);
        buf.extend_from_slice(nonce);
        buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
        buf.extend_from_slice(data);
        buf.extend_from_slice(prev_hash);
        buf
    }

    /// `version ‖ kind ‖ timestamp_le8 ‖ author ‖ data ‖ nonce ‖ signature ‖ prev_hash`.
    /// No `data_len` prefix; covers the signature, so the hash identifies a
    /// signed block uniquely.
    fn hash_preimage(
        version: u8,
        kind: BlockKind,
        timestamp: i64,
        author: &[u8; DSA_PK_LEN],
        data: &[u8],
        nonce: &[u8; NONCE_LEN],
        signature: &[u8; DSA_SIG_LEN],
        prev_hash: &[u8; HASH_LEN],
    ) -> Vec<u8> {
        let mut buf = Vec::with_capacity(
            1 + 1 + 8 + DSA_PK_LEN + data.len() + NONCE_LEN + DSA_SIG_LEN + HASH_LEN,
        );
        buf.push(version);
        buf.push(kind as u8);
        buf.extend_from_slice(&timestamp.to_le_bytes());
        buf.extend_from_slice(author);
        buf.extend_from_slice(data);
        buf.extend_from_slice(nonce);
        buf.extend_from_slice(signature);
        buf.extend_from_slice(prev_hash);
        buf
    }

    /// Build, sign, and hash a new block. Signing is deterministic (ML-DSA-65
    /// carries no per-signature randomness), so this is reproducible for a
    /// fixed `(kind, timestamp, author, data, nonce, prev_hash)`.
    pub fn seal(
        kind: BlockKind,
        timestamp: i64,
        dsa_sk: &[u8; crate::crypto::DSA_SK_LEN],
        author: [u8; DSA_PK_LEN],
        data: Vec<u8>,
        nonce: [u8; NONCE_LEN],
        prev_hash: [u8; HASH_LEN],
    ) -> Result<Self> {
        if data.len() > MAX_BLOCK_DATA_LEN {
            return Err(ZaultError::InvalidArgument("block data exceeds 16 MiB".into()));
        }
        let version = 1u8;
        let preimage = Self::signing_preimage(version, kind, timestamp, &author, &nonce, &data, &prev_hash);
        let signature = dsa::sign(dsa_sk, &preimage)?;

        let hash_bytes =
            Self::hash_preimage(version, kind, timestamp, &author, &data, &nonce, &signature, &prev_hash);
        let hash = sha3_256(&hash_bytes);

        Ok(Block { version, kind, timestamp, author, data, nonce, signature, prev_hash, hash })
    }

    /// `verify_signature(serialize_for_signing(block), block.author, block.signature)`.
    pub fn verify_signature(&self) -> bool {
        let preimage = Self::signing_preimage(
            self.version,
            self.kind,
            self.timestamp,
            &self.author,
            &self.nonce,
            &self.data,
            &self.prev_hash,
        );
        dsa::verify(&self.author, &preimage, &self.signature)
    }

    /// Recomputes the hash preimage and compares against the stored `hash`.
    /// The on-disk `hash` is never trusted blindly.
    pub fn recompute_hash(&self) -> [u8; HASH_LEN] {
        let bytes = Self::hash_preimage(
            self.version,
            self.kind,
            self.timestamp,
            &self.author,
            &self.data,
            &self.nonce,
            &self.signature,
            &self.prev_hash,
        );
        sha3_256(&bytes)
    }

    /// True only if the recomputed hash matches both the stored `hash` field
    /// and `lookup_key` (the hash the caller used to address this block).
    /// Catches tampering that edits block bytes without touching the trailing
    /// `hash` field, and catches a block stored under the wrong key.
    pub fn hash_is_valid_for(&self, lookup_key: &[u8; HASH_LEN]) -> bool {
        let recomputed = self.recompute_hash();
        recomputed == self.hash && recomputed == *lookup_key
    }

    /// `version ‖ kind ‖ timestamp_le8 ‖ author ‖ nonce ‖ data_len_le4 ‖ data ‖ prev_hash ‖ signature ‖ hash`.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(
            1 + 1 + 8 + DSA_PK_LEN + NONCE_LEN + 4 + self.data.len() + HASH_LEN + DSA_SIG_LEN + HASH_LEN,
        );
        buf.push(self.version);
        buf.push(self.kind as u8);
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.extend_from_slice(&self.author);
        buf.extend_from_slice(&self.nonce);
        buf.extend_from_slice(&(self.data.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.data);
        buf.extend_from_slice(&self.prev_hash);
        buf.extend_from_slice(&self.signature);
        buf.extend_from_slice(&self.hash);
        buf
    }

    pub fn deserialize(buf: &[u8]) -> Result<Self> {
        let mut off = 0usize;
        let need = |off: usize, n: usize, buf: &[u8]| -> Result<()> {
            if off + n > buf.len() {
                Err(ZaultError::InvalidBlock)
            } else {
                Ok(())
            }
        };

        need(off, 1, buf)?;
        let version = buf[off];
        off += 1;

        need(off, 1, buf)?;
        let kind = BlockKind::from_u8(buf[off])?;
        off += 1;

        need(off, 8, buf)?;
        let mut ts_bytes = [0u8; 8];
        ts_bytes.copy_from_slice(&buf[off..off + 8]);
        let timestamp = i64::from_le_bytes(ts_bytes);
        off += 8;

        need(off, DSA_PK_LEN, buf)?;
        let mut author = [0u8; DSA_PK_LEN];
        author.copy_from_slice(&buf[off..off + DSA_PK_LEN]);
        off += DSA_PK_LEN;

        need(off, NONCE_LEN, buf)?;
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&buf[off..off + NONCE_LEN]);
        off += NONCE_LEN;

        need(off, 4, buf)?;
        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&buf[off..off + 4]);
        let data_len = u32::from_le_bytes(len_bytes) as usize;
        off += 4;
        if data_len > MAX_BLOCK_DATA_LEN {
            return Err(ZaultError::InvalidBlock);
        }

        need(off, data_len, buf)?;
        let data = buf[off..off + data_len].to_vec();
        off += data_len;

        need(off, HASH_LEN, buf)?;
        let mut prev_hash = [0u8; HASH_LEN];
        prev_hash.copy_from_slice(&buf[off..off + HASH_LEN]);
        off += HASH_LEN;

        need(off, DSA_SIG_LEN, buf)?;
        let mut signature = [0u8; DSA_SIG_LEN];
        signature.copy_from_slice(&buf[off..off + DSA_SIG_LEN]);
        off += DSA_SIG_LEN;

        need(off, HASH_LEN, buf)?;
        let mut hash = [0u8; HASH_LEN];
        hash.copy_from_slice(&buf[off..off + HASH_LEN]);
        off += HASH_LEN;

        if off != buf.len() {
            return Err(ZaultError::InvalidBlock);
        }

        Ok(Block { version, kind, timestamp, author, data, nonce, signature, prev_hash, hash })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::dsa as dsa_mod;

    fn signed_block(kind: BlockKind, data: Vec<u8>, prev_hash: [u8; HASH_LEN]) -> (Block, [u8; DSA_PK_LEN]) {
        let (pk, sk) = dsa_mod::generate_keypair();
        let block = Block::seal(kind, 0, sk.expose(), pk, data, [0u8; NONCE_LEN], prev_hash).unwrap();
        (block, pk)
    }

    #[test]
    fn sealed_block_verifies() {
        let (block, _) = signed_block(BlockKind::Content, b"hello".to_vec(), [0u8; HASH_LEN]);
        assert!(block.verify_signature());
        assert_eq!(block.hash, block.recompute_hash());
    }

    #[test]
    fn serialize_round_trips() {
        let (block, _) = signed_block(BlockKind::Metadata, b"some metadata bytes".to_vec(), [9u8; HASH_LEN]);
        let bytes = block.serialize();
        let back = Block::deserialize(&bytes).unwrap();
        assert_eq!(block, back);
    }

    #[test]
    fn deserialize_rejects_truncation() {
        let (block, _) = signed_block(BlockKind::Content, b"payload".to_vec(), [0u8; HASH_LEN]);
        let mut bytes = block.serialize();
        bytes.truncate(bytes.len() - 10);
        assert!(matches!(Block::deserialize(&bytes), Err(ZaultError::InvalidBlock)));
    }

    #[test]
    fn deserialize_rejects_trailing_garbage() {
        let (block, _) = signed_block(BlockKind::Content, b"payload".to_vec(), [0u8; HASH_LEN]);
        let mut bytes = block.serialize();
        bytes.push(0xff);
        assert!(matches!(Block::deserialize(&bytes), Err(ZaultError::InvalidBlock)));
    }

    #[test]
    fn tampering_data_breaks_signature_and_hash() {
        let (mut block, _) = signed_block(BlockKind::Content, b"payload".to_vec(), [0u8; HASH_LEN]);
        block.data[0] ^= 0x01;
        assert!(!block.verify_signature());
        assert_ne!(block.hash, block.recompute_hash());
    }

    #[test]
    fn hash_is_valid_for_rejects_wrong_lookup_key() {
        let (block, _) = signed_block(BlockKind::Content, b"hello".to_vec(), [0u8; HASH_LEN]);
        assert!(block.hash_is_valid_for(&block.hash));
        let wrong_key = [0xffu8; HASH_LEN];
        assert!(!block.hash_is_valid_for(&wrong_key));
    }

    #[test]
    fn hash_is_valid_for_rejects_tampered_data_with_stale_hash_field() {
        let (mut block, _) = signed_block(BlockKind::Content, b"hello".to_vec(), [0u8; HASH_LEN]);
        let lookup_key = block.hash;
        block.data[0] ^= 0x01;
        assert!(!block.hash_is_valid_for(&lookup_key));
    }

    #[test]
    fn signing_is_deterministic() {
        let (pk, sk) = dsa_mod::generate_keypair();
        let a = Block::seal(BlockKind::Content, 42, sk.expose(), pk, b"x".to_vec(), [1u8; NONCE_LEN], [0u8; HASH_LEN]).unwrap();
        let b = Block::seal(BlockKind::Content, 42, sk.expose(), pk, b"x".to_vec(), [1u8; NONCE_LEN], [0u8; HASH_LEN]).unwrap();
        assert_eq!(a.signature, b.signature);
        assert_eq!(a.hash, b.hash);
    }

    #[test]
    fn rejects_oversized_data() {
        let (pk, sk) = dsa_mod::generate_keypair();
        let big = vec![0u8; MAX_BLOCK_DATA_LEN + 1];
        let err = Block::seal(BlockKind::Content, 0, sk.expose(), pk, big, [0u8; NONCE_LEN], [0u8; HASH_LEN]).unwrap_err();
        assert!(matches!(err, ZaultError::InvalidArgument(_)));
    }
}
